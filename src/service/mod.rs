//! Execution units and wrapper chains.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     business unit
//!         → ChainBuilder::wrap (ordered list of wrappers)
//!         → ChainBuilder::build (fold last → first, honouring opt-outs)
//!         → Chain (immutable, shared via Arc)
//!
//! Per request:
//!     Chain::execute
//!         → outermost wrapper (metrics.rs)
//!         → logging.rs
//!         → caching.rs
//!         → validation.rs
//!         → business unit
//! ```
//!
//! # Design Decisions
//! - Capabilities (opt-outs, expected statuses, cache keys) are trait methods with
//!   defaults, not runtime type checks
//! - Wrappers forward capability questions to the unit they wrap
//! - Chains are never mutated after `build`

pub mod caching;
pub mod chain;
pub mod logging;
pub mod metrics;
pub mod validation;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::binding::decoder::short_type_name;
use crate::binding::BindError;

pub use caching::{CacheError, CachingWrapper, MemoryCache, RequestCache};
pub use chain::{Chain, ChainBuilder, ChainError, FnWrapper, OptOut, Wrapper, WrapperCategory};
pub use logging::LoggingWrapper;
pub use metrics::MetricsWrapper;
pub use validation::StrictValidationWrapper;

/// Shared, type-erased execution unit.
pub type BoxService<Req, Resp> = Arc<dyn Service<Req, Resp>>;

/// An execution unit: business logic or a wrapper around another unit.
#[async_trait]
pub trait Service<Req, Resp>: Send + Sync + 'static {
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError>;

    /// Whether this unit (or anything it wraps) refuses wrappers of `category`.
    fn opts_out(&self, _category: &WrapperCategory) -> bool {
        false
    }

    /// Status codes this unit may answer with, for strict response validation.
    fn expected_statuses(&self) -> Option<Vec<u16>> {
        None
    }

    /// Hook for unit-specific metrics, called by the metrics wrapper after every call.
    fn record_metrics(&self, _endpoint: &'static str, _outcome: &Result<Resp, ServiceError>, _elapsed: Duration) {}
}

#[async_trait]
impl<Req, Resp, S> Service<Req, Resp> for Arc<S>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    S: Service<Req, Resp> + ?Sized,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        (**self).execute(request).await
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        (**self).opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        (**self).expected_statuses()
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        (**self).record_metrics(endpoint, outcome, elapsed)
    }
}

/// A unit that takes settings from the `[custom]` configuration table.
pub trait Configurable {
    type Config: DeserializeOwned;

    fn set_config(&mut self, config: Self::Config);
}

/// Request-side capabilities consulted by the wrappers.
pub trait ServiceRequest: Debug + Send + Sync + 'static {
    /// Name used in logs when no route name is known.
    fn request_name(&self) -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    /// Key under which the response may be cached; `None` disables caching.
    fn cache_key(&self) -> Option<String> {
        None
    }

    /// Lifetime of a cached response; `None` uses the cache default.
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }
}

/// Response-side capabilities consulted by the wrappers.
pub trait ServiceResponse: Debug + Send + Sync + 'static {
    fn status_code(&self) -> u16 {
        200
    }
}

/// Error returned by an execution unit.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business error carrying its own HTTP status.
    #[error("{message}")]
    Coded { status: u16, message: String },

    #[error(transparent)]
    Bind(#[from] BindError),

    /// Strict validation saw a status the unit never declared.
    #[error("possible api violation: status {status} is not one of {expected:?}")]
    UndeclaredResponse { status: u16, expected: Vec<u16> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn coded(status: u16, message: impl Into<String>) -> Self {
        Self::Coded {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::Coded { status, .. } if (100..=599).contains(status) => *status,
            ServiceError::Coded { .. } => 500,
            ServiceError::Bind(BindError::BodyReadFailure { too_large: true, .. }) => 413,
            ServiceError::Bind(_) => 400,
            ServiceError::UndeclaredResponse { .. } | ServiceError::Internal(_) => 500,
        }
    }
}
