//! Wrapper chain composition.
//!
//! # Responsibilities
//! - Collect wrappers in configuration order
//! - Fold them around the business unit once, at startup
//! - Skip a wrapper when the unit being wrapped opts out of its category
//!
//! # Design Decisions
//! - A wrapper added later always ends up closer to the business unit
//! - Opt-out questions are asked of the partially built chain, so an opt-out
//!   declared anywhere inside protects the whole inner chain
//! - Construction failures surface from `build`, never at request time

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::service::{BoxService, Service, ServiceError};

/// Kind of cross-cutting behaviour a wrapper adds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WrapperCategory {
    Logging,
    Metrics,
    Caching,
    Validation,
    Custom(&'static str),
}

impl fmt::Display for WrapperCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapperCategory::Logging => f.write_str("logging"),
            WrapperCategory::Metrics => f.write_str("metrics"),
            WrapperCategory::Caching => f.write_str("caching"),
            WrapperCategory::Validation => f.write_str("validation"),
            WrapperCategory::Custom(name) => f.write_str(name),
        }
    }
}

/// Errors raised while composing a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Strict validation needs the unit to declare its statuses.
    #[error("unit '{unit}' declares no expected response statuses")]
    MissingExpectedStatuses { unit: String },

    /// A wrapper refused to wrap the unit.
    #[error("{category} wrapper rejected unit '{unit}': {reason}")]
    Rejected {
        category: WrapperCategory,
        unit: String,
        reason: String,
    },
}

/// A unit → unit transformation with a category.
pub trait Wrapper<Req, Resp>: Send + Sync {
    fn category(&self) -> WrapperCategory;

    fn wrap(&self, inner: BoxService<Req, Resp>, unit: &str) -> Result<BoxService<Req, Resp>, ChainError>;
}

/// Wrapper built from a closure.
pub struct FnWrapper<F> {
    category: WrapperCategory,
    wrap: F,
}

impl<F> FnWrapper<F> {
    pub fn new(category: WrapperCategory, wrap: F) -> Self {
        Self { category, wrap }
    }
}

impl<Req, Resp, F> Wrapper<Req, Resp> for FnWrapper<F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(BoxService<Req, Resp>) -> BoxService<Req, Resp> + Send + Sync,
{
    fn category(&self) -> WrapperCategory {
        self.category.clone()
    }

    fn wrap(&self, inner: BoxService<Req, Resp>, _unit: &str) -> Result<BoxService<Req, Resp>, ChainError> {
        Ok((self.wrap)(inner))
    }
}

/// Ordered wrapper list around one business unit.
pub struct ChainBuilder<Req, Resp> {
    unit: BoxService<Req, Resp>,
    name: String,
    wrappers: Vec<Box<dyn Wrapper<Req, Resp>>>,
}

impl<Req, Resp> ChainBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new<S: Service<Req, Resp>>(unit: S) -> Self {
        Self::from_shared(Arc::new(unit))
    }

    pub fn from_shared(unit: BoxService<Req, Resp>) -> Self {
        Self {
            unit,
            name: "unit".to_string(),
            wrappers: Vec::new(),
        }
    }

    /// Name used in construction errors and logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a wrapper inside every wrapper added before it.
    pub fn wrap<W: Wrapper<Req, Resp> + 'static>(mut self, wrapper: W) -> Self {
        self.wrappers.push(Box::new(wrapper));
        self
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    /// Fold the wrappers around the unit, last added first.
    pub fn build(self) -> Result<Chain<Req, Resp>, ChainError> {
        let mut current = self.unit;
        for wrapper in self.wrappers.iter().rev() {
            let category = wrapper.category();
            if current.opts_out(&category) {
                tracing::debug!(
                    unit = %self.name,
                    category = %category,
                    "Unit opted out of wrapper"
                );
                continue;
            }
            current = wrapper.wrap(current, &self.name)?;
        }

        tracing::debug!(
            unit = %self.name,
            wrappers = self.wrappers.len(),
            "Service chain built"
        );
        Ok(Chain { inner: current })
    }
}

/// A composed, immutable chain.
pub struct Chain<Req, Resp> {
    inner: BoxService<Req, Resp>,
}

impl<Req, Resp> Clone for Chain<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Req, Resp> Chain<Req, Resp> {
    pub fn into_shared(self) -> BoxService<Req, Resp> {
        self.inner
    }
}

#[async_trait]
impl<Req, Resp> Service<Req, Resp> for Chain<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        self.inner.execute(request).await
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        self.inner.opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        self.inner.expected_statuses()
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        self.inner.record_metrics(endpoint, outcome, elapsed)
    }
}

/// Declares opt-outs on a unit without touching its type.
pub struct OptOut<S, Req, Resp> {
    inner: S,
    categories: Vec<WrapperCategory>,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<S, Req, Resp> OptOut<S, Req, Resp>
where
    S: Service<Req, Resp>,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            categories: Vec::new(),
            _types: PhantomData,
        }
    }

    pub fn skip(mut self, category: WrapperCategory) -> Self {
        self.categories.push(category);
        self
    }
}

#[async_trait]
impl<S, Req, Resp> Service<Req, Resp> for OptOut<S, Req, Resp>
where
    S: Service<Req, Resp>,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        self.inner.execute(request).await
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        self.categories.contains(category) || self.inner.opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        self.inner.expected_statuses()
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        self.inner.record_metrics(endpoint, outcome, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Leaf {
        trace: Trace,
    }

    #[async_trait]
    impl Service<u32, u32> for Leaf {
        async fn execute(&self, request: u32) -> Result<u32, ServiceError> {
            self.trace.lock().unwrap().push("leaf".into());
            Ok(request + 1)
        }
    }

    struct Tagged {
        label: &'static str,
        trace: Trace,
        next: BoxService<u32, u32>,
    }

    #[async_trait]
    impl Service<u32, u32> for Tagged {
        async fn execute(&self, request: u32) -> Result<u32, ServiceError> {
            self.trace.lock().unwrap().push(self.label.into());
            self.next.execute(request).await
        }

        fn opts_out(&self, category: &WrapperCategory) -> bool {
            self.next.opts_out(category)
        }
    }

    fn tag(label: &'static str, trace: &Trace) -> impl Wrapper<u32, u32> {
        let trace = Arc::clone(trace);
        FnWrapper::new(WrapperCategory::Custom(label), move |next| {
            Arc::new(Tagged {
                label,
                trace: Arc::clone(&trace),
                next,
            }) as BoxService<u32, u32>
        })
    }

    #[tokio::test]
    async fn test_first_wrapper_is_outermost() {
        let trace = Trace::default();
        let chain = ChainBuilder::<u32, u32>::new(Leaf { trace: trace.clone() })
            .wrap(tag("a", &trace))
            .wrap(tag("b", &trace))
            .wrap(tag("c", &trace))
            .build()
            .unwrap();

        assert_eq!(chain.execute(1).await.unwrap(), 2);
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "c", "leaf"]);
    }

    #[tokio::test]
    async fn test_opt_out_skips_category() {
        let trace = Trace::default();
        let unit = OptOut::new(Leaf { trace: trace.clone() }).skip(WrapperCategory::Custom("b"));
        let chain = ChainBuilder::<u32, u32>::new(unit)
            .wrap(tag("a", &trace))
            .wrap(tag("b", &trace))
            .build()
            .unwrap();

        chain.execute(0).await.unwrap();
        assert_eq!(*trace.lock().unwrap(), vec!["a", "leaf"]);
        // Forwarded through the wrapper that did get applied
        assert!(chain.opts_out(&WrapperCategory::Custom("b")));
        assert!(!chain.opts_out(&WrapperCategory::Logging));
    }

    #[tokio::test]
    async fn test_empty_chain_is_the_unit() {
        let trace = Trace::default();
        let builder = ChainBuilder::<u32, u32>::new(Leaf { trace: trace.clone() });
        assert!(builder.is_empty());
        let chain = builder.build().unwrap();
        assert_eq!(chain.clone().execute(41).await.unwrap(), 42);
        assert_eq!(*trace.lock().unwrap(), vec!["leaf"]);
    }

    #[test]
    fn test_construction_error_surfaces() {
        struct Refuse;

        impl Wrapper<u32, u32> for Refuse {
            fn category(&self) -> WrapperCategory {
                WrapperCategory::Custom("refuse")
            }

            fn wrap(&self, _inner: BoxService<u32, u32>, unit: &str) -> Result<BoxService<u32, u32>, ChainError> {
                Err(ChainError::Rejected {
                    category: self.category(),
                    unit: unit.to_string(),
                    reason: "never".into(),
                })
            }
        }

        let result = ChainBuilder::<u32, u32>::new(Leaf { trace: Trace::default() })
            .named("leaf")
            .wrap(Refuse)
            .build();
        assert!(matches!(result, Err(ChainError::Rejected { ref unit, .. }) if unit == "leaf"));
    }
}
