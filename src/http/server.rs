//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount endpoints: decoder + service chain + response writer per route
//! - Build the default wrapper chain from configuration
//! - Wire up middleware (timeout, request ID, tracing)
//! - Serve on a listener until shutdown
//!
//! # Data Flow
//! ```text
//! Request
//!     → TraceLayer / RequestIdLayer / TimeoutLayer
//!     → route for (method, root_path + RouteInfo::path)
//!     → DecodeRequest<E>::decode_request (RequestDecoder<E> unless overridden)
//!     → Chain<E, Resp>::execute
//!     → ResponseWriter<Resp>::write
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::binding::decoder::short_type_name;
use crate::binding::{BindError, DecodeRequest, Endpoint, RequestDecoder, RouteInfo};
use crate::config::{BootConfig, ConfigError};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response::{JsonWriter, ResponseWriter};
use crate::lifecycle::Shutdown;
use crate::service::{
    BoxService, CachingWrapper, Chain, ChainBuilder, ChainError, Configurable, LoggingWrapper,
    MemoryCache, MetricsWrapper, Service, ServiceError, ServiceResponse, StrictValidationWrapper,
};

/// Errors raised while mounting an endpoint.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("endpoint '{endpoint}' has an invalid binding table: {source}")]
    Binding {
        endpoint: &'static str,
        #[source]
        source: BindError,
    },

    #[error("endpoint '{endpoint}' chain failed to build: {source}")]
    Chain {
        endpoint: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("endpoint '{endpoint}' uses unsupported method {method}")]
    UnsupportedMethod { endpoint: &'static str, method: Method },

    #[error("route {method} {path} is already mounted")]
    DuplicateRoute { method: Method, path: String },

    #[error("route {path} was refused by the router: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("service '{unit}' rejected its [custom] configuration: {source}")]
    CustomConfig {
        unit: &'static str,
        #[source]
        source: ConfigError,
    },
}

/// HTTP adapter hosting service chains.
pub struct HttpServer {
    config: BootConfig,
    cache: Option<Arc<MemoryCache>>,
    router: Router,
    mounted: HashSet<(Method, String)>,
    infos: Vec<RouteInfo>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BootConfig) -> Self {
        let cache = config.cache.enabled.then(|| {
            Arc::new(MemoryCache::new(Some(Duration::from_secs(
                config.cache.default_ttl_secs,
            ))))
        });
        Self {
            config,
            cache,
            router: Router::new(),
            mounted: HashSet::new(),
            infos: Vec::new(),
        }
    }

    /// The configured wrapper chain around `unit`, outermost first: metrics,
    /// logging, cache, strict validation.
    pub fn default_chain<E, Resp, S>(&self, unit: S) -> ChainBuilder<E, Resp>
    where
        E: Endpoint,
        Resp: ServiceResponse + Clone,
        S: Service<E, Resp>,
    {
        let info = E::info();
        let mut builder = ChainBuilder::new(unit).named(info.name);
        if self.config.observability.metrics_enabled {
            builder = builder.wrap(MetricsWrapper::new(info.name));
        }
        builder = builder.wrap(LoggingWrapper::named(info.name));
        if let Some(cache) = &self.cache {
            builder = builder.wrap(CachingWrapper::new(cache.clone()));
        }
        if self.config.validation.strict {
            builder = builder.wrap(StrictValidationWrapper::new());
        }
        builder
    }

    /// Mount `unit` behind the default chain with the JSON writer.
    pub fn mount<E, Resp, S>(self, unit: S) -> Result<Self, MountError>
    where
        E: Endpoint,
        Resp: ServiceResponse + Serialize + Clone,
        S: Service<E, Resp>,
    {
        let chain = self.default_chain(unit).build().map_err(|source| MountError::Chain {
            endpoint: E::info().name,
            source,
        })?;
        self.mount_chain(chain)
    }

    /// Mount an already composed chain with the JSON writer.
    pub fn mount_chain<E, Resp>(self, chain: Chain<E, Resp>) -> Result<Self, MountError>
    where
        E: Endpoint,
        Resp: ServiceResponse + Serialize,
    {
        self.mount_with(chain, JsonWriter)
    }

    /// Hand the `[custom]` configuration table to `unit`.
    pub fn configure<S: Configurable>(&self, unit: &mut S) -> Result<(), MountError> {
        let config = self
            .config
            .custom_config::<S::Config>()
            .map_err(|source| MountError::CustomConfig {
                unit: short_type_name::<S>(),
                source,
            })?;
        unit.set_config(config);
        Ok(())
    }

    /// Configure `unit` from the `[custom]` table, then mount it behind the default chain.
    pub fn mount_configured<E, Resp, S>(self, mut unit: S) -> Result<Self, MountError>
    where
        E: Endpoint,
        Resp: ServiceResponse + Serialize + Clone,
        S: Service<E, Resp> + Configurable,
    {
        self.configure(&mut unit)?;
        self.mount(unit)
    }

    /// Mount a composed chain with a custom response writer.
    pub fn mount_with<E, Resp, W>(self, chain: Chain<E, Resp>, writer: W) -> Result<Self, MountError>
    where
        E: Endpoint,
        Resp: Send + 'static,
        W: ResponseWriter<Resp>,
    {
        let decoder = RequestDecoder::<E>::new()
            .map_err(|source| MountError::Binding {
                endpoint: E::info().name,
                source,
            })?
            .with_body_limit(self.config.server.max_body_bytes);
        self.mount_with_decoder(chain, decoder, writer)
    }

    /// Mount a composed chain whose requests are built by `decoder` instead of the
    /// record's field table.
    pub fn mount_with_decoder<E, Resp, D, W>(
        mut self,
        chain: Chain<E, Resp>,
        decoder: D,
        writer: W,
    ) -> Result<Self, MountError>
    where
        E: Endpoint,
        Resp: Send + 'static,
        D: DecodeRequest<E>,
        W: ResponseWriter<Resp>,
    {
        let info = E::info();
        let path = route_path(&self.config.server.root_path, info.path);

        if !self.mounted.insert((info.method.clone(), path.clone())) {
            return Err(MountError::DuplicateRoute {
                method: info.method,
                path,
            });
        }
        let filter = MethodFilter::try_from(info.method.clone()).map_err(|_| MountError::UnsupportedMethod {
            endpoint: info.name,
            method: info.method.clone(),
        })?;

        let endpoint = Arc::new(MountedEndpoint {
            name: info.name,
            decoder,
            chain: chain.into_shared(),
            writer,
        });
        let handler = move |request: Request<Body>| {
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.handle(request).await }
        };

        // The router panics on malformed or conflicting templates.
        let candidate = self.router.clone();
        let methods = MethodRouter::new().on(filter, handler);
        self.router = catch_unwind(AssertUnwindSafe(|| candidate.route(&path, methods))).map_err(
            |payload| MountError::InvalidRoute {
                path: path.clone(),
                reason: panic_message(payload.as_ref()),
            },
        )?;

        tracing::info!(
            endpoint = info.name,
            method = %info.method,
            path = %path,
            "Endpoint mounted"
        );
        self.infos.push(info);
        Ok(self)
    }

    /// Route metadata of every mounted endpoint, in mount order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.infos
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let timeout = Duration::from_secs(self.config.server.request_timeout_secs);
        self.router
            .fallback(not_found)
            .layer(TimeoutLayer::new(timeout))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.infos.len(),
            "HTTP server starting"
        );

        let app = self.into_router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

struct MountedEndpoint<E, Resp, D, W> {
    name: &'static str,
    decoder: D,
    chain: BoxService<E, Resp>,
    writer: W,
}

impl<E, Resp, D, W> MountedEndpoint<E, Resp, D, W>
where
    E: Endpoint,
    Resp: Send + 'static,
    D: DecodeRequest<E>,
    W: ResponseWriter<Resp>,
{
    async fn handle(&self, request: Request<Body>) -> Response {
        let request_id = request.request_id().unwrap_or("unknown").to_string();

        match self.decoder.decode_request(request).await {
            Ok(record) => self.writer.write(self.chain.execute(record).await),
            Err(rejected) => {
                tracing::debug!(
                    request_id = %request_id,
                    endpoint = self.name,
                    error = %rejected.error,
                    record = ?rejected.record,
                    "Request rejected by decoder"
                );
                self.writer.write(Err(ServiceError::Bind(rejected.error)))
            }
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "no matching route" })),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "router rejected the path".to_string()
    }
}

/// Join the configured root path and an endpoint path.
fn route_path(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{root}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("/", "/widgets/{id}"), "/widgets/{id}");
        assert_eq!(route_path("/api/", "widgets"), "/api/widgets");
        assert_eq!(route_path("/api", "/"), "/api/");
        assert_eq!(route_path("/", ""), "/");
    }
}
