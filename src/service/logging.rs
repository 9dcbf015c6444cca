//! Per-call structured logging.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::service::chain::{ChainError, Wrapper, WrapperCategory};
use crate::service::{BoxService, Service, ServiceError, ServiceRequest, ServiceResponse};

/// Logs one event per call with the endpoint name, status code and latency.
pub struct LoggingWrapper<Req, Resp> {
    endpoint: Option<&'static str>,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> LoggingWrapper<Req, Resp> {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            _types: PhantomData,
        }
    }

    /// Log under a fixed route name instead of the request type name.
    pub fn named(endpoint: &'static str) -> Self {
        Self {
            endpoint: Some(endpoint),
            _types: PhantomData,
        }
    }
}

impl<Req, Resp> Default for LoggingWrapper<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> Wrapper<Req, Resp> for LoggingWrapper<Req, Resp>
where
    Req: ServiceRequest,
    Resp: ServiceResponse,
{
    fn category(&self) -> WrapperCategory {
        WrapperCategory::Logging
    }

    fn wrap(&self, inner: BoxService<Req, Resp>, _unit: &str) -> Result<BoxService<Req, Resp>, ChainError> {
        Ok(std::sync::Arc::new(LoggedService {
            endpoint: self.endpoint,
            next: inner,
        }))
    }
}

struct LoggedService<Req, Resp> {
    endpoint: Option<&'static str>,
    next: BoxService<Req, Resp>,
}

#[async_trait]
impl<Req, Resp> Service<Req, Resp> for LoggedService<Req, Resp>
where
    Req: ServiceRequest,
    Resp: ServiceResponse,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        let start = Instant::now();
        let endpoint = self.endpoint.unwrap_or_else(|| request.request_name());
        let request_repr = tracing::enabled!(tracing::Level::DEBUG).then(|| format!("{request:?}"));

        let result = self.next.execute(request).await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(response) => {
                tracing::info!(
                    endpoint = endpoint,
                    code = response.status_code(),
                    duration_ms = duration_ms,
                    "Service call completed"
                );
                tracing::debug!(
                    endpoint = endpoint,
                    request = request_repr.as_deref().unwrap_or_default(),
                    response = ?response,
                    "Service call payloads"
                );
            }
            Err(e) => {
                tracing::info!(
                    endpoint = endpoint,
                    code = e.status(),
                    duration_ms = duration_ms,
                    error = %e,
                    "Service call failed"
                );
                tracing::debug!(
                    endpoint = endpoint,
                    request = request_repr.as_deref().unwrap_or_default(),
                    "Service call payloads"
                );
            }
        }

        result
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        self.next.opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        self.next.expected_statuses()
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        self.next.record_metrics(endpoint, outcome, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::chain::{ChainBuilder, OptOut};

    #[derive(Debug)]
    struct Ping;

    impl ServiceRequest for Ping {}

    #[derive(Debug, PartialEq)]
    struct Pong(u16);

    impl ServiceResponse for Pong {
        fn status_code(&self) -> u16 {
            self.0
        }
    }

    struct Echo;

    #[async_trait]
    impl Service<Ping, Pong> for Echo {
        async fn execute(&self, _request: Ping) -> Result<Pong, ServiceError> {
            Ok(Pong(201))
        }

        fn expected_statuses(&self) -> Option<Vec<u16>> {
            Some(vec![201])
        }
    }

    #[tokio::test]
    async fn test_logging_is_transparent() {
        let chain = ChainBuilder::<Ping, Pong>::new(Echo)
            .wrap(LoggingWrapper::named("ping"))
            .build()
            .unwrap();
        assert_eq!(chain.execute(Ping).await.unwrap(), Pong(201));
        assert_eq!(chain.expected_statuses(), Some(vec![201]));
    }

    #[tokio::test]
    async fn test_logging_opt_out() {
        let unit = OptOut::new(Echo).skip(WrapperCategory::Logging);
        let chain = ChainBuilder::<Ping, Pong>::new(unit)
            .wrap(LoggingWrapper::new())
            .build()
            .unwrap();
        assert!(chain.opts_out(&WrapperCategory::Logging));
        assert_eq!(chain.execute(Ping).await.unwrap(), Pong(201));
    }
}
