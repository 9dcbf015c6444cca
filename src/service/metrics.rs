//! Per-call metrics recording.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::observability::metrics::record_request;
use crate::service::chain::{ChainError, Wrapper, WrapperCategory};
use crate::service::{BoxService, Service, ServiceError, ServiceResponse};

/// Counts calls and records latency under a fixed endpoint label.
pub struct MetricsWrapper<Req, Resp> {
    endpoint: &'static str,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> MetricsWrapper<Req, Resp> {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            _types: PhantomData,
        }
    }
}

impl<Req, Resp> Wrapper<Req, Resp> for MetricsWrapper<Req, Resp>
where
    Req: Send + 'static,
    Resp: ServiceResponse,
{
    fn category(&self) -> WrapperCategory {
        WrapperCategory::Metrics
    }

    fn wrap(&self, inner: BoxService<Req, Resp>, _unit: &str) -> Result<BoxService<Req, Resp>, ChainError> {
        Ok(Arc::new(MeteredService {
            endpoint: self.endpoint,
            next: inner,
        }))
    }
}

struct MeteredService<Req, Resp> {
    endpoint: &'static str,
    next: BoxService<Req, Resp>,
}

#[async_trait]
impl<Req, Resp> Service<Req, Resp> for MeteredService<Req, Resp>
where
    Req: Send + 'static,
    Resp: ServiceResponse,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        let start = Instant::now();
        let result = self.next.execute(request).await;
        let status = match &result {
            Ok(response) => response.status_code(),
            Err(e) => e.status(),
        };
        record_request(self.endpoint, status, start);
        self.next.record_metrics(self.endpoint, &result, start.elapsed());
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
