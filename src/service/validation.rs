//! Strict response validation.
//!
//! Wraps a unit that declares its expected statuses and turns any other successful
//! status into `ServiceError::UndeclaredResponse`. Errors pass through unchecked.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::service::chain::{ChainError, Wrapper, WrapperCategory};
use crate::service::{BoxService, Service, ServiceError, ServiceResponse};

pub struct StrictValidationWrapper<Req, Resp> {
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> StrictValidationWrapper<Req, Resp> {
    pub fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<Req, Resp> Default for StrictValidationWrapper<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> Wrapper<Req, Resp> for StrictValidationWrapper<Req, Resp>
where
    Req: Send + 'static,
    Resp: ServiceResponse,
{
    fn category(&self) -> WrapperCategory {
        WrapperCategory::Validation
    }

    fn wrap(&self, inner: BoxService<Req, Resp>, unit: &str) -> Result<BoxService<Req, Resp>, ChainError> {
        let expected = inner
            .expected_statuses()
            .filter(|statuses| !statuses.is_empty())
            .ok_or_else(|| ChainError::MissingExpectedStatuses {
                unit: unit.to_string(),
            })?;
        Ok(Arc::new(ValidatedService {
            expected,
            next: inner,
        }))
    }
}

struct ValidatedService<Req, Resp> {
    expected: Vec<u16>,
    next: BoxService<Req, Resp>,
}

#[async_trait]
impl<Req, Resp> Service<Req, Resp> for ValidatedService<Req, Resp>
where
    Req: Send + 'static,
    Resp: ServiceResponse,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        let response = self.next.execute(request).await?;
        let status = response.status_code();
        if self.expected.contains(&status) {
            return Ok(response);
        }
        tracing::warn!(
            status = status,
            expected = ?self.expected,
            "Response status was not declared"
        );
        Err(ServiceError::UndeclaredResponse {
            status,
            expected: self.expected.clone(),
        })
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        self.next.opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        Some(self.expected.clone())
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        self.next.record_metrics(endpoint, outcome, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::chain::ChainBuilder;

    #[derive(Debug)]
    struct Reply(u16);

    impl ServiceResponse for Reply {
        fn status_code(&self) -> u16 {
            self.0
        }
    }

    struct Declared;

    #[async_trait]
    impl Service<u16, Reply> for Declared {
        async fn execute(&self, status: u16) -> Result<Reply, ServiceError> {
            Ok(Reply(status))
        }

        fn expected_statuses(&self) -> Option<Vec<u16>> {
            Some(vec![200, 201])
        }
    }

    struct Undeclared;

    #[async_trait]
    impl Service<u16, Reply> for Undeclared {
        async fn execute(&self, status: u16) -> Result<Reply, ServiceError> {
            Ok(Reply(status))
        }
    }

    #[tokio::test]
    async fn test_declared_status_passes() {
        let chain = ChainBuilder::<u16, Reply>::new(Declared)
            .wrap(StrictValidationWrapper::new())
            .build()
            .unwrap();
        assert_eq!(chain.execute(201).await.unwrap().0, 201);

        let err = chain.execute(202).await.unwrap_err();
        assert!(matches!(err, ServiceError::UndeclaredResponse { status: 202, .. }));
    }

    #[test]
    fn test_undeclared_unit_fails_construction() {
        let result = ChainBuilder::<u16, Reply>::new(Undeclared)
            .named("undeclared")
            .wrap(StrictValidationWrapper::new())
            .build();
        assert!(matches!(result, Err(ChainError::MissingExpectedStatuses { ref unit }) if unit == "undeclared"));
    }
}
