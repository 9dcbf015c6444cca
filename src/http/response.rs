//! Response writing.
//!
//! # Responsibilities
//! - Turn a service result into an HTTP response
//! - Map service errors to status codes with a JSON error body
//!
//! # Design Decisions
//! - Writers are pluggable per endpoint; [`JsonWriter`] is the default
//! - Success status comes from the response itself, errors from `ServiceError::status`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::service::{ServiceError, ServiceResponse};

/// Serializes a service result onto the wire.
pub trait ResponseWriter<Resp>: Send + Sync + 'static {
    fn write(&self, result: Result<Resp, ServiceError>) -> Response;
}

/// Writes responses as JSON and errors as `{"error": "..."}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWriter;

impl<Resp> ResponseWriter<Resp> for JsonWriter
where
    Resp: ServiceResponse + Serialize,
{
    fn write(&self, result: Result<Resp, ServiceError>) -> Response {
        match result {
            Ok(response) => {
                let status = StatusCode::from_u16(response.status_code()).unwrap_or(StatusCode::OK);
                (status, Json(response)).into_response()
            }
            Err(e) => error_response(&e),
        }
    }
}

/// JSON error body for `error`.
pub fn error_response(error: &ServiceError) -> Response {
    let status = StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({ "error": error.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct Created {
        id: u32,
    }

    impl ServiceResponse for Created {
        fn status_code(&self) -> u16 {
            201
        }
    }

    #[test]
    fn test_success_status_from_response() {
        let response = JsonWriter.write(Ok(Created { id: 1 }));
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_error_status_from_error() {
        let response = ResponseWriter::<Created>::write(&JsonWriter, Err(ServiceError::coded(404, "no such widget")));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
