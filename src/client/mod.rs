//! Typed HTTP client for mounted endpoints.
//!
//! # Data Flow
//! ```text
//! &E: Endpoint
//!     → binding::encode (validate, bind fields, build reqwest::Request)
//!     → reqwest::Client::execute
//!     → status check (non-2xx → ClientError::Status)
//!     → serde_json → T
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::binding::{encode, BindError, Endpoint};

/// Errors raised by [`ServiceClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client request generation failed: {0}")]
    Bind(#[from] BindError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unable to decode response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Calls endpoints on one base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Client with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `record` and return the raw response, whatever its status.
    pub async fn send<E: Endpoint>(&self, record: &E) -> Result<reqwest::Response, ClientError> {
        let request = encode(&self.base_url, record)?;
        tracing::debug!(
            endpoint = E::info().name,
            method = %request.method(),
            url = %request.url(),
            "Sending request"
        );
        Ok(self.http.execute(request).await?)
    }

    /// Send `record` and decode a successful JSON response into `T`.
    pub async fn call<E: Endpoint, T: DeserializeOwned>(&self, record: &E) -> Result<T, ClientError> {
        let response = self.send(record).await?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Field, Record, RouteInfo};
    use crate::service::ServiceRequest;
    use axum::http::Method;

    #[derive(Debug, Default)]
    struct Lookup {
        id: u32,
    }

    impl ServiceRequest for Lookup {}

    impl Record for Lookup {
        fn fields() -> Vec<Field<Self>> {
            vec![Field::scalar("id", r#"path:"id" required:"true""#, |l: &Self| &l.id, |l| &mut l.id)]
        }
    }

    impl Endpoint for Lookup {
        fn info() -> RouteInfo {
            RouteInfo {
                name: "lookup",
                method: Method::GET,
                path: "/lookup/{id}",
                description: "",
            }
        }
    }

    #[tokio::test]
    async fn test_bind_errors_surface_before_transport() {
        let client = ServiceClient::new("not a base url");
        let err = client.call::<_, serde_json::Value>(&Lookup { id: 1 }).await.unwrap_err();
        assert!(matches!(err, ClientError::Bind(BindError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let client = ServiceClient::with_timeout("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client.send(&Lookup { id: 1 }).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
    }
}
