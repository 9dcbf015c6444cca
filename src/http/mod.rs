//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, one route per mounted endpoint)
//!     → request.rs (request ID)
//!     → binding decoder → service chain
//!     → response.rs (status + JSON body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::{error_response, JsonWriter, ResponseWriter};
pub use server::{HttpServer, MountError};
