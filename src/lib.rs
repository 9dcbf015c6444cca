//! Typed HTTP binding and service composition library.
//!
//! Records describe where each of their fields lives on the wire (path, query,
//! header, cookie or body). The binding engine decodes inbound requests into
//! fresh records and encodes records into outbound requests. Business logic runs
//! as a [`service::Service`] wrapped by cross-cutting behaviors composed with
//! [`service::ChainBuilder`].

pub mod binding;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use binding::{BindError, DecodeRequest, Endpoint, Field, Record, RequestDecoder, RouteInfo};
pub use client::ServiceClient;
pub use config::schema::BootConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::{Chain, ChainBuilder, Service, ServiceError, ServiceRequest, ServiceResponse};
