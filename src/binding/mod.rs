//! Structural binding engine.
//!
//! # Data Flow
//! ```text
//! Server side:
//!     http::Request + PathParams
//!         → decoder.rs (fresh R::default(), optional body read)
//!         → schema.rs (walk R::fields(), recurse into nested records)
//!         → directive.rs (tags → Directive)
//!         → scalar.rs (wire text → typed value)
//!         → R (or Rejected<R> carrying the partial record)
//!
//! Client side:
//!     &R
//!         → encoder.rs (validate, resolve URL, optional JSON body)
//!         → schema.rs / directive.rs (same walk, read direction)
//!         → scalar.rs (typed value → wire text)
//!         → reqwest::Request
//! ```
//!
//! # Design Decisions
//! - Field layout comes from an explicit descriptor table per record type
//! - Descriptors are rebuilt on every walk; nothing is shared between calls
//! - Empty wire text converts to the zero value; requiredness is checked on the raw text

pub mod decoder;
pub mod directive;
pub mod encoder;
pub mod error;
pub mod path;
pub mod scalar;
pub mod schema;

pub use decoder::{DecodeRequest, Rejected, RequestDecoder};
pub use directive::{Directive, Location};
pub use encoder::encode;
pub use error::{BindError, ValidationError};
pub use path::PathParams;
pub use scalar::{Complex, Complex128, Complex64, Scalar, ScalarKind};
pub use schema::{Embeddable, Endpoint, Field, JsonBody, Record, RouteInfo};
