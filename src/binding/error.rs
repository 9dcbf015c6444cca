//! Binding error taxonomy.

use thiserror::Error;

use crate::binding::directive::Location;
use crate::binding::scalar::ScalarKind;

/// Errors produced while decoding or encoding a record.
#[derive(Debug, Error)]
pub enum BindError {
    /// A nested target has no field table to flatten.
    #[error("bind target '{type_name}' is not a field-bound record")]
    InvalidTarget {
        /// Rust type name of the offending target.
        type_name: &'static str,
    },

    /// A directive was declared on a field the walker cannot reach.
    #[error("field '{field}' must be public to carry a binding directive")]
    UnexportedField {
        /// Declared field name.
        field: &'static str,
    },

    /// Unrecognised location keyword or a directive the field kind cannot honour.
    #[error("unknown operation '{directive}' on field '{field}'")]
    InvalidDirective {
        /// Declared field name.
        field: &'static str,
        /// Offending directive text.
        directive: String,
    },

    /// A required wire value was absent or empty.
    #[error("'{name}' is missing a required {location} value")]
    RequiredValueMissing {
        /// Resolved wire name.
        name: String,
        /// Where the value was expected.
        location: Location,
    },

    /// Wire text could not be parsed into the declared scalar kind.
    #[error("value '{text}' for '{name}' is not a valid {kind}: {reason}")]
    ConversionFailure {
        /// Resolved wire name.
        name: String,
        /// Raw wire text.
        text: String,
        /// Declared kind.
        kind: ScalarKind,
        /// Parser message.
        reason: String,
    },

    /// The field type cannot be built from wire text.
    #[error("do not know how to set type {type_name} for request value '{text}'")]
    UnsupportedType {
        /// Rust type name of the field.
        type_name: &'static str,
        /// Raw wire text.
        text: String,
    },

    /// A path-bound field has no `{name}` placeholder in the route.
    #[error("could not find path variable '{name}' in path [{path}]")]
    MissingPlaceholder {
        /// Resolved wire name.
        name: String,
        /// Route template or request path.
        path: String,
    },

    /// The router's captured path variables could not be read.
    #[error("invalid path parameters: {reason}")]
    InvalidPathParams {
        /// Extractor message.
        reason: String,
    },

    /// Header name or value rejected by the HTTP layer.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// Reason reported by the HTTP layer.
        reason: String,
    },

    /// The joined base URL and route path did not parse.
    #[error("request url '{url}' is invalid: {reason}")]
    InvalidUrl {
        /// Attempted URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Transport-level body failure, including the size ceiling.
    #[error("failed to read request body: {reason}")]
    BodyReadFailure {
        /// Transport message.
        reason: String,
        /// True when the configured byte ceiling was exceeded.
        too_large: bool,
    },

    /// Body bytes were not a valid JSON document for the target.
    #[error("request body is not valid JSON for '{name}': {source}")]
    MalformedBody {
        /// Field (or record) the body was bound to.
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The record rejected itself.
    #[error("validation failed: {0}")]
    ValidationFailure(#[from] ValidationError),
}

/// Error returned by [`Record::validate`](crate::binding::Record::validate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
