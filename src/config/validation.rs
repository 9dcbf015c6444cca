//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BootConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BootConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every problem.
pub fn validate_config(config: &BootConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("server.bind_address", "must not be empty"));
    }
    if !config.server.root_path.starts_with('/') {
        errors.push(ValidationError::new("server.root_path", "must start with '/'"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.server.max_body_bytes == Some(0) {
        errors.push(ValidationError::new(
            "server.max_body_bytes",
            "must be greater than zero when set",
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if config.cache.enabled && config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "cache.default_ttl_secs",
            "must be greater than zero when the cache is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&BootConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = BootConfig::default();
        config.server.root_path = "api".into();
        config.server.request_timeout_secs = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.root_path",
                "server.request_timeout_secs",
                "observability.metrics_address"
            ]
        );
    }

    #[test]
    fn test_cache_ttl_only_checked_when_enabled() {
        let mut config = BootConfig::default();
        config.cache.default_ttl_secs = 0;
        assert!(validate_config(&config).is_ok());
        config.cache.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
