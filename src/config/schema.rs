//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a service host.
//! All types derive Serde traits for deserialization from config files.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BootConfig {
    /// HTTP adapter settings.
    pub server: ServerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Response validation settings.
    pub validation: ValidationConfig,

    /// Free-form `[custom]` table handed to configurable services.
    pub custom: toml::Table,
}

impl BootConfig {
    /// Deserialize the `[custom]` table into a service's own settings type.
    pub fn custom_config<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.custom.clone())
            .try_into()
            .map_err(ConfigError::Custom)
    }
}

/// HTTP adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Prefix prepended to every endpoint path (e.g., "/api").
    pub root_path: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes; unlimited when absent.
    pub max_body_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            root_path: "/".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: Some(1024 * 1024),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter (overridden by `RUST_LOG`).
    pub log_level: String,

    /// Enable the metrics wrapper and the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address (e.g., "0.0.0.0:9090").
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Wrap every endpoint with the in-memory cache.
    pub enabled: bool,

    /// TTL for entries whose request names none, in seconds.
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_ttl_secs: 60,
        }
    }
}

/// Response validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject responses whose status the endpoint never declared.
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: BootConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.max_body_bytes, Some(1024 * 1024));
        assert!(!config.cache.enabled);
        assert!(!config.validation.strict);
    }

    #[test]
    fn test_partial_sections() {
        let config: BootConfig = toml::from_str(
            r#"
            [server]
            root_path = "/api"

            [cache]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.root_path, "/api");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.default_ttl_secs, 60);
    }

    #[derive(Debug, Deserialize)]
    struct Limits {
        max_qty: u32,
        #[serde(default)]
        label: Option<String>,
    }

    #[test]
    fn test_custom_table_deserializes_into_service_type() {
        let config: BootConfig = toml::from_str(
            r#"
            [custom]
            max_qty = 10
            "#,
        )
        .unwrap();
        let limits: Limits = config.custom_config().unwrap();
        assert_eq!(limits.max_qty, 10);
        assert_eq!(limits.label, None);
    }

    #[test]
    fn test_custom_table_type_mismatch() {
        let config: BootConfig = toml::from_str("[custom]\nmax_qty = \"ten\"\n").unwrap();
        let err = config.custom_config::<Limits>().unwrap_err();
        assert!(matches!(err, ConfigError::Custom(_)));
    }
}
