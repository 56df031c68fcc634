//! Configuration loading from disk.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SidecarConfig;

/// Errors raised while loading or resolving configuration.
///
/// All of them are fatal: the sidecar refuses to register anything when
/// any service entry is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An item of a `key=value` list had no `=`.
    #[error("malformed service entry item: {0:?}")]
    MalformedEntry(String),

    #[error("unknown service key: {0}")]
    UnknownKey(String),

    #[error("service key given twice: {0}")]
    DuplicateKey(String),

    #[error("name is required")]
    MissingName,

    /// Neither the explicit endpoint nor the base `url` was configured.
    #[error("service {service}: url or {field} is required")]
    MissingUrl { service: String, field: &'static str },

    #[error("service {service}: invalid port {value:?}")]
    InvalidPort { service: String, value: String },

    #[error("service {service}: invalid wait_workers {value:?}")]
    InvalidWaitWorkers { service: String, value: String },

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("readiness poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
}

/// Load a TOML configuration file and validate its non-service sections.
///
/// Service entries are resolved later, together with services given on the
/// command line, by [`resolve_all`](crate::config::resolve_all).
pub fn load_config(path: &Path) -> Result<SidecarConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: SidecarConfig = toml::from_str(&content)?;

    validate_sections(&config)?;

    Ok(config)
}

/// Semantic checks for the observability and readiness sections.
pub fn validate_sections(config: &SidecarConfig) -> Result<(), ConfigError> {
    if config.observability.metrics_enabled {
        parse_addr(&config.observability.metrics_address)?;
    }
    for addr in &config.readiness.probe_addresses {
        parse_addr(addr)?;
    }
    if config.readiness.poll_interval_ms == 0 {
        return Err(ConfigError::ZeroPollInterval);
    }
    Ok(())
}

pub fn parse_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse()
        .map_err(|_| ConfigError::InvalidAddress(addr.to_string()))
}
