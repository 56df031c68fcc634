//! Configuration schema definitions.
//!
//! This module defines the configuration structure of the sidecar.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SidecarConfig {
    /// Services to register, one `[[service]]` table each.
    #[serde(rename = "service")]
    pub services: Vec<ServiceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Readiness probing of the host application.
    pub readiness: ReadinessConfig,
}

/// Raw settings for one service registration.
///
/// Every field is optional here; defaults and derived values are applied
/// when the entry is resolved into a
/// [`ServiceDescriptor`](crate::config::ServiceDescriptor).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Agent base URL, e.g. `http://127.0.0.1:8500`.
    pub url: Option<String>,
    pub register_url: Option<String>,
    pub deregister_url: Option<String>,
    pub check_url: Option<String>,
    /// Instance id; defaults to `name`.
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "string_or_int")]
    pub port: Option<String>,
    /// Space separated tag list.
    pub tags: Option<String>,
    /// Check TTL in seconds.
    #[serde(deserialize_with = "string_or_int")]
    pub ttl: Option<String>,
    /// Disable certificate and hostname verification.
    pub ssl_no_verify: bool,
    /// Log agent responses for this service.
    pub debug: bool,
    /// Accepting workers required before the first registration.
    #[serde(deserialize_with = "string_or_int")]
    pub wait_workers: Option<String>,
}

/// Numeric keys are kept as text so both `ttl = 9` and `ttl = "9"` resolve
/// through the same rules as the `key=value` form.
fn string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Text(String),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Int(n) => n.to_string(),
        Scalar::Text(s) => s,
    }))
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Readiness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessConfig {
    /// Worker addresses (e.g. "127.0.0.1:8000") probed for accepting connections.
    /// Empty means the host is considered ready immediately.
    pub probe_addresses: Vec<String>,

    /// Probe interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_addresses: Vec::new(),
            poll_interval_ms: 1000,
        }
    }
}
