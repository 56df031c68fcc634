//! Parsing of the inline `key=value,...` service form.
//!
//! This is the form accepted by `--register` on the command line, e.g.
//! `name=api,url=http://127.0.0.1:8500,tags=web v2,ttl=15`.

use std::collections::HashSet;

use crate::config::loader::ConfigError;
use crate::config::schema::ServiceConfig;

/// Keys recognized in a service entry.
pub const KNOWN_KEYS: &[&str] = &[
    "url",
    "register_url",
    "deregister_url",
    "check_url",
    "id",
    "name",
    "port",
    "tags",
    "ttl",
    "ssl_no_verify",
    "debug",
    "wait_workers",
];

/// Parse one service entry into its raw configuration.
pub fn parse_service_spec(spec: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();
    let mut seen = HashSet::new();

    for item in spec.split(',') {
        if item.trim().is_empty() {
            continue;
        }

        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedEntry(item.to_string()))?;
        let key = key.trim();

        if !KNOWN_KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        if !seen.insert(key) {
            return Err(ConfigError::DuplicateKey(key.to_string()));
        }

        let text = Some(value.to_string());
        match key {
            "url" => config.url = text,
            "register_url" => config.register_url = text,
            "deregister_url" => config.deregister_url = text,
            "check_url" => config.check_url = text,
            "id" => config.id = text,
            "name" => config.name = text,
            "port" => config.port = text,
            "tags" => config.tags = text,
            "ttl" => config.ttl = text,
            "ssl_no_verify" => config.ssl_no_verify = flag(value),
            "debug" => config.debug = flag(value),
            "wait_workers" => config.wait_workers = text,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
    }

    Ok(config)
}

/// Flags are enabled by presence; only an explicit negative turns them off.
fn flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
