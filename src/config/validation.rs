//! Service entry validation and resolution.
//!
//! # Responsibilities
//! - Require a non-empty service name
//! - Default the instance id from the name
//! - Derive register/check/deregister endpoints from the agent base URL
//! - Normalize the TTL and the readiness gate threshold
//!
//! # Design Decisions
//! - Pure function: ServiceConfig → Result<ServiceDescriptor, ConfigError>
//! - Misconfiguration is reported at setup, never discovered at runtime
//! - Resolution of a service list stops at the first invalid entry

use std::time::Duration;

use crate::config::loader::ConfigError;
use crate::config::schema::ServiceConfig;

/// TTL used when none (or a non-positive one) is configured.
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Readiness threshold used when `wait_workers` is absent.
pub const DEFAULT_MIN_READY_WORKERS: usize = 1;

const REGISTER_PATH: &str = "/v1/agent/service/register";
const CHECK_PASS_PATH: &str = "/v1/agent/check/pass/service:";
const DEREGISTER_PATH: &str = "/v1/agent/service/deregister/";

/// Fully resolved settings for one service registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service name as known to the agent.
    pub name: String,
    /// Unique instance id.
    pub id: String,
    pub register_url: String,
    pub check_url: String,
    pub deregister_url: String,
    pub port: Option<u16>,
    pub tags: Vec<String>,
    /// Check TTL, also the timeout of every agent call and the retry delay.
    pub ttl_secs: u64,
    pub tls_skip_verify: bool,
    pub debug: bool,
    /// Accepting workers required before registering; 0 disables the gate.
    pub min_ready_workers: usize,
}

impl ServiceDescriptor {
    /// Resolve a raw service entry.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let name = non_empty(&config.name)
            .ok_or(ConfigError::MissingName)?
            .to_string();
        let id = non_empty(&config.id).unwrap_or(&name).to_string();
        let base_url = non_empty(&config.url).map(|url| url.trim_end_matches('/'));

        let endpoint = |explicit: &Option<String>, field: &'static str, derived: String| {
            match (non_empty(explicit), base_url) {
                (Some(url), _) => Ok(url.to_string()),
                (None, Some(_)) => Ok(derived),
                (None, None) => Err(ConfigError::MissingUrl {
                    service: name.clone(),
                    field,
                }),
            }
        };
        let base = base_url.unwrap_or_default();

        let register_url = endpoint(
            &config.register_url,
            "register_url",
            format!("{base}{REGISTER_PATH}"),
        )?;
        let check_url = endpoint(
            &config.check_url,
            "check_url",
            format!("{base}{CHECK_PASS_PATH}{id}"),
        )?;
        let deregister_url = endpoint(
            &config.deregister_url,
            "deregister_url",
            format!("{base}{DEREGISTER_PATH}{id}"),
        )?;

        let port = match non_empty(&config.port) {
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidPort {
                    service: name.clone(),
                    value: value.to_string(),
                }
            })?),
            None => None,
        };

        let tags = config
            .tags
            .as_deref()
            .map(|tags| {
                tags.split(' ')
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let ttl_secs = config
            .ttl
            .as_deref()
            .and_then(|ttl| ttl.trim().parse::<i64>().ok())
            .filter(|ttl| *ttl > 0)
            .map(|ttl| ttl as u64)
            .unwrap_or(DEFAULT_TTL_SECS);

        let min_ready_workers = match non_empty(&config.wait_workers) {
            Some(value) => {
                let workers = value.trim().parse::<i64>().map_err(|_| {
                    ConfigError::InvalidWaitWorkers {
                        service: name.clone(),
                        value: value.to_string(),
                    }
                })?;
                usize::try_from(workers).unwrap_or(0)
            }
            None => DEFAULT_MIN_READY_WORKERS,
        };

        Ok(Self {
            name,
            id,
            register_url,
            check_url,
            deregister_url,
            port,
            tags,
            ttl_secs,
            tls_skip_verify: config.ssl_no_verify,
            debug: config.debug,
            min_ready_workers,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Pause between successful health passes, a third of the TTL.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.ttl_secs / 3)
    }

    /// Whether registration waits for the readiness gate.
    pub fn is_gated(&self) -> bool {
        self.min_ready_workers > 0
    }
}

/// Resolve every entry, or fail on the first invalid one.
pub fn resolve_all(configs: &[ServiceConfig]) -> Result<Vec<ServiceDescriptor>, ConfigError> {
    configs.iter().map(ServiceDescriptor::from_config).collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
