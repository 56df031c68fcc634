//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --register "name=api,url=http://agent:8500"   config file (TOML, [[service]])
//!     → kvlist.rs (parse key=value list)          → loader.rs (read & deserialize)
//!                     ↘                          ↙
//!                       ServiceConfig (raw, unvalidated)
//!     → validation.rs (resolve ids, urls, ttl, gate)
//!     → ServiceDescriptor (validated, immutable)
//!     → shared via Arc with the registration loop and the shutdown sweep
//! ```
//!
//! # Design Decisions
//! - Unknown keys are rejected in both input formats
//! - Resolution is all-or-nothing: one bad service aborts setup
//! - Descriptors never change after setup; there is no reload

pub mod kvlist;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{LogFormat, ObservabilityConfig, ReadinessConfig, ServiceConfig, SidecarConfig};
pub use validation::{resolve_all, ServiceDescriptor};
