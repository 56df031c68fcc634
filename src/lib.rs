//! Consul self-registration sidecar.
//!
//! Announces a running server to a service-discovery agent, keeps its TTL
//! check passing, and withdraws the registration on shutdown. Each configured
//! service runs its own registration loop.

pub mod agent;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod registration;

pub use agent::{HttpExecutor, ReqwestExecutor};
pub use config::{ServiceConfig, ServiceDescriptor, SidecarConfig};
pub use lifecycle::{ReadinessGate, Shutdown, Sidecar};
