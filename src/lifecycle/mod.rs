//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs, on_started):
//!     Resolve services → Build payloads → Stale deregister → Spawn loops
//!
//! Readiness (readiness.rs):
//!     Host worker state → ReadinessGate::is_ready(min) polled by loops
//!
//! Shutdown (shutdown.rs, on_stopping):
//!     Raise flag → Loops exit at next check point
//!     Deregister every service once (does not wait for loops)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary runs on_stopping
//! ```
//!
//! # Design Decisions
//! - Ordered startup: validate everything first, then touch the network
//! - Cancellation is cooperative; in-flight agent calls are never aborted
//! - Deregistration and loop exit may race; both are idempotent at the agent

pub mod readiness;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use readiness::{AlwaysReady, ReadinessGate, TcpProbe, WorkerReadiness};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{SetupError, Sidecar};
