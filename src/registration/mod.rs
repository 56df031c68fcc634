//! Per-service registration subsystem.
//!
//! # State Transitions
//! ```text
//! start → WaitReady:         min_ready_workers > 0
//! start → Registering:       otherwise
//! WaitReady → Registering:   readiness gate satisfied (polled)
//! Registering → Checking:    register answered 200
//! Registering → Backoff:     transport error or non-200
//! Checking → Checking:       check answered 200, after ttl/3
//! Checking → Backoff:        transport error or non-200
//! Backoff → Registering:     after ttl
//! any → Terminated:          shutdown observed
//! ```
//!
//! # Design Decisions
//! - One tokio task per service; services share nothing but the shutdown signal
//! - Within a service, agent calls are strictly sequential
//! - A failed health pass goes back through a full registration
//! - Retries never give up and use a fixed TTL delay, no jitter or cap
//! - Failures are logged and counted, never propagated out of the loop

pub mod state;
pub mod task;

pub use state::RegistrationState;
pub use task::{LoopReport, RegistrationLoop};
