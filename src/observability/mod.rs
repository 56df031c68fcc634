//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registration loops, setup, shutdown sweep produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (agent call counters, registration gauge)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every event carries the service id as a field
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
