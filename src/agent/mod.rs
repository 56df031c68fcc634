//! Discovery agent subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceDescriptor
//!     → payload.rs (render registration JSON once, at setup)
//!     → types.rs (AgentRequest: method, url, body, timeout, TLS, debug)
//!     → client.rs (HttpExecutor: one request → status code or TransportError)
//!     → call(): status 200 is success, anything else is an AgentError
//! ```
//!
//! # Wire Protocol
//! - Register: `PUT register_url`, JSON body, success = 200
//! - Health pass: `GET check_url`, success = 200
//! - Deregister: `GET deregister_url`, status only logged
//!
//! # Design Decisions
//! - The executor is a trait so the registration loop can be driven in tests
//! - Every call is bounded by the service TTL (connect and total)
//! - Non-200 responses and transport failures are handled identically

pub mod client;
pub mod payload;
pub mod types;

pub use client::{call, HttpExecutor, ReqwestExecutor};
pub use payload::{build_payload, PayloadError, RegistrationPayload};
pub use types::{AgentError, AgentMethod, AgentRequest, Operation, TransportError};
