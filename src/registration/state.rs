//! Registration loop states.

use std::fmt;

/// State of one service's registration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationState {
    /// Waiting for enough host workers to accept connections.
    WaitReady,
    /// Sending the registration document.
    Registering,
    /// Registered; sending TTL health passes.
    Checking,
    /// A call failed; waiting one TTL before registering again.
    Backoff,
    /// Shutdown observed. Absorbing.
    Terminated,
}

impl RegistrationState {
    /// Entry state for a service with the given readiness threshold.
    pub fn initial(min_ready_workers: usize) -> Self {
        if min_ready_workers > 0 {
            RegistrationState::WaitReady
        } else {
            RegistrationState::Registering
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationState::Terminated)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationState::WaitReady => "wait_ready",
            RegistrationState::Registering => "registering",
            RegistrationState::Checking => "checking",
            RegistrationState::Backoff => "backoff",
            RegistrationState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
