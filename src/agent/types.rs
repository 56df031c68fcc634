//! Agent request types and error definitions.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::agent::payload::RegistrationPayload;
use crate::config::ServiceDescriptor;

/// HTTP methods used against the agent API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentMethod {
    Get,
    Put,
}

impl fmt::Display for AgentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMethod::Get => f.write_str("GET"),
            AgentMethod::Put => f.write_str("PUT"),
        }
    }
}

/// The three agent operations, used as a log and metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Check,
    Deregister,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Check => "check",
            Operation::Deregister => "deregister",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the agent, carrying the per-service transport settings.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub operation: Operation,
    pub method: AgentMethod,
    pub url: String,
    /// JSON body, only for registration.
    pub body: Option<RegistrationPayload>,
    /// Bounds both connecting and the whole exchange.
    pub timeout: Duration,
    pub skip_tls_verify: bool,
    pub debug: bool,
}

impl AgentRequest {
    fn for_service(
        descriptor: &ServiceDescriptor,
        operation: Operation,
        method: AgentMethod,
        url: &str,
    ) -> Self {
        Self {
            operation,
            method,
            url: url.to_string(),
            body: None,
            timeout: descriptor.ttl(),
            skip_tls_verify: descriptor.tls_skip_verify,
            debug: descriptor.debug,
        }
    }

    /// `PUT register_url` with the cached registration document.
    pub fn register(descriptor: &ServiceDescriptor, payload: &RegistrationPayload) -> Self {
        let mut request = Self::for_service(
            descriptor,
            Operation::Register,
            AgentMethod::Put,
            &descriptor.register_url,
        );
        request.body = Some(payload.clone());
        request
    }

    /// `GET check_url`, the TTL health pass.
    pub fn check(descriptor: &ServiceDescriptor) -> Self {
        Self::for_service(descriptor, Operation::Check, AgentMethod::Get, &descriptor.check_url)
    }

    /// `GET deregister_url`.
    pub fn deregister(descriptor: &ServiceDescriptor) -> Self {
        Self::for_service(
            descriptor,
            Operation::Deregister,
            AgentMethod::Get,
            &descriptor.deregister_url,
        )
    }
}

/// Network level failure: DNS, connect, TLS, or timeout.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("error sending request to {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Outcome of an agent call that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The agent answered with anything other than 200.
    #[error("HTTP api returned non-200 response code: {0}")]
    UnexpectedStatus(u16),
}
