//! HTTP executor for agent calls.
//!
//! # Responsibilities
//! - Perform one request and report the status code
//! - Bound connect and total time by the request timeout
//! - Optionally skip certificate and hostname verification
//! - Surface response headers and body in debug mode

use std::error::Error as _;
use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::agent::types::{AgentError, AgentMethod, AgentRequest, TransportError};

/// Performs a single HTTP request against the agent.
///
/// Implementations return the response status code, whatever it is, or a
/// [`TransportError`] when no response was received. They must not retry.
pub trait HttpExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        request: AgentRequest,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send;
}

/// Execute a request and treat anything but `200` as a failure.
pub async fn call<E: HttpExecutor>(executor: &E, request: AgentRequest) -> Result<(), AgentError> {
    match executor.execute(request).await? {
        200 => Ok(()),
        status => Err(AgentError::UnexpectedStatus(status)),
    }
}

/// [`HttpExecutor`] backed by `reqwest`.
///
/// Timeouts and TLS verification are client level settings in `reqwest`, so
/// one client is kept per `(timeout, skip_tls_verify)` combination.
#[derive(Debug, Default)]
pub struct ReqwestExecutor {
    clients: DashMap<(Duration, bool), Client>,
}

impl ReqwestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, request: &AgentRequest) -> Result<Client, TransportError> {
        let key = (request.timeout, request.skip_tls_verify);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(request.timeout)
            .connect_timeout(request.timeout)
            .danger_accept_invalid_certs(request.skip_tls_verify)
            .danger_accept_invalid_hostnames(request.skip_tls_verify)
            .no_proxy()
            .build()
            .map_err(|e| TransportError::new(&request.url, error_chain(&e)))?;

        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: AgentRequest) -> Result<u16, TransportError> {
        let client = self.client_for(&request)?;

        let mut builder = match request.method {
            AgentMethod::Get => client.get(&request.url),
            AgentMethod::Put => client.put(&request.url),
        };
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.as_bytes().to_vec());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(&request.url, error_chain(&e)))?;
        let status = response.status().as_u16();

        if request.debug {
            let headers = format!("{:?}", response.headers());
            // A body that fails to arrive only affects the debug output.
            let body = response.text().await.unwrap_or_else(|e| error_chain(&e));
            tracing::info!(
                method = %request.method,
                url = %request.url,
                status,
                headers = %headers,
                body = %body,
                "Agent response"
            );
        }

        Ok(status)
    }
}

/// Render an error with its sources, `reqwest` keeps the cause (refused,
/// timed out, certificate) in the chain rather than in its own message.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
