//! Metrics collection and exposition.
//!
//! # Metrics
//! - `consul_sidecar_agent_calls_total` (counter): agent calls by service,
//!   operation (register, check, deregister) and outcome (success, failure)
//! - `consul_sidecar_registered` (gauge): 1 while the last register or check
//!   of a service succeeded, 0 otherwise

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::agent::Operation;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_agent_call(service: &str, operation: Operation, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!(
        "consul_sidecar_agent_calls_total",
        "service" => service.to_string(),
        "operation" => operation.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_registered(service: &str, registered: bool) {
    ::metrics::gauge!("consul_sidecar_registered", "service" => service.to_string())
        .set(if registered { 1.0 } else { 0.0 });
}
