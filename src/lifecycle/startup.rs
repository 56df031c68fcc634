//! Startup orchestration and the host-facing lifecycle hooks.
//!
//! # Responsibilities
//! - Resolve every service entry and render every payload before any call
//! - Clear stale registrations left by an earlier, uncleanly stopped process
//! - Spawn one registration loop per service
//! - On stop: raise the shutdown flag, then deregister every service once
//!
//! # Design Decisions
//! - Fail fast: any setup error aborts before a single service is registered
//! - The stale deregister is best effort; registration proceeds regardless
//! - Stopping does not wait for loops; join handles are kept for reporting only

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::agent::{build_payload, HttpExecutor, PayloadError, RegistrationPayload};
use crate::config::{resolve_all, ConfigError, ServiceConfig, ServiceDescriptor};
use crate::lifecycle::readiness::ReadinessGate;
use crate::lifecycle::shutdown::{deregister, deregister_all, Shutdown};
use crate::registration::task::READINESS_POLL_INTERVAL;
use crate::registration::{LoopReport, RegistrationLoop};

/// Errors that abort setup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("sidecar already started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Started,
    Stopped,
}

/// Self-registration of a host process with a discovery agent.
///
/// The host calls [`on_started`](Self::on_started) once its application is
/// up and [`on_stopping`](Self::on_stopping) before it exits.
pub struct Sidecar<E, G: ?Sized> {
    configs: Vec<ServiceConfig>,
    executor: Arc<E>,
    gate: Arc<G>,
    shutdown: Shutdown,
    poll_interval: Duration,
    services: Vec<Arc<ServiceDescriptor>>,
    handles: Vec<JoinHandle<LoopReport>>,
    phase: Phase,
}

impl<E, G> Sidecar<E, G>
where
    E: HttpExecutor,
    G: ReadinessGate + ?Sized,
{
    pub fn new(configs: Vec<ServiceConfig>, executor: Arc<E>, gate: Arc<G>) -> Self {
        Self {
            configs,
            executor,
            gate,
            shutdown: Shutdown::new(),
            poll_interval: READINESS_POLL_INTERVAL,
            services: Vec::new(),
            handles: Vec::new(),
            phase: Phase::Created,
        }
    }

    /// Override the readiness poll cadence of every loop.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validate, build payloads, clear stale registrations, spawn loops.
    pub async fn on_started(&mut self) -> Result<(), SetupError> {
        if self.phase != Phase::Created {
            return Err(SetupError::AlreadyStarted);
        }

        let descriptors = resolve_all(&self.configs)?;
        let payloads = descriptors
            .iter()
            .map(build_payload)
            .collect::<Result<Vec<RegistrationPayload>, PayloadError>>()?;
        self.phase = Phase::Started;

        for (descriptor, payload) in descriptors.into_iter().zip(payloads) {
            tracing::info!(
                service = %descriptor.id,
                payload = %payload.as_str(),
                "Built service JSON"
            );
            let descriptor = Arc::new(descriptor);

            deregister(self.executor.as_ref(), &descriptor).await;

            let task = RegistrationLoop::new(
                descriptor.clone(),
                payload,
                self.executor.clone(),
                self.gate.clone(),
                self.shutdown.subscribe(),
            )
            .with_poll_interval(self.poll_interval);
            self.handles.push(tokio::spawn(task.run()));
            self.services.push(descriptor);
        }

        tracing::info!(services = self.services.len(), "Registration loops started");
        Ok(())
    }

    /// Stop all loops and deregister every service exactly once.
    pub async fn on_stopping(&mut self) {
        if self.phase != Phase::Started {
            return;
        }
        self.phase = Phase::Stopped;

        self.shutdown.trigger();
        deregister_all(self.executor.as_ref(), &self.services).await;

        let (done, total) = self.quiesced();
        tracing::info!(quiesced = done, total, "Deregistration sweep finished");
    }

    /// Number of finished loops, out of all spawned.
    pub fn quiesced(&self) -> (usize, usize) {
        let done = self.handles.iter().filter(|h| h.is_finished()).count();
        (done, self.handles.len())
    }

    pub fn services(&self) -> &[Arc<ServiceDescriptor>] {
        &self.services
    }

    /// Wait for every loop to terminate and collect their reports.
    ///
    /// Only returns after [`on_stopping`](Self::on_stopping) (or drop of the
    /// shutdown coordinator) since loops run until shutdown.
    pub async fn join(self) -> Vec<LoopReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(error = %e, "Registration loop panicked"),
            }
        }
        reports
    }
}
