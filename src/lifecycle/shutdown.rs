//! Shutdown coordination for the sidecar.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::agent::{AgentRequest, HttpExecutor, Operation};
use crate::config::ServiceDescriptor;
use crate::observability::metrics;

/// Coordinator for graceful shutdown.
///
/// Combines a write-once flag with a broadcast channel: loops poll the flag at
/// their check points and wait on the channel while sleeping.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Set once, never cleared.
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            triggered: self.triggered.clone(),
            closed: false,
        }
    }

    /// Trigger the shutdown signal. Returns false if it was already triggered.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's view of the shutdown signal.
///
/// Dropping the [`Shutdown`] without triggering it also counts as shutdown,
/// so no loop outlives its coordinator.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
    closed: bool,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.closed || self.triggered.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is triggered.
    pub async fn recv(&mut self) {
        while !self.is_triggered() {
            match self.rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => self.closed = true,
            }
        }
    }

    /// Sleep for `duration` unless shutdown comes first.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the sleep
    /// was cut short (or never started) because of shutdown.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.recv() => false,
        }
    }
}

/// Best-effort deregistration of one service.
///
/// The response code is logged and otherwise ignored; failures are never
/// retried.
pub async fn deregister<E: HttpExecutor>(executor: &E, descriptor: &ServiceDescriptor) {
    let request = AgentRequest::deregister(descriptor);
    match executor.execute(request).await {
        Ok(status) => {
            tracing::info!(
                service = %descriptor.id,
                url = %descriptor.deregister_url,
                status,
                "Deregister call completed"
            );
            metrics::record_agent_call(&descriptor.id, Operation::Deregister, status == 200);
        }
        Err(e) => {
            tracing::warn!(service = %descriptor.id, error = %e, "Deregister call failed");
            metrics::record_agent_call(&descriptor.id, Operation::Deregister, false);
        }
    }
    metrics::record_registered(&descriptor.id, false);
}

/// Issue exactly one deregister call per service, in order.
pub async fn deregister_all<E: HttpExecutor>(executor: &E, services: &[Arc<ServiceDescriptor>]) {
    for descriptor in services {
        tracing::info!(service = %descriptor.id, url = %descriptor.deregister_url, "Deregistering");
        deregister(executor, descriptor).await;
    }
}
