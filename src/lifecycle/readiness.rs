//! Host readiness gating.
//!
//! # Responsibilities
//! - Answer "are at least N workers accepting connections?"
//! - Keep the answer cheap: loops poll it once per interval
//!
//! # Design Decisions
//! - The host publishes a single atomic count, not a per-worker table
//! - The sidecar binary derives the count from TCP probes of worker addresses

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use crate::lifecycle::shutdown::ShutdownSignal;

/// Host-provided predicate consulted before the first registration.
pub trait ReadinessGate: Send + Sync + 'static {
    fn is_ready(&self, min_count: usize) -> bool;
}

/// Gate that is always open.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl ReadinessGate for AlwaysReady {
    fn is_ready(&self, _min_count: usize) -> bool {
        true
    }
}

/// Number of workers currently accepting connections.
#[derive(Debug, Default)]
pub struct WorkerReadiness {
    accepting: AtomicUsize,
}

impl WorkerReadiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker started accepting connections.
    pub fn mark_accepting(&self) {
        self.accepting.fetch_add(1, Ordering::SeqCst);
    }

    /// A worker stopped accepting connections.
    pub fn mark_busy(&self) {
        let _ = self
            .accepting
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Replace the count with a fresh snapshot.
    pub fn set_accepting(&self, count: usize) {
        self.accepting.store(count, Ordering::SeqCst);
    }

    pub fn accepting(&self) -> usize {
        self.accepting.load(Ordering::SeqCst)
    }
}

impl ReadinessGate for WorkerReadiness {
    fn is_ready(&self, min_count: usize) -> bool {
        self.accepting() >= min_count
    }
}

/// Publishes how many worker addresses accept a TCP connection.
pub struct TcpProbe {
    addresses: Vec<SocketAddr>,
    interval: Duration,
    connect_timeout: Duration,
    readiness: Arc<WorkerReadiness>,
}

impl TcpProbe {
    pub fn new(addresses: Vec<SocketAddr>, interval: Duration, readiness: Arc<WorkerReadiness>) -> Self {
        Self {
            addresses,
            interval,
            connect_timeout: interval.min(Duration::from_secs(1)),
            readiness,
        }
    }

    /// Probe every address once and publish the count.
    pub async fn probe_once(&self) -> usize {
        let mut accepting = 0;
        for addr in &self.addresses {
            if let Ok(Ok(_)) = time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                accepting += 1;
            }
        }
        self.readiness.set_accepting(accepting);
        accepting
    }

    /// Probe until shutdown.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            workers = self.addresses.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Readiness probe starting"
        );

        let mut last = None;
        loop {
            let accepting = self.probe_once().await;
            if last != Some(accepting) {
                tracing::debug!(accepting, total = self.addresses.len(), "Worker readiness changed");
                last = Some(accepting);
            }
            if !shutdown.sleep(self.interval).await {
                break;
            }
        }

        tracing::info!("Readiness probe received shutdown signal, exiting loop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::Shutdown;
    use tokio::net::TcpListener;

    #[test]
    fn test_worker_readiness() {
        let readiness = WorkerReadiness::new();
        assert!(readiness.is_ready(0));
        assert!(!readiness.is_ready(1));

        readiness.mark_accepting();
        readiness.mark_accepting();
        assert!(readiness.is_ready(2));
        assert!(!readiness.is_ready(3));

        readiness.mark_busy();
        assert_eq!(readiness.accepting(), 1);
        readiness.mark_busy();
        readiness.mark_busy();
        assert_eq!(readiness.accepting(), 0);

        readiness.set_accepting(4);
        assert!(readiness.is_ready(4));
    }

    #[test]
    fn test_always_ready() {
        assert!(AlwaysReady.is_ready(usize::MAX));
    }

    #[tokio::test]
    async fn test_tcp_probe_counts_listeners() {
        let up = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let down = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let down_addr = down.local_addr().unwrap();
        drop(down);

        let readiness = Arc::new(WorkerReadiness::new());
        let probe = TcpProbe::new(
            vec![up.local_addr().unwrap(), down_addr],
            Duration::from_millis(100),
            readiness.clone(),
        );

        assert_eq!(probe.probe_once().await, 1);
        assert!(readiness.is_ready(1));
        assert!(!readiness.is_ready(2));
    }

    #[tokio::test]
    async fn test_tcp_probe_stops_on_shutdown() {
        let readiness = Arc::new(WorkerReadiness::new());
        let probe = TcpProbe::new(Vec::new(), Duration::from_millis(50), readiness);

        let shutdown = Shutdown::new();
        let task = tokio::spawn(probe.run(shutdown.subscribe()));
        shutdown.trigger();

        time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
