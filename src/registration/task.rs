//! The registration loop of one service.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{call, AgentRequest, HttpExecutor, RegistrationPayload};
use crate::config::ServiceDescriptor;
use crate::lifecycle::readiness::ReadinessGate;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::registration::state::RegistrationState;

/// Delay between readiness gate polls.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Counters returned when a loop terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub service_id: String,
    /// Successful registrations.
    pub registrations: u64,
    /// Successful health passes.
    pub checks: u64,
    /// Failed register or check calls.
    pub failures: u64,
}

/// Registration state machine for one service.
pub struct RegistrationLoop<E, G: ?Sized> {
    descriptor: Arc<ServiceDescriptor>,
    payload: RegistrationPayload,
    executor: Arc<E>,
    gate: Arc<G>,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
    report: LoopReport,
}

impl<E, G> RegistrationLoop<E, G>
where
    E: HttpExecutor,
    G: ReadinessGate + ?Sized,
{
    pub fn new(
        descriptor: Arc<ServiceDescriptor>,
        payload: RegistrationPayload,
        executor: Arc<E>,
        gate: Arc<G>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let report = LoopReport {
            service_id: descriptor.id.clone(),
            ..LoopReport::default()
        };
        Self {
            descriptor,
            payload,
            executor,
            gate,
            shutdown,
            poll_interval: READINESS_POLL_INTERVAL,
            report,
        }
    }

    /// Override the readiness poll cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn report(&self) -> &LoopReport {
        &self.report
    }

    /// Run until shutdown, returning the loop's counters.
    pub async fn run(mut self) -> LoopReport {
        tracing::info!(
            service = %self.descriptor.id,
            name = %self.descriptor.name,
            register_url = %self.descriptor.register_url,
            check_url = %self.descriptor.check_url,
            "Registration loop started"
        );

        let mut state = RegistrationState::initial(self.descriptor.min_ready_workers);
        if state == RegistrationState::WaitReady {
            tracing::info!(
                service = %self.descriptor.id,
                min_ready_workers = self.descriptor.min_ready_workers,
                "Waiting for workers before registering service"
            );
        }

        while !state.is_terminal() {
            let next = self.step(state).await;
            if next != state {
                tracing::debug!(service = %self.descriptor.id, from = %state, to = %next, "State transition");
            }
            state = next;
        }

        tracing::info!(
            service = %self.descriptor.id,
            registrations = self.report.registrations,
            checks = self.report.checks,
            failures = self.report.failures,
            "Registration loop stopped"
        );
        self.report
    }

    /// Perform one transition from `state`.
    pub async fn step(&mut self, state: RegistrationState) -> RegistrationState {
        if self.shutdown.is_triggered() {
            return RegistrationState::Terminated;
        }

        match state {
            RegistrationState::WaitReady => {
                if self.gate.is_ready(self.descriptor.min_ready_workers) {
                    tracing::info!(service = %self.descriptor.id, "Workers ready, registering service");
                    RegistrationState::Registering
                } else if self.shutdown.sleep(self.poll_interval).await {
                    RegistrationState::WaitReady
                } else {
                    RegistrationState::Terminated
                }
            }
            RegistrationState::Registering => {
                let request = AgentRequest::register(&self.descriptor, &self.payload);
                if self.agent_call(request).await {
                    self.report.registrations += 1;
                    metrics::record_registered(&self.descriptor.id, true);
                    tracing::info!(service = %self.descriptor.id, "Service registered");
                    RegistrationState::Checking
                } else {
                    metrics::record_registered(&self.descriptor.id, false);
                    RegistrationState::Backoff
                }
            }
            RegistrationState::Checking => {
                let request = AgentRequest::check(&self.descriptor);
                if !self.agent_call(request).await {
                    metrics::record_registered(&self.descriptor.id, false);
                    return RegistrationState::Backoff;
                }
                self.report.checks += 1;

                if self.shutdown.sleep(self.descriptor.check_interval()).await
                    && !self.shutdown.is_triggered()
                {
                    RegistrationState::Checking
                } else {
                    RegistrationState::Terminated
                }
            }
            RegistrationState::Backoff => {
                tracing::debug!(
                    service = %self.descriptor.id,
                    delay_secs = self.descriptor.ttl_secs,
                    "Retrying registration after delay"
                );
                if self.shutdown.sleep(self.descriptor.ttl()).await {
                    RegistrationState::Registering
                } else {
                    RegistrationState::Terminated
                }
            }
            RegistrationState::Terminated => RegistrationState::Terminated,
        }
    }

    /// Issue one agent call, logging and counting a failure.
    async fn agent_call(&mut self, request: AgentRequest) -> bool {
        let operation = request.operation;
        let url = request.url.clone();

        match call(self.executor.as_ref(), request).await {
            Ok(()) => {
                metrics::record_agent_call(&self.descriptor.id, operation, true);
                true
            }
            Err(e) => {
                self.report.failures += 1;
                metrics::record_agent_call(&self.descriptor.id, operation, false);
                tracing::warn!(
                    service = %self.descriptor.id,
                    operation = %operation,
                    url = %url,
                    error = %e,
                    "Agent call failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{build_payload, Operation, TransportError};
    use crate::config::kvlist::parse_service_spec;
    use crate::lifecycle::readiness::{AlwaysReady, WorkerReadiness};
    use crate::lifecycle::shutdown::Shutdown;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    type Responder = Box<dyn Fn(Operation, usize) -> Result<u16, TransportError> + Send + Sync>;

    /// In-memory agent answering from a script keyed by operation and the
    /// per-operation call index.
    struct ScriptedAgent {
        calls: Mutex<Vec<(Operation, Instant)>>,
        respond: Responder,
    }

    impl ScriptedAgent {
        fn new(
            respond: impl Fn(Operation, usize) -> Result<u16, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn ok() -> Arc<Self> {
            Self::new(|_, _| Ok(200))
        }

        fn operations(&self) -> Vec<Operation> {
            self.calls.lock().unwrap().iter().map(|(op, _)| *op).collect()
        }

        fn times(&self, operation: Operation) -> Vec<Instant> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(op, _)| *op == operation)
                .map(|(_, at)| *at)
                .collect()
        }
    }

    impl HttpExecutor for ScriptedAgent {
        async fn execute(&self, request: AgentRequest) -> Result<u16, TransportError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                let index = calls.iter().filter(|(op, _)| *op == request.operation).count();
                calls.push((request.operation, Instant::now()));
                index
            };
            (self.respond)(request.operation, index)
        }
    }

    struct CountingGate {
        polls: AtomicUsize,
        ready_after: usize,
    }

    impl ReadinessGate for CountingGate {
        fn is_ready(&self, _min_count: usize) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.ready_after
        }
    }

    fn descriptor(spec: &str) -> Arc<ServiceDescriptor> {
        let config = parse_service_spec(spec).unwrap();
        Arc::new(ServiceDescriptor::from_config(&config).unwrap())
    }

    fn registration_loop<G: ReadinessGate + ?Sized>(
        spec: &str,
        agent: Arc<ScriptedAgent>,
        gate: Arc<G>,
        shutdown: &Shutdown,
    ) -> RegistrationLoop<ScriptedAgent, G> {
        let descriptor = descriptor(spec);
        let payload = build_payload(&descriptor).unwrap();
        RegistrationLoop::new(descriptor, payload, agent, gate, shutdown.subscribe())
    }

    const SERVICE: &str = "name=api,url=http://agent:8500,ttl=9,wait_workers=0";

    #[tokio::test(start_paused = true)]
    async fn test_register_failure_backs_off_for_ttl() {
        let agent = ScriptedAgent::new(|_, _| Ok(500));
        let shutdown = Shutdown::new();
        let mut task = registration_loop(SERVICE, agent.clone(), Arc::new(AlwaysReady), &shutdown);

        let next = task.step(RegistrationState::Registering).await;
        assert_eq!(next, RegistrationState::Backoff);

        let start = Instant::now();
        let next = task.step(RegistrationState::Backoff).await;
        assert_eq!(next, RegistrationState::Registering);
        assert_eq!(start.elapsed(), Duration::from_secs(9));
        assert_eq!(task.report().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_failure_never_checks() {
        let agent = ScriptedAgent::new(|_, _| Ok(500));
        let shutdown = Shutdown::new();
        let task = registration_loop(SERVICE, agent.clone(), Arc::new(AlwaysReady), &shutdown);
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_secs(40)).await;
        shutdown.trigger();
        let report = handle.await.unwrap();

        let registers = agent.times(Operation::Register);
        assert_eq!(registers.len(), 5);
        for pair in registers.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(9));
        }
        assert!(agent.times(Operation::Check).is_empty());
        assert_eq!(report.registrations, 0);
        assert_eq!(report.failures, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_a_failure() {
        let agent = ScriptedAgent::new(|_, _| {
            Err(TransportError::new("http://agent:8500", "connection refused"))
        });
        let shutdown = Shutdown::new();
        let mut task = registration_loop(SERVICE, agent, Arc::new(AlwaysReady), &shutdown);

        assert_eq!(
            task.step(RegistrationState::Registering).await,
            RegistrationState::Backoff
        );
        assert_eq!(
            task.step(RegistrationState::Checking).await,
            RegistrationState::Backoff
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_checks_stay_in_checking() {
        let agent = ScriptedAgent::ok();
        let shutdown = Shutdown::new();
        let task = registration_loop(SERVICE, agent.clone(), Arc::new(AlwaysReady), &shutdown);
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.trigger();
        let report = handle.await.unwrap();

        assert_eq!(agent.times(Operation::Register).len(), 1);
        let checks = agent.times(Operation::Check);
        assert_eq!(checks.len(), 4);
        for pair in checks.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(3));
        }
        assert_eq!(report.registrations, 1);
        assert_eq!(report.checks, 4);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_goes_back_through_registration() {
        let agent = ScriptedAgent::new(|op, index| match (op, index) {
            (Operation::Check, 1) => Ok(503),
            _ => Ok(200),
        });
        let shutdown = Shutdown::new();
        let task = registration_loop(SERVICE, agent.clone(), Arc::new(AlwaysReady), &shutdown);
        let handle = tokio::spawn(task.run());

        // register t=0, check t=0, check t=3 fails, backoff 9s, register t=12, check t=12
        tokio::time::sleep(Duration::from_secs(13)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(
            agent.operations(),
            vec![
                Operation::Register,
                Operation::Check,
                Operation::Check,
                Operation::Register,
                Operation::Check,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_calls() {
        let agent = ScriptedAgent::ok();
        let shutdown = Shutdown::new();
        let task = registration_loop(SERVICE, agent.clone(), Arc::new(AlwaysReady), &shutdown);
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let before = agent.operations().len();
        let triggered_at = Instant::now();
        shutdown.trigger();

        handle.await.unwrap();
        assert_eq!(triggered_at.elapsed(), Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(agent.operations().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_state_terminates_after_shutdown() {
        let shutdown = Shutdown::new();
        let mut task =
            registration_loop(SERVICE, ScriptedAgent::ok(), Arc::new(AlwaysReady), &shutdown);
        shutdown.trigger();

        for state in [
            RegistrationState::WaitReady,
            RegistrationState::Registering,
            RegistrationState::Checking,
            RegistrationState::Backoff,
            RegistrationState::Terminated,
        ] {
            assert_eq!(task.step(state).await, RegistrationState::Terminated);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_readiness_gate() {
        let agent = ScriptedAgent::ok();
        let readiness = Arc::new(WorkerReadiness::new());
        let shutdown = Shutdown::new();
        let task = registration_loop(
            "name=api,url=http://agent:8500,ttl=9,wait_workers=2",
            agent.clone(),
            readiness.clone(),
            &shutdown,
        );
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert!(agent.operations().is_empty());

        readiness.mark_accepting();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(agent.operations().is_empty());

        readiness.mark_accepting();
        let ready_at = Instant::now();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let registers = agent.times(Operation::Register);
        assert_eq!(registers.len(), 1);
        assert!(registers[0] - ready_at <= READINESS_POLL_INTERVAL);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ungated_service_skips_readiness() {
        let agent = ScriptedAgent::ok();
        let gate = Arc::new(CountingGate {
            polls: AtomicUsize::new(0),
            ready_after: usize::MAX,
        });
        let shutdown = Shutdown::new();
        let task = registration_loop(SERVICE, agent.clone(), gate.clone(), &shutdown);
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(gate.polls.load(Ordering::SeqCst), 0);
        assert_eq!(agent.operations()[0], Operation::Register);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_polled_at_interval() {
        let gate = Arc::new(CountingGate {
            polls: AtomicUsize::new(0),
            ready_after: 3,
        });
        let shutdown = Shutdown::new();
        let mut task = registration_loop(
            "name=api,url=http://agent:8500,ttl=9",
            ScriptedAgent::ok(),
            gate,
            &shutdown,
        )
        .with_poll_interval(Duration::from_millis(250));

        let start = Instant::now();
        let mut state = RegistrationState::WaitReady;
        while state == RegistrationState::WaitReady {
            state = task.step(state).await;
        }
        assert_eq!(state, RegistrationState::Registering);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }
}
