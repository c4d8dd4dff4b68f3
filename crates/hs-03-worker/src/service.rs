//! Worker service: drives the worker state machine over the outbound ports.
//!
//! The core state sits behind a `parking_lot` mutex that is never held
//! across an await; every async step copies what it needs out, then acts.

use crate::domain::{WorkerCore, WorkerError, WorkerResult, WorkerState};
use crate::ports::{
    DirectiveExecutor, QueenLink, TimeSource, VotePolicy, WorkerApi, WorkerEventBus,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use shared_types::ipc::{
    DirectiveCancelPayload, DirectiveDispatchPayload, DirectiveReportPayload, HeartbeatPayload,
    VoteRequestPayload, VoteResponsePayload,
};
use shared_types::{CapabilitySet, Directive, DirectiveResult, NodeId, SwarmConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

/// Reconnect backoff never sleeps longer than this.
const MAX_BACKOFF_MS: u64 = 30_000;

/// One worker agent.
pub struct WorkerService<L, X, V, E, C> {
    core: Mutex<WorkerCore>,
    config: SwarmConfig,
    link: Arc<L>,
    executor: Arc<X>,
    vote_policy: Arc<V>,
    event_bus: Arc<E>,
    clock: Arc<C>,
    execution_slots: Arc<Semaphore>,
    work_available: Notify,
}

impl<L, X, V, E, C> WorkerService<L, X, V, E, C>
where
    L: QueenLink + 'static,
    X: DirectiveExecutor + 'static,
    V: VotePolicy + 'static,
    E: WorkerEventBus + 'static,
    C: TimeSource + 'static,
{
    pub fn new(
        id: NodeId,
        capabilities: CapabilitySet,
        config: SwarmConfig,
        link: Arc<L>,
        executor: Arc<X>,
        vote_policy: Arc<V>,
        event_bus: Arc<E>,
        clock: Arc<C>,
    ) -> Self {
        let core = WorkerCore::new(
            id,
            capabilities,
            config.directive_queue_capacity(),
            clock.now_ms(),
        );
        let execution_slots = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        Self {
            core: Mutex::new(core),
            config,
            link,
            executor,
            vote_policy,
            event_bus,
            clock,
            execution_slots,
            work_available: Notify::new(),
        }
    }

    /// This worker's identifier.
    #[must_use]
    pub fn worker_id(&self) -> NodeId {
        self.core.lock().id().clone()
    }

    /// Establish the initial session with the queen.
    pub async fn connect(&self) -> WorkerResult<()> {
        let id = {
            let mut core = self.core.lock();
            core.begin_connecting();
            core.id().clone()
        };
        match self.link.connect(&id).await {
            Ok(()) => {
                self.core.lock().connected(self.clock.now_ms());
                info!(worker_id = %id, "worker connected");
                Ok(())
            }
            Err(err) => {
                warn!(worker_id = %id, error = %err, "initial connection failed");
                Err(WorkerError::NotConnected)
            }
        }
    }

    /// Spawn the heartbeat/reconnect loop. While active, heartbeats go out
    /// at the configured cadence; while degraded, reconnect attempts run
    /// with jittered exponential backoff.
    pub fn spawn_heartbeat_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut backoff_attempt: u32 = 0;
            loop {
                let state = service.core.lock().state();
                match state {
                    WorkerState::Active => {
                        tokio::time::sleep(Duration::from_millis(
                            service.config.heartbeat_interval_ms,
                        ))
                        .await;
                        service.heartbeat_once().await;
                        backoff_attempt = 0;
                    }
                    WorkerState::Degraded => {
                        tokio::time::sleep(service.backoff_delay(backoff_attempt)).await;
                        if service.try_reconnect().await {
                            backoff_attempt = 0;
                        } else {
                            backoff_attempt = backoff_attempt.saturating_add(1);
                        }
                    }
                    WorkerState::Disconnected | WorkerState::Connecting => break,
                }
            }
        })
    }

    /// Spawn the executor pump: directives start in enqueue order, at most
    /// `max_concurrent_tasks` in flight.
    pub fn spawn_executor_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let Ok(slot) = Arc::clone(&service.execution_slots).acquire_owned().await else {
                    break;
                };
                let directive = loop {
                    let notified = service.work_available.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if let Some(directive) = service.core.lock().next_directive() {
                        break directive;
                    }
                    notified.await;
                };
                let runner = Arc::clone(&service);
                tokio::spawn(async move {
                    runner.execute_and_report(directive).await;
                    drop(slot);
                });
            }
        })
    }

    /// Build and deliver one heartbeat; a failed delivery feeds the
    /// degradation clock.
    pub async fn heartbeat_once(&self) {
        let heartbeat = {
            let core = self.core.lock();
            HeartbeatPayload {
                worker_id: core.id().clone(),
                health: core.health(),
                load: core.load(),
                sent_at_ms: self.clock.now_ms(),
            }
        };
        match self.link.send_heartbeat(heartbeat.clone()).await {
            Ok(()) => {
                self.core.lock().record_heartbeat_ok(self.clock.now_ms());
                if let Err(err) = self.event_bus.publish_heartbeat(&heartbeat).await {
                    debug!(error = %err, "heartbeat bus publish failed");
                }
            }
            Err(err) => {
                debug!(error = %err, "heartbeat delivery failed");
                let degrade = {
                    let mut core = self.core.lock();
                    core.record_heartbeat_failure();
                    core.should_degrade(
                        self.clock.now_ms(),
                        self.config.worker_timeout_ms,
                        self.config.degradation_threshold,
                    )
                };
                if degrade {
                    self.enter_degraded().await;
                }
            }
        }
    }

    /// One reconnect attempt; on success the worker is active again and
    /// buffered reports are flushed in order.
    pub async fn try_reconnect(&self) -> bool {
        let id = self.worker_id();
        match self.link.connect(&id).await {
            Ok(()) => {
                self.core.lock().connected(self.clock.now_ms());
                info!(worker_id = %id, "worker recovered");
                if let Err(err) = self.event_bus.publish_recovered(&id).await {
                    debug!(error = %err, "recovery bus publish failed");
                }
                self.flush_buffered_reports().await;
                true
            }
            Err(err) => {
                debug!(worker_id = %id, error = %err, "reconnect attempt failed");
                false
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.heartbeat_interval_ms.max(1);
        let capped = base
            .saturating_mul(1_u64 << attempt.min(16))
            .min(MAX_BACKOFF_MS);
        let jittered = rand::thread_rng().gen_range(capped / 2..=capped);
        Duration::from_millis(jittered)
    }

    async fn enter_degraded(&self) {
        let id = {
            let mut core = self.core.lock();
            core.degrade();
            core.id().clone()
        };
        warn!(worker_id = %id, "worker degraded, queen unreachable");
        if let Err(err) = self.event_bus.publish_degraded(&id).await {
            debug!(error = %err, "degradation bus publish failed");
        }
    }

    async fn execute_and_report(&self, directive: Directive) {
        let outcome = self.executor.execute(&directive).await;
        let report = {
            let mut core = self.core.lock();
            core.finish_directive();
            DirectiveReportPayload {
                result: DirectiveResult {
                    directive_id: directive.id,
                    worker_id: core.id().clone(),
                    success: outcome.is_ok(),
                    error: outcome.err(),
                    finished_at_ms: self.clock.now_ms(),
                },
            }
        };
        self.deliver_report(report).await;
    }

    /// Deliver a report, buffering it whenever the queen is unreachable.
    /// Reports are never dropped.
    async fn deliver_report(&self, report: DirectiveReportPayload) {
        if self.core.lock().state() != WorkerState::Active {
            self.core.lock().buffer_report(report);
            return;
        }
        if let Err(err) = self.link.send_report(report.clone()).await {
            debug!(error = %err, "report delivery failed, buffering");
            self.core.lock().buffer_report(report);
        }
    }

    async fn flush_buffered_reports(&self) {
        let buffered = self.core.lock().take_buffered_reports();
        for report in buffered {
            if let Err(err) = self.link.send_report(report.clone()).await {
                debug!(error = %err, "flush failed, re-buffering report");
                self.core.lock().buffer_report(report);
                return;
            }
        }
    }
}

#[async_trait]
impl<L, X, V, E, C> WorkerApi for WorkerService<L, X, V, E, C>
where
    L: QueenLink + 'static,
    X: DirectiveExecutor + 'static,
    V: VotePolicy + 'static,
    E: WorkerEventBus + 'static,
    C: TimeSource + 'static,
{
    async fn receive_directive(&self, dispatch: DirectiveDispatchPayload) -> WorkerResult<()> {
        let result = self.core.lock().enqueue(dispatch.directive);
        if result.is_ok() {
            self.work_available.notify_one();
        }
        result
    }

    async fn cancel_directive(&self, cancel: DirectiveCancelPayload) -> WorkerResult<()> {
        let removed = self.core.lock().remove_queued(cancel.directive_id);
        if !removed {
            debug!(directive_id = %cancel.directive_id,
                "cancellation arrived after execution started");
        }
        Ok(())
    }

    async fn handle_vote_request(
        &self,
        request: VoteRequestPayload,
    ) -> WorkerResult<Option<VoteResponsePayload>> {
        let (id, state, health) = {
            let core = self.core.lock();
            (core.id().clone(), core.state(), core.health())
        };
        if state == WorkerState::Disconnected || state == WorkerState::Connecting {
            return Err(WorkerError::NotConnected);
        }
        Ok(self
            .vote_policy
            .decide(&request, health)
            .map(|(option, confidence)| VoteResponsePayload {
                proposal_id: request.proposal_id,
                voter: id,
                option,
                confidence,
            }))
    }

    async fn state(&self) -> WorkerState {
        self.core.lock().state()
    }

    async fn load(&self) -> u32 {
        self.core.lock().load()
    }
}
