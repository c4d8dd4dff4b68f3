//! Worker state machine and bounded directive queue.
//!
//! # Invariants
//!
//! - The queue plus in-flight work never exceeds
//!   `max_concurrent_tasks * backlog_factor`.
//! - Directives start executing in enqueue order.
//! - A degraded worker accepts no new directives but keeps draining what it
//!   already holds; its reports are buffered, never dropped.

use crate::domain::error::{WorkerError, WorkerResult};
use serde::{Deserialize, Serialize};
use shared_types::ipc::DirectiveReportPayload;
use shared_types::{clamp_health, CapabilitySet, Directive, DirectiveId, NodeId};
use std::collections::VecDeque;

/// Health adjustment applied per heartbeat delivery outcome.
const HEALTH_STEP: f64 = 0.1;

/// Lifecycle state of a worker agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerState {
    /// Not yet connected to a queen.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected; accepting and executing directives.
    Active,
    /// Queen unreachable; draining only, reconnecting with backoff.
    Degraded,
}

/// Pure worker state: queue, health, and degradation bookkeeping.
#[derive(Debug)]
pub struct WorkerCore {
    id: NodeId,
    capabilities: CapabilitySet,
    state: WorkerState,
    queue: VecDeque<Directive>,
    queue_capacity: usize,
    in_flight: u32,
    health: f64,
    last_ok_heartbeat_ms: u64,
    buffered_reports: VecDeque<DirectiveReportPayload>,
}

impl WorkerCore {
    #[must_use]
    pub fn new(id: NodeId, capabilities: CapabilitySet, queue_capacity: usize, now_ms: u64) -> Self {
        Self {
            id,
            capabilities,
            state: WorkerState::Disconnected,
            queue: VecDeque::new(),
            queue_capacity,
            in_flight: 0,
            health: 1.0,
            last_ok_heartbeat_ms: now_ms,
            buffered_reports: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[must_use]
    pub fn health(&self) -> f64 {
        self.health
    }

    /// Directives queued plus executing.
    #[must_use]
    pub fn load(&self) -> u32 {
        self.queue.len() as u32 + self.in_flight
    }

    /// Accept a directive into the queue.
    pub fn enqueue(&mut self, directive: Directive) -> WorkerResult<()> {
        match self.state {
            WorkerState::Disconnected | WorkerState::Connecting => {
                return Err(WorkerError::NotConnected)
            }
            WorkerState::Degraded => return Err(WorkerError::Degraded),
            WorkerState::Active => {}
        }
        if self.load() as usize >= self.queue_capacity {
            return Err(WorkerError::QueueFull {
                capacity: self.queue_capacity,
            });
        }
        self.queue.push_back(directive);
        Ok(())
    }

    /// Pop the oldest queued directive for execution. Draining continues in
    /// every state, including degraded.
    pub fn next_directive(&mut self) -> Option<Directive> {
        let directive = self.queue.pop_front()?;
        self.in_flight += 1;
        Some(directive)
    }

    /// Mark one in-flight directive finished.
    pub fn finish_directive(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Remove a still-queued directive. Returns false when the directive is
    /// already executing or unknown (cancellation is advisory).
    pub fn remove_queued(&mut self, id: DirectiveId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|d| d.id != id);
        self.queue.len() != before
    }

    pub fn begin_connecting(&mut self) {
        if self.state == WorkerState::Disconnected {
            self.state = WorkerState::Connecting;
        }
    }

    /// Connection (or reconnection) established.
    pub fn connected(&mut self, now_ms: u64) {
        self.state = WorkerState::Active;
        self.last_ok_heartbeat_ms = now_ms;
    }

    pub fn record_heartbeat_ok(&mut self, now_ms: u64) {
        self.last_ok_heartbeat_ms = now_ms;
        self.health = clamp_health(self.health + HEALTH_STEP);
    }

    pub fn record_heartbeat_failure(&mut self) {
        self.health = clamp_health(self.health - HEALTH_STEP);
    }

    /// True when heartbeat silence has outlasted
    /// `worker_timeout_ms * degradation_threshold`.
    #[must_use]
    pub fn should_degrade(&self, now_ms: u64, worker_timeout_ms: u64, threshold: u32) -> bool {
        self.state == WorkerState::Active
            && now_ms.saturating_sub(self.last_ok_heartbeat_ms)
                > worker_timeout_ms * u64::from(threshold)
    }

    pub fn degrade(&mut self) {
        self.state = WorkerState::Degraded;
    }

    /// Hold a report for delivery once the queen is reachable again.
    pub fn buffer_report(&mut self, report: DirectiveReportPayload) {
        self.buffered_reports.push_back(report);
    }

    /// Drain buffered reports in arrival order.
    pub fn take_buffered_reports(&mut self) -> Vec<DirectiveReportPayload> {
        self.buffered_reports.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::DirectiveResult;

    fn directive(tag: &str) -> Directive {
        Directive::new(tag, serde_json::json!({}), CapabilitySet::default(), 50, 0)
    }

    fn active_core(capacity: usize) -> WorkerCore {
        let mut core = WorkerCore::new(NodeId::new("w1"), CapabilitySet::default(), capacity, 0);
        core.begin_connecting();
        core.connected(0);
        core
    }

    #[test]
    fn enqueue_requires_connection() {
        let mut core = WorkerCore::new(NodeId::new("w1"), CapabilitySet::default(), 4, 0);
        assert!(matches!(
            core.enqueue(directive("a")),
            Err(WorkerError::NotConnected)
        ));
    }

    #[test]
    fn queue_full_counts_in_flight_work() {
        let mut core = active_core(2);
        core.enqueue(directive("a")).unwrap();
        core.next_directive().unwrap();
        core.enqueue(directive("b")).unwrap();
        // One executing + one queued = capacity 2.
        assert!(matches!(
            core.enqueue(directive("c")),
            Err(WorkerError::QueueFull { capacity: 2 })
        ));
        core.finish_directive();
        core.next_directive().unwrap();
        core.enqueue(directive("c")).unwrap();
    }

    #[test]
    fn directives_start_in_enqueue_order() {
        let mut core = active_core(8);
        for tag in ["a", "b", "c"] {
            core.enqueue(directive(tag)).unwrap();
        }
        let order: Vec<String> = std::iter::from_fn(|| core.next_directive())
            .map(|d| d.directive_type)
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn degraded_rejects_new_but_keeps_draining() {
        let mut core = active_core(8);
        core.enqueue(directive("a")).unwrap();
        core.enqueue(directive("b")).unwrap();
        core.degrade();
        assert!(matches!(
            core.enqueue(directive("c")),
            Err(WorkerError::Degraded)
        ));
        // Queued order survives the degradation round-trip.
        assert_eq!(core.next_directive().unwrap().directive_type, "a");
        core.connected(10);
        assert_eq!(core.next_directive().unwrap().directive_type, "b");
    }

    #[test]
    fn degradation_threshold_is_a_multiple_of_worker_timeout() {
        let mut core = active_core(4);
        core.record_heartbeat_ok(1_000);
        // worker_timeout 5000ms, threshold 3: silence must exceed 15s.
        assert!(!core.should_degrade(16_000, 5_000, 3));
        assert!(core.should_degrade(16_001, 5_000, 3));
    }

    #[test]
    fn health_tracks_heartbeat_outcomes_clamped() {
        let mut core = active_core(4);
        for _ in 0..20 {
            core.record_heartbeat_failure();
        }
        assert_eq!(core.health(), 0.0);
        for _ in 0..20 {
            core.record_heartbeat_ok(1);
        }
        assert_eq!(core.health(), 1.0);
    }

    #[test]
    fn buffered_reports_drain_in_order() {
        let mut core = active_core(4);
        for (i, id) in [DirectiveId::new(), DirectiveId::new()].into_iter().enumerate() {
            core.buffer_report(DirectiveReportPayload {
                result: DirectiveResult {
                    directive_id: id,
                    worker_id: core.id().clone(),
                    success: true,
                    error: None,
                    finished_at_ms: i as u64,
                },
            });
        }
        let drained = core.take_buffered_reports();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].result.finished_at_ms < drained[1].result.finished_at_ms);
        assert!(core.take_buffered_reports().is_empty());
    }

    #[test]
    fn cancellation_removes_only_queued_directives() {
        let mut core = active_core(4);
        let a = directive("a");
        let a_id = a.id;
        core.enqueue(a).unwrap();
        core.enqueue(directive("b")).unwrap();
        let executing = core.next_directive().unwrap();
        assert_eq!(executing.id, a_id);
        // Already executing: advisory, nothing to remove.
        assert!(!core.remove_queued(a_id));
        let b_id = core.queue.front().unwrap().id;
        assert!(core.remove_queued(b_id));
        assert_eq!(core.load(), 1);
    }
}
