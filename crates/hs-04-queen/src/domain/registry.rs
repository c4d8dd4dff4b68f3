//! Worker registry: `NodeInfo` records, heartbeat bookkeeping, eligibility,
//! and worker selection for dispatch.

use crate::domain::error::{QueenError, QueenResult};
use shared_types::ipc::HeartbeatPayload;
use shared_types::{clamp_health, CapabilitySet, NodeId, NodeInfo, NodeRole, NodeStatus};
use std::collections::BTreeMap;

/// Registered workers, keyed by ID. Capacity-bounded.
#[derive(Debug)]
pub struct WorkerRegistry {
    workers: BTreeMap<NodeId, NodeInfo>,
    max_workers: usize,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            workers: BTreeMap::new(),
            max_workers,
        }
    }

    /// Register a worker, or restore an evicted one. Fresh registrations
    /// beyond `max_workers` are refused; re-registration always succeeds.
    pub fn register(
        &mut self,
        id: NodeId,
        capabilities: CapabilitySet,
        now_ms: u64,
    ) -> QueenResult<()> {
        if let Some(existing) = self.workers.get_mut(&id) {
            existing.capabilities = capabilities;
            existing.status = NodeStatus::Active;
            existing.health = 1.0;
            existing.last_heartbeat_ms = now_ms;
            return Ok(());
        }
        if self.workers.len() >= self.max_workers {
            return Err(QueenError::CapacityExceeded {
                max_workers: self.max_workers,
            });
        }
        self.workers
            .insert(id.clone(), NodeInfo::new(id, NodeRole::Worker, capabilities, now_ms));
        Ok(())
    }

    /// Remove a worker outright.
    pub fn remove(&mut self, id: &NodeId) -> QueenResult<NodeInfo> {
        self.workers
            .remove(id)
            .ok_or_else(|| QueenError::UnknownWorker(id.clone()))
    }

    /// Apply a heartbeat. Returns true when the heartbeat revived a worker
    /// previously marked failed.
    pub fn record_heartbeat(
        &mut self,
        heartbeat: &HeartbeatPayload,
        now_ms: u64,
    ) -> QueenResult<bool> {
        let worker = self
            .workers
            .get_mut(&heartbeat.worker_id)
            .ok_or_else(|| QueenError::UnknownWorker(heartbeat.worker_id.clone()))?;
        let revived = worker.status == NodeStatus::Failed;
        worker.health = clamp_health(heartbeat.health);
        worker.load = heartbeat.load;
        worker.last_heartbeat_ms = now_ms;
        worker.status = NodeStatus::Active;
        Ok(revived)
    }

    /// Mark workers silent past `worker_timeout_ms` as failed. Returns the
    /// newly failed IDs.
    pub fn sweep_failed(&mut self, now_ms: u64, worker_timeout_ms: u64) -> Vec<NodeId> {
        let mut failed = Vec::new();
        for worker in self.workers.values_mut() {
            if worker.status != NodeStatus::Failed
                && now_ms.saturating_sub(worker.last_heartbeat_ms) > worker_timeout_ms
            {
                worker.status = NodeStatus::Failed;
                failed.push(worker.id.clone());
            }
        }
        failed
    }

    /// Pick the dispatch target: eligible workers holding a superset of the
    /// required capabilities, least load first, highest health breaking
    /// ties.
    pub fn select_worker(&self, required: &CapabilitySet) -> QueenResult<NodeId> {
        self.workers
            .values()
            .filter(|w| w.is_eligible() && w.capabilities.is_superset(required))
            .min_by(|a, b| {
                a.load
                    .cmp(&b.load)
                    .then_with(|| b.health.total_cmp(&a.health))
            })
            .map(|w| w.id.clone())
            .ok_or(QueenError::NoEligibleWorker)
    }

    /// Adjust a worker's tracked load as directives are assigned/closed.
    pub fn adjust_load(&mut self, id: &NodeId, delta: i32) {
        if let Some(worker) = self.workers.get_mut(id) {
            worker.load = worker.load.saturating_add_signed(delta);
        }
    }

    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<NodeInfo> {
        self.workers.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.workers.contains_key(id)
    }

    /// IDs of workers currently eligible for directives and votes.
    #[must_use]
    pub fn eligible_ids(&self) -> Vec<NodeId> {
        self.workers
            .values()
            .filter(|w| w.is_eligible())
            .map(|w| w.id.clone())
            .collect()
    }

    /// IDs of all registered, non-failed workers (the election electorate
    /// alongside the queen).
    #[must_use]
    pub fn electorate_ids(&self) -> Vec<NodeId> {
        self.workers
            .values()
            .filter(|w| w.status != NodeStatus::Failed)
            .map(|w| w.id.clone())
            .collect()
    }

    /// (total, active, degraded, failed) worker counts.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut active = 0;
        let mut degraded = 0;
        let mut failed = 0;
        for worker in self.workers.values() {
            match worker.status {
                NodeStatus::Active => active += 1,
                NodeStatus::Degraded => degraded += 1,
                NodeStatus::Failed => failed += 1,
            }
        }
        (self.workers.len(), active, degraded, failed)
    }

    /// Owned snapshot of every record.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.workers.values().cloned().collect()
    }
}
