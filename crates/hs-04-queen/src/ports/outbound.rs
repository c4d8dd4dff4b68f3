//! Outbound ports: what the queen service needs from its environment.

use async_trait::async_trait;
use hs_02_consensus::ConsensusError;
use shared_types::ipc::{DirectiveCancelPayload, DirectiveDispatchPayload, VoteRequestPayload};
use shared_types::{DirectiveId, NodeId, ProposalId};
use std::time::{SystemTime, UNIX_EPOCH};

/// Vote collection during elections.
#[async_trait]
pub trait ElectionTransport: Send + Sync {
    /// Ask one node for its vote in `term`. `Ok(false)` is a refusal;
    /// `Err` is an unreachable voter (counted as a refusal).
    async fn request_vote(
        &self,
        peer: &NodeId,
        candidate: &NodeId,
        term: u64,
    ) -> Result<bool, String>;
}

/// Point-to-point delivery from the queen to a worker.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Deliver a directive to its selected worker.
    async fn dispatch_directive(
        &self,
        worker: &NodeId,
        dispatch: DirectiveDispatchPayload,
    ) -> Result<(), String>;

    /// Advisory cancellation notice.
    async fn cancel_directive(
        &self,
        worker: &NodeId,
        cancel: DirectiveCancelPayload,
    ) -> Result<(), String>;

    /// Ask a worker for its vote on a proposal.
    async fn request_vote(&self, worker: &NodeId, request: VoteRequestPayload)
        -> Result<(), String>;
}

/// Byzantine proposal delegation to the PBFT engine.
#[async_trait]
pub trait ConsensusGateway: Send + Sync {
    /// Drive a PBFT round for the proposal's value; resolves to the
    /// committed value.
    async fn decide(&self, proposal_id: ProposalId, value: String)
        -> Result<String, ConsensusError>;
}

/// Narrow port to the collective-memory collaborator. Failures are logged
/// and ignored; memory is never required for correctness.
#[async_trait]
pub trait MemoryGateway: Send + Sync {
    async fn store(&self, key: String, value: serde_json::Value) -> Result<(), String>;
    async fn retrieve(&self, key: &str) -> Result<Option<serde_json::Value>, String>;
    async fn search_similar(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<(String, serde_json::Value)>, String>;
}

/// Coordination notifications published to the rest of the swarm.
#[async_trait]
pub trait QueenEventBus: Send + Sync {
    async fn publish_leader_elected(&self, queen_id: &NodeId, term: u64) -> Result<(), String>;
    async fn publish_worker_registered(&self, worker_id: &NodeId) -> Result<(), String>;
    async fn publish_worker_removed(&self, worker_id: &NodeId, evicted: bool)
        -> Result<(), String>;
    async fn publish_directive_closed(
        &self,
        directive_id: DirectiveId,
        status: &str,
    ) -> Result<(), String>;
    async fn publish_proposal_decided(
        &self,
        proposal_id: ProposalId,
        accepted: Option<String>,
    ) -> Result<(), String>;
}

/// Clock abstraction so eviction and deadline sweeps are testable.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
