//! Inbound port: the API operators and transports drive on the queen.

use crate::domain::{QueenResult, QueenState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::ipc::{DirectiveReportPayload, HeartbeatPayload, VoteResponsePayload};
use shared_types::{
    CapabilitySet, ConsensusType, Directive, DirectiveId, NodeId, NodeInfo, Proposal, ProposalId,
};

/// Aggregate swarm counters reported by [`QueenApi::swarm_metrics`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmMetricsReport {
    pub workers_total: usize,
    pub workers_active: usize,
    pub workers_degraded: usize,
    pub workers_failed: usize,
    pub directives_pending: usize,
    pub directives_dispatched: usize,
    pub directives_completed: usize,
    pub directives_failed: usize,
    pub proposals_open: usize,
    pub proposals_accepted: usize,
    pub proposals_no_consensus: usize,
}

/// Coordination surface of the queen.
#[async_trait]
pub trait QueenApi: Send + Sync {
    /// Run the election. Returns once this queen is leader, or with
    /// `ElectionTimeout` after the bounded retries (the queen stays
    /// candidate and, with failover enabled, keeps retrying in the
    /// background).
    async fn initialize(&self) -> QueenResult<()>;

    /// Current lifecycle state.
    async fn state(&self) -> QueenState;

    /// Register a worker with its capabilities.
    async fn register_worker(&self, id: NodeId, capabilities: CapabilitySet) -> QueenResult<()>;

    /// Remove a worker; its in-flight directives return to pending.
    async fn remove_worker(&self, id: &NodeId) -> QueenResult<()>;

    /// Apply a worker heartbeat.
    async fn receive_heartbeat(&self, heartbeat: HeartbeatPayload) -> QueenResult<()>;

    /// Issue a directive. It dispatches immediately when an eligible worker
    /// exists, otherwise stays pending and is retried as membership and
    /// health change.
    async fn issue_directive(
        &self,
        directive_type: String,
        payload: serde_json::Value,
        required_capabilities: CapabilitySet,
        priority: u8,
    ) -> QueenResult<DirectiveId>;

    /// Advisory cancellation of a non-terminal directive.
    async fn cancel_directive(&self, id: DirectiveId) -> QueenResult<()>;

    /// Apply a worker's execution report.
    async fn receive_report(&self, report: DirectiveReportPayload) -> QueenResult<()>;

    /// Owned copy of a directive record.
    async fn directive_status(&self, id: DirectiveId) -> QueenResult<Directive>;

    /// Open a proposal. Returns the ID immediately; resolution is
    /// retrieved via [`Self::proposal_status`].
    async fn propose_decision(
        &self,
        question: String,
        options: Vec<String>,
        consensus_type: ConsensusType,
    ) -> QueenResult<ProposalId>;

    /// Apply a worker's vote.
    async fn receive_vote(&self, vote: VoteResponsePayload) -> QueenResult<()>;

    /// Owned copy of a proposal record.
    async fn proposal_status(&self, id: ProposalId) -> QueenResult<Proposal>;

    /// Cancel an open proposal.
    async fn cancel_proposal(&self, id: ProposalId) -> QueenResult<()>;

    /// Owned snapshot of all worker records.
    async fn worker_snapshot(&self) -> Vec<NodeInfo>;

    /// Aggregate swarm counters.
    async fn swarm_metrics(&self) -> SwarmMetricsReport;
}
