//! Outbound ports: what the consensus service needs from its environment.

use crate::domain::ConsensusDecision;
use async_trait::async_trait;
use shared_types::ipc::PbftMessage;
use shared_types::{NodeId, RoundId, ValueDigest};
use std::time::{SystemTime, UNIX_EPOCH};

/// Delivery of protocol messages to peer replicas.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Broadcast a message to every replica, including the sender's own
    /// inbound path. Delivery is best-effort; the quorum math absorbs
    /// losses up to `f`.
    async fn broadcast(&self, message: PbftMessage) -> Result<(), String>;
}

/// Source of the membership snapshot a new round is opened over.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Identifiers of the replicas currently eligible to vote.
    async fn current_members(&self) -> Vec<NodeId>;
}

/// Local acceptance check a replica runs before echoing prepare/commit.
///
/// The default engine validates the digest only; deployments can reject
/// values their replica considers invalid, which the quorum then treats as
/// one silent vote.
pub trait ReplicaVotePolicy: Send + Sync {
    /// True if this replica is willing to vote for the value.
    fn accepts(&self, value: &str, digest: &ValueDigest) -> bool;
}

/// Accepts every well-formed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ReplicaVotePolicy for AcceptAll {
    fn accepts(&self, _value: &str, _digest: &ValueDigest) -> bool {
        true
    }
}

/// Round lifecycle notifications published to the rest of the swarm.
#[async_trait]
pub trait ConsensusEventBus: Send + Sync {
    async fn publish_round_committed(&self, decision: &ConsensusDecision) -> Result<(), String>;
    async fn publish_round_failed(&self, round_id: RoundId, reason: &str) -> Result<(), String>;
    async fn publish_view_changed(
        &self,
        round_id: RoundId,
        new_view: u64,
        new_primary: &NodeId,
    ) -> Result<(), String>;
}

/// Clock abstraction so timeout handling is testable.
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
