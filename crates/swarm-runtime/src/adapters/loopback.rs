//! Loopback fabric: transports and membership for a single-process swarm.

use async_trait::async_trait;
use hs_02_consensus::{ConsensusApi, MembershipProvider, PeerTransport};
use hs_04_queen::ElectionTransport;
use parking_lot::RwLock;
use shared_types::ipc::PbftMessage;
use shared_types::NodeId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Delivers protocol messages to every registered replica by calling its
/// inbound port on a spawned task. Replicas register as they come up, so
/// the transport holds trait objects rather than concrete services.
#[derive(Default)]
pub struct LoopbackPeerTransport {
    replicas: RwLock<Vec<(NodeId, Arc<dyn ConsensusApi>)>>,
}

impl LoopbackPeerTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a replica to the fabric.
    pub fn register(&self, id: NodeId, replica: Arc<dyn ConsensusApi>) {
        let mut replicas = self.replicas.write();
        replicas.retain(|(existing, _)| *existing != id);
        replicas.push((id, replica));
    }

    /// Detach a replica; messages no longer reach it.
    pub fn unregister(&self, id: &NodeId) {
        self.replicas.write().retain(|(existing, _)| existing != id);
    }
}

#[async_trait]
impl PeerTransport for LoopbackPeerTransport {
    async fn broadcast(&self, message: PbftMessage) -> Result<(), String> {
        let replicas: Vec<(NodeId, Arc<dyn ConsensusApi>)> = self.replicas.read().clone();
        for (id, replica) in replicas {
            let message = message.clone();
            // Delivery on a fresh task keeps the sender's call stack flat
            // and mimics the asynchrony of a real network.
            tokio::spawn(async move {
                if let Err(err) = replica.handle_message(message).await {
                    debug!(replica = %id, error = %err, "replica discarded message");
                }
            });
        }
        Ok(())
    }
}

/// Membership snapshot shared by every replica. The runtime updates it as
/// nodes join and leave; new rounds open over the current set.
#[derive(Default)]
pub struct SharedMembership {
    members: RwLock<BTreeSet<NodeId>>,
}

impl SharedMembership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: NodeId) {
        self.members.write().insert(id);
    }

    pub fn remove(&self, id: &NodeId) {
        self.members.write().remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

#[async_trait]
impl MembershipProvider for SharedMembership {
    async fn current_members(&self) -> Vec<NodeId> {
        self.members.read().iter().cloned().collect()
    }
}

/// Election transport for a swarm with a single queen candidate: every
/// polled voter grants its vote.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackElectionTransport;

#[async_trait]
impl ElectionTransport for LoopbackElectionTransport {
    async fn request_vote(
        &self,
        _peer: &NodeId,
        _candidate: &NodeId,
        _term: u64,
    ) -> Result<bool, String> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_tracks_joins_and_leaves() {
        let membership = SharedMembership::new();
        membership.add(NodeId::new("a"));
        membership.add(NodeId::new("b"));
        membership.remove(&NodeId::new("a"));
        assert_eq!(membership.current_members().await, vec![NodeId::new("b")]);
    }
}
