//! Driven ports (Outbound dependencies)

use async_trait::async_trait;
use shared_types::{NodeId, TopologyType};

/// Event bus notifications published by the topology manager.
///
/// Publishing is fire-and-forget; a failure here is logged and never fails
/// the operation that triggered it.
#[async_trait]
pub trait TopologyEventBus: Send + Sync {
    /// One or more nodes are unreachable from the queen.
    async fn publish_partition_detected(&self, unreachable: Vec<NodeId>) -> Result<(), String>;

    /// A node was bridged back into the queen's component.
    async fn publish_partition_healed(&self, node: NodeId, bridged_via: NodeId)
        -> Result<(), String>;

    /// Nodes remain unreachable after the heal attempt.
    async fn publish_partition_unresolved(&self, unreachable: Vec<NodeId>) -> Result<(), String>;

    /// The active layout changed.
    async fn publish_reconfigured(&self, from: TopologyType, to: TopologyType)
        -> Result<(), String>;
}

/// Answers whether the transport layer can realize a candidate bridging
/// edge between two nodes. Consulted during partition healing.
#[async_trait]
pub trait BridgeProber: Send + Sync {
    /// True if a direct link `a <-> b` can be established.
    async fn can_connect(&self, a: &NodeId, b: &NodeId) -> bool;
}
