//! Driving ports (Inbound API)

use crate::domain::{GraphMetrics, HealReport, TopologyError, TopologySnapshot};
use async_trait::async_trait;
use shared_types::{NodeId, NodeRole, TopologyType};

/// Primary Topology API.
///
/// Every query returns an owned value; callers never see live graph state.
#[async_trait]
pub trait TopologyApi: Send + Sync {
    /// Insert a node and wire its edges per the active layout rule.
    async fn add_node(&self, id: NodeId, role: NodeRole) -> Result<(), TopologyError>;

    /// Remove a node and all its edges.
    async fn remove_node(&self, id: &NodeId) -> Result<(), TopologyError>;

    /// Rebuild edges for a new layout, preserving queen reachability
    /// throughout the transition.
    async fn reconfigure(&self, new_layout: TopologyType) -> Result<(), TopologyError>;

    /// Run partition detection on demand. Returns unreachable nodes.
    async fn detect_partitions(&self) -> Vec<NodeId>;

    /// Attempt to heal detected partitions with single bridging edges.
    async fn heal_partitions(&self) -> Result<HealReport, TopologyError>;

    /// Owned snapshot of the whole graph.
    async fn snapshot(&self) -> TopologySnapshot;

    /// Current graph metrics.
    async fn metrics(&self) -> GraphMetrics;

    /// Peers a node may talk to directly.
    async fn neighbors(&self, id: &NodeId) -> Vec<NodeId>;
}
