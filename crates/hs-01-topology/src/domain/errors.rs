//! Error types for the Topology subsystem.

use shared_types::NodeId;

/// Topology error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TopologyError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node already present: {0}")]
    DuplicateNode(NodeId),

    #[error("Queen already present: {0}")]
    QueenAlreadyPresent(NodeId),

    #[error("No queen registered; cannot evaluate reachability")]
    NoQueen,

    #[error("Edge would connect a node to itself: {0}")]
    SelfEdge(NodeId),

    #[error("{count} node(s) remain partitioned after heal attempt")]
    PartitionUnresolved { count: usize },
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
