//! # hs-01-topology
//!
//! Topology Manager subsystem for Hive-Swarm.
//!
//! ## Architecture
//!
//! Maintains the swarm's communication graph: which nodes exist, which node
//! pairs may talk directly, and whether every node can still reach the queen.
//! The other three subsystems consult this graph for routing; none of them
//! mutate it.
//!
//! The crate follows hexagonal architecture:
//! - **Domain layer:** pure graph logic (edge construction per layout,
//!   BFS partition detection, healing, metrics, adaptive policy)
//! - **Ports layer:** trait definitions for callers and collaborators
//! - **Service layer:** wires domain to ports, owns the graph
//! - **Adapters layer:** event-bus publisher
//!
//! ## Layout invariants
//!
//! | Layout | Worker edges |
//! |--------|--------------|
//! | `hierarchical` | exactly one, to the queen |
//! | `mesh` | any subset of peers |
//! | `hierarchical-mesh` | one queen edge + a bounded number of peer edges |
//! | `adaptive` | layout may change at runtime; queen-reachability is preserved across every transition |
//!
//! ## Example
//!
//! ```rust
//! use hs_01_topology::domain::TopologyGraph;
//! use shared_types::{NodeId, NodeRole, TopologyType};
//!
//! let mut graph = TopologyGraph::new(TopologyType::Hierarchical, 2);
//! graph.add_node(NodeId::new("queen"), NodeRole::Queen).unwrap();
//! graph.add_node(NodeId::new("w1"), NodeRole::Worker).unwrap();
//!
//! assert!(graph.detect_partitions().is_empty());
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use domain::{
    AdaptivePolicy, GraphMetrics, HealReport, TopologyError, TopologyGraph, TopologySnapshot,
};
pub use ports::{BridgeProber, TopologyApi, TopologyEventBus};
pub use service::TopologyService;
