//! The communication graph and its layout rules.
//!
//! The graph is owned by the [`crate::service::TopologyService`]; everything
//! here is synchronous and side-effect free. Cross-component reads go through
//! [`TopologyGraph::snapshot`], which copies out — callers never hold a live
//! reference into the graph.

use super::errors::{TopologyError, TopologyResult};
use super::metrics::GraphMetrics;
use serde::{Deserialize, Serialize};
use shared_types::{NodeId, NodeRole, TopologyType};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// An undirected edge, stored with endpoints in sorted order so each pair
/// appears exactly once.
type Edge = (NodeId, NodeId);

fn edge(a: &NodeId, b: &NodeId) -> Edge {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Outcome of a heal pass over detected partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealReport {
    /// Nodes reconnected, with the peer the bridging edge attached to.
    pub healed: Vec<(NodeId, NodeId)>,
    /// Nodes still unreachable; the transport layer must intervene.
    pub unresolved: Vec<NodeId>,
}

/// Owned, immutable copy of the graph for cross-component reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// The declared topology type (may be `Adaptive`).
    pub topology_type: TopologyType,
    /// The layout currently realized in the edge set.
    pub effective_layout: TopologyType,
    /// The queen, if one has been added.
    pub queen: Option<NodeId>,
    /// All nodes with their roles.
    pub nodes: Vec<(NodeId, NodeRole)>,
    /// All edges, endpoints sorted.
    pub edges: Vec<(NodeId, NodeId)>,
    /// Metrics computed at snapshot time.
    pub metrics: GraphMetrics,
}

/// The communication graph, tagged with a topology type.
///
/// # Invariants
///
/// - Edges only reference present nodes.
/// - `reconfigure` is make-before-break: target edges are added before stale
///   edges are removed, so no node reachable from the queen beforehand is
///   unreachable at any intermediate point.
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    topology_type: TopologyType,
    /// The layout realized in the edge set. Differs from `topology_type`
    /// only when the declared type is `Adaptive`.
    effective_layout: TopologyType,
    queen: Option<NodeId>,
    nodes: BTreeMap<NodeId, NodeRole>,
    edges: BTreeSet<Edge>,
    /// Peer-edge bound per worker under `hierarchical-mesh`.
    peer_cap: usize,
}

impl TopologyGraph {
    /// Create an empty graph with the given layout. `peer_cap` bounds peer
    /// edges per worker under `hierarchical-mesh`.
    #[must_use]
    pub fn new(topology_type: TopologyType, peer_cap: usize) -> Self {
        let effective_layout = match topology_type {
            // Adaptive starts conservative and reconfigures from there.
            TopologyType::Adaptive => TopologyType::Hierarchical,
            other => other,
        };
        Self {
            topology_type,
            effective_layout,
            queen: None,
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            peer_cap: peer_cap.max(1),
        }
    }

    /// The declared topology type.
    #[must_use]
    pub fn topology_type(&self) -> TopologyType {
        self.topology_type
    }

    /// The layout currently realized in the edge set.
    #[must_use]
    pub fn effective_layout(&self) -> TopologyType {
        self.effective_layout
    }

    /// The queen's ID, if present.
    #[must_use]
    pub fn queen(&self) -> Option<&NodeId> {
        self.queen.as_ref()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True if the node is present.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All current members, sorted by ID.
    #[must_use]
    pub fn members(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Neighbors of a node, sorted.
    #[must_use]
    pub fn neighbors(&self, id: &NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b.clone())
                } else if b == id {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Degree of a node.
    #[must_use]
    pub fn degree(&self, id: &NodeId) -> usize {
        self.edges.iter().filter(|(a, b)| a == id || b == id).count()
    }

    /// Insert a node and wire its edges per the active layout rule.
    pub fn add_node(&mut self, id: NodeId, role: NodeRole) -> TopologyResult<()> {
        if self.nodes.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        if role == NodeRole::Queen {
            if let Some(existing) = &self.queen {
                return Err(TopologyError::QueenAlreadyPresent(existing.clone()));
            }
            self.queen = Some(id.clone());
        }
        self.nodes.insert(id.clone(), role);
        self.wire_new_node(&id, role);
        Ok(())
    }

    /// Remove a node and all of its edges.
    pub fn remove_node(&mut self, id: &NodeId) -> TopologyResult<()> {
        if self.nodes.remove(id).is_none() {
            return Err(TopologyError::UnknownNode(id.clone()));
        }
        if self.queen.as_ref() == Some(id) {
            self.queen = None;
        }
        self.edges.retain(|(a, b)| a != id && b != id);
        Ok(())
    }

    /// Add an explicit edge between two present nodes.
    pub fn connect(&mut self, a: &NodeId, b: &NodeId) -> TopologyResult<()> {
        if a == b {
            return Err(TopologyError::SelfEdge(a.clone()));
        }
        for id in [a, b] {
            if !self.nodes.contains_key(id) {
                return Err(TopologyError::UnknownNode(id.clone()));
            }
        }
        self.edges.insert(edge(a, b));
        Ok(())
    }

    /// Remove an edge if present.
    pub fn disconnect(&mut self, a: &NodeId, b: &NodeId) {
        self.edges.remove(&edge(a, b));
    }

    /// Rebuild the edge set for a new layout, make-before-break.
    ///
    /// Target edges are added first and stale edges pruned second, so the
    /// edge set is a superset of both layouts in between and queen
    /// reachability never regresses mid-transition.
    pub fn reconfigure(&mut self, new_layout: TopologyType) -> TopologyResult<TopologyType> {
        let previous = self.effective_layout;
        let target = self.target_edges(new_layout);

        // Phase 1: grow. The union keeps every old path alive.
        for e in &target {
            self.edges.insert(e.clone());
        }
        // Phase 2: prune edges the new layout does not want.
        self.edges.retain(|e| target.contains(e));

        self.effective_layout = match new_layout {
            TopologyType::Adaptive => self.effective_layout,
            other => other,
        };
        if self.topology_type != TopologyType::Adaptive {
            self.topology_type = self.effective_layout;
        }
        Ok(previous)
    }

    /// Nodes unreachable from the queen, via BFS. O(V+E).
    ///
    /// An empty graph or a graph with no queen reports no partitions; there
    /// is nothing to reach.
    #[must_use]
    pub fn detect_partitions(&self) -> Vec<NodeId> {
        let Some(queen) = &self.queen else {
            return Vec::new();
        };
        let reachable = self.reachable_from(queen);
        self.nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect()
    }

    /// Attempt to bridge each partitioned node back into the queen's
    /// component with a single edge. `can_bridge` answers whether the
    /// transport can realize a candidate edge.
    pub fn heal_partitions<F>(&mut self, can_bridge: F) -> TopologyResult<HealReport>
    where
        F: Fn(&NodeId, &NodeId) -> bool,
    {
        let Some(queen) = self.queen.clone() else {
            return Err(TopologyError::NoQueen);
        };
        let mut report = HealReport::default();

        for node in self.detect_partitions() {
            // Recompute the component each iteration: earlier heals may have
            // merged this node's component already.
            let component = self.reachable_from(&queen);
            if component.contains(&node) {
                continue;
            }
            // Bridge toward the queen herself first, then any component
            // member the transport can reach.
            let candidates = std::iter::once(queen.clone())
                .chain(component.iter().filter(|id| **id != queen).cloned());
            let mut bridged = None;
            for via in candidates {
                if can_bridge(&node, &via) {
                    self.edges.insert(edge(&node, &via));
                    bridged = Some(via);
                    break;
                }
            }
            match bridged {
                Some(via) => report.healed.push((node, via)),
                None => report.unresolved.push(node),
            }
        }
        Ok(report)
    }

    /// Compute graph metrics over the current node and edge sets.
    #[must_use]
    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics::compute(self)
    }

    /// Owned copy of the graph for cross-component reads.
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            topology_type: self.topology_type,
            effective_layout: self.effective_layout,
            queen: self.queen.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|(id, role)| (id.clone(), *role))
                .collect(),
            edges: self.edges.iter().cloned().collect(),
            metrics: self.metrics(),
        }
    }

    /// BFS from `start` over the undirected edge set.
    pub(crate) fn reachable_from(&self, start: &NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        if !self.nodes.contains_key(start) {
            return seen;
        }
        // Adjacency built once: detect_partitions is O(V+E) per sweep.
        let mut adjacency: BTreeMap<&NodeId, Vec<&NodeId>> = BTreeMap::new();
        for (a, b) in &self.edges {
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }
        let mut queue = VecDeque::from([start.clone()]);
        seen.insert(start.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(peers) = adjacency.get(&current) {
                for peer in peers {
                    if seen.insert((*peer).clone()) {
                        queue.push_back((*peer).clone());
                    }
                }
            }
        }
        seen
    }

    /// Wire a newly added node per the effective layout.
    fn wire_new_node(&mut self, id: &NodeId, role: NodeRole) {
        let queen = self.queen.clone();
        match (role, self.effective_layout) {
            (NodeRole::Queen, _) => {
                // A late-arriving queen adopts every worker per the layout.
                let workers: Vec<NodeId> = self
                    .nodes
                    .iter()
                    .filter(|(other, r)| **r == NodeRole::Worker && *other != id)
                    .map(|(other, _)| other.clone())
                    .collect();
                for w in workers {
                    self.edges.insert(edge(id, &w));
                }
            }
            (NodeRole::Worker, TopologyType::Hierarchical) => {
                if let Some(q) = queen {
                    self.edges.insert(edge(id, &q));
                }
            }
            (NodeRole::Worker, TopologyType::Mesh) => {
                let others: Vec<NodeId> = self
                    .nodes
                    .keys()
                    .filter(|other| *other != id)
                    .cloned()
                    .collect();
                for other in others {
                    self.edges.insert(edge(id, &other));
                }
            }
            (NodeRole::Worker, TopologyType::HierarchicalMesh | TopologyType::Adaptive) => {
                if let Some(q) = &queen {
                    self.edges.insert(edge(id, q));
                }
                // Peer edges to the least-connected workers that still have
                // peer capacity, up to the cap on both sides.
                let mut peers: Vec<(usize, NodeId)> = self
                    .nodes
                    .iter()
                    .filter(|(other, r)| {
                        **r == NodeRole::Worker && *other != id && Some(*other) != queen.as_ref()
                    })
                    .map(|(other, _)| (self.peer_degree(other), other.clone()))
                    .filter(|(deg, _)| *deg < self.peer_cap)
                    .collect();
                peers.sort();
                for (_, peer) in peers.into_iter().take(self.peer_cap) {
                    self.edges.insert(edge(id, &peer));
                }
            }
        }
    }

    /// Degree excluding any edge to the queen.
    fn peer_degree(&self, id: &NodeId) -> usize {
        self.neighbors(id)
            .iter()
            .filter(|n| Some(*n) != self.queen.as_ref())
            .count()
    }

    /// The complete edge set a layout would produce over the current nodes.
    fn target_edges(&self, layout: TopologyType) -> BTreeSet<Edge> {
        let mut target = BTreeSet::new();
        let queen = self.queen.clone();
        let workers: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, r)| **r == NodeRole::Worker)
            .map(|(id, _)| id.clone())
            .collect();

        match layout {
            TopologyType::Hierarchical => {
                if let Some(q) = &queen {
                    for w in &workers {
                        target.insert(edge(q, w));
                    }
                }
            }
            TopologyType::Mesh => {
                let all: Vec<NodeId> = self.nodes.keys().cloned().collect();
                for (i, a) in all.iter().enumerate() {
                    for b in all.iter().skip(i + 1) {
                        target.insert(edge(a, b));
                    }
                }
            }
            TopologyType::HierarchicalMesh | TopologyType::Adaptive => {
                if let Some(q) = &queen {
                    for w in &workers {
                        target.insert(edge(q, w));
                    }
                }
                // Ring over the workers bounds peer degree at 2 <= peer_cap
                // while keeping the worker overlay connected.
                if workers.len() >= 2 {
                    for i in 0..workers.len() {
                        let a = &workers[i];
                        let b = &workers[(i + 1) % workers.len()];
                        if a != b {
                            target.insert(edge(a, b));
                        }
                    }
                }
            }
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_workers(layout: TopologyType, workers: usize) -> TopologyGraph {
        let mut g = TopologyGraph::new(layout, 2);
        g.add_node(NodeId::new("queen"), NodeRole::Queen).unwrap();
        for i in 0..workers {
            g.add_node(NodeId::new(format!("w{i}")), NodeRole::Worker)
                .unwrap();
        }
        g
    }

    #[test]
    fn hierarchical_workers_have_single_queen_edge() {
        let g = graph_with_workers(TopologyType::Hierarchical, 5);
        assert_eq!(g.edge_count(), 5);
        for i in 0..5 {
            let w = NodeId::new(format!("w{i}"));
            assert_eq!(g.neighbors(&w), vec![NodeId::new("queen")]);
        }
    }

    #[test]
    fn mesh_is_fully_connected() {
        let g = graph_with_workers(TopologyType::Mesh, 3);
        // 4 nodes -> 6 edges
        assert_eq!(g.edge_count(), 6);
    }

    #[test]
    fn hierarchical_mesh_bounds_peer_degree() {
        let g = graph_with_workers(TopologyType::HierarchicalMesh, 6);
        for i in 0..6 {
            let w = NodeId::new(format!("w{i}"));
            let peer_edges = g
                .neighbors(&w)
                .into_iter()
                .filter(|n| n != &NodeId::new("queen"))
                .count();
            assert!(peer_edges <= 2, "w{i} has {peer_edges} peer edges");
            assert!(g.neighbors(&w).contains(&NodeId::new("queen")));
        }
    }

    #[test]
    fn second_queen_is_rejected() {
        let mut g = graph_with_workers(TopologyType::Hierarchical, 1);
        let err = g.add_node(NodeId::new("usurper"), NodeRole::Queen);
        assert!(matches!(err, Err(TopologyError::QueenAlreadyPresent(_))));
    }

    #[test]
    fn detect_partitions_finds_disconnected_worker() {
        let mut g = graph_with_workers(TopologyType::Hierarchical, 3);
        g.disconnect(&NodeId::new("w1"), &NodeId::new("queen"));
        assert_eq!(g.detect_partitions(), vec![NodeId::new("w1")]);
    }

    #[test]
    fn heal_bridges_back_to_queen_component() {
        let mut g = graph_with_workers(TopologyType::Hierarchical, 3);
        g.disconnect(&NodeId::new("w1"), &NodeId::new("queen"));
        let report = g.heal_partitions(|_, _| true).unwrap();
        assert_eq!(report.healed.len(), 1);
        assert!(report.unresolved.is_empty());
        assert!(g.detect_partitions().is_empty());
    }

    #[test]
    fn heal_reports_unresolved_when_transport_refuses() {
        let mut g = graph_with_workers(TopologyType::Hierarchical, 2);
        g.disconnect(&NodeId::new("w0"), &NodeId::new("queen"));
        let report = g.heal_partitions(|_, _| false).unwrap();
        assert_eq!(report.unresolved, vec![NodeId::new("w0")]);
        assert_eq!(g.detect_partitions(), vec![NodeId::new("w0")]);
    }

    #[test]
    fn reconfigure_hierarchical_to_mesh_preserves_reachability() {
        let mut g = graph_with_workers(TopologyType::Hierarchical, 5);
        assert!(g.detect_partitions().is_empty());
        g.reconfigure(TopologyType::Mesh).unwrap();
        assert!(g.detect_partitions().is_empty());
        assert_eq!(g.effective_layout(), TopologyType::Mesh);
        // 6 nodes fully meshed.
        assert_eq!(g.edge_count(), 15);
    }

    #[test]
    fn removed_node_loses_all_edges() {
        let mut g = graph_with_workers(TopologyType::Mesh, 3);
        g.remove_node(&NodeId::new("w0")).unwrap();
        assert!(!g.contains(&NodeId::new("w0")));
        assert!(g
            .snapshot()
            .edges
            .iter()
            .all(|(a, b)| a != &NodeId::new("w0") && b != &NodeId::new("w0")));
    }

    #[test]
    fn adaptive_starts_hierarchical() {
        let g = TopologyGraph::new(TopologyType::Adaptive, 2);
        assert_eq!(g.topology_type(), TopologyType::Adaptive);
        assert_eq!(g.effective_layout(), TopologyType::Hierarchical);
    }
}
