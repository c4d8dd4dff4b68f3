//! Graph metrics feeding the adaptive reconfiguration policy.

use super::graph::TopologyGraph;
use serde::{Deserialize, Serialize};
use shared_types::NodeId;

/// Structural metrics over the communication graph.
///
/// `load_imbalance` is `f64::INFINITY` when some node has degree zero; the
/// adaptive policy treats that as maximally imbalanced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphMetrics {
    /// Node count.
    pub node_count: usize,
    /// Edge count.
    pub edge_count: usize,
    /// Mean shortest-path length over reachable ordered pairs.
    pub average_path_length: f64,
    /// `2E / (V * (V - 1))`.
    pub edge_density: f64,
    /// Max node degree divided by min node degree.
    pub load_imbalance: f64,
    /// Mean local clustering coefficient.
    pub clustering_coefficient: f64,
}

impl GraphMetrics {
    /// Compute all metrics in one pass over the graph.
    #[must_use]
    pub fn compute(graph: &TopologyGraph) -> Self {
        let nodes = graph.members();
        let v = nodes.len();
        let e = graph.edge_count();

        if v < 2 {
            return Self {
                node_count: v,
                edge_count: e,
                ..Self::default()
            };
        }

        let edge_density = (2 * e) as f64 / (v * (v - 1)) as f64;

        let degrees: Vec<usize> = nodes.iter().map(|id| graph.degree(id)).collect();
        let max_degree = degrees.iter().copied().max().unwrap_or(0);
        let min_degree = degrees.iter().copied().min().unwrap_or(0);
        let load_imbalance = if min_degree == 0 {
            f64::INFINITY
        } else {
            max_degree as f64 / min_degree as f64
        };

        Self {
            node_count: v,
            edge_count: e,
            average_path_length: average_path_length(graph, &nodes),
            edge_density,
            load_imbalance,
            clustering_coefficient: clustering_coefficient(graph, &nodes),
        }
    }
}

/// BFS from every node; average distance over reachable ordered pairs.
fn average_path_length(graph: &TopologyGraph, nodes: &[NodeId]) -> f64 {
    use std::collections::{BTreeMap, VecDeque};

    let mut total = 0u64;
    let mut pairs = 0u64;
    for start in nodes {
        let mut dist: BTreeMap<NodeId, u64> = BTreeMap::new();
        dist.insert(start.clone(), 0);
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(current) = queue.pop_front() {
            let d = dist[&current];
            for peer in graph.neighbors(&current) {
                if !dist.contains_key(&peer) {
                    dist.insert(peer.clone(), d + 1);
                    queue.push_back(peer);
                }
            }
        }
        for (other, d) in &dist {
            if other != start {
                total += d;
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total as f64 / pairs as f64
    }
}

/// Mean of per-node `triangles / (k choose 2)` over nodes with degree >= 2.
fn clustering_coefficient(graph: &TopologyGraph, nodes: &[NodeId]) -> f64 {
    let mut sum = 0.0;
    let mut counted = 0usize;
    for node in nodes {
        let neighbors = graph.neighbors(node);
        let k = neighbors.len();
        if k < 2 {
            continue;
        }
        let mut triangles = 0usize;
        for (i, a) in neighbors.iter().enumerate() {
            for b in neighbors.iter().skip(i + 1) {
                if graph.neighbors(a).contains(b) {
                    triangles += 1;
                }
            }
        }
        sum += triangles as f64 / (k * (k - 1) / 2) as f64;
        counted += 1;
    }
    if counted == 0 {
        0.0
    } else {
        sum / counted as f64
    }
}
