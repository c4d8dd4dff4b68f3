//! Reconfiguration triggers for the `adaptive` topology.
//!
//! The policy watches successive metric snapshots and recommends a layout
//! change only after a trigger condition holds for a configured number of
//! consecutive checks, so a single noisy sweep never causes a rebuild.

use super::metrics::GraphMetrics;
use shared_types::TopologyType;

/// Hysteresis-based reconfiguration policy.
#[derive(Debug, Clone)]
pub struct AdaptivePolicy {
    /// Imbalance (max/min degree) above which mesh is preferred.
    pub imbalance_threshold: f64,
    /// Mean path length above which hierarchical-mesh is preferred.
    pub path_length_threshold: f64,
    /// Consecutive over-threshold checks required before recommending.
    pub required_consecutive: u32,
    imbalance_streak: u32,
    path_streak: u32,
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        Self {
            imbalance_threshold: 4.0,
            path_length_threshold: 2.5,
            required_consecutive: 3,
            imbalance_streak: 0,
            path_streak: 0,
        }
    }
}

impl AdaptivePolicy {
    /// Create a policy with explicit thresholds.
    #[must_use]
    pub fn new(
        imbalance_threshold: f64,
        path_length_threshold: f64,
        required_consecutive: u32,
    ) -> Self {
        Self {
            imbalance_threshold,
            path_length_threshold,
            required_consecutive: required_consecutive.max(1),
            imbalance_streak: 0,
            path_streak: 0,
        }
    }

    /// Feed one metrics snapshot; returns a recommended layout once a
    /// trigger has held for the required number of consecutive checks.
    ///
    /// Never recommends the layout that is already in effect.
    pub fn observe(
        &mut self,
        metrics: &GraphMetrics,
        current: TopologyType,
    ) -> Option<TopologyType> {
        if metrics.load_imbalance > self.imbalance_threshold {
            self.imbalance_streak += 1;
        } else {
            self.imbalance_streak = 0;
        }
        if metrics.average_path_length > self.path_length_threshold {
            self.path_streak += 1;
        } else {
            self.path_streak = 0;
        }

        // Imbalance wins over path length: a hot queen is the more urgent
        // condition to relieve.
        if self.imbalance_streak >= self.required_consecutive && current != TopologyType::Mesh {
            self.imbalance_streak = 0;
            return Some(TopologyType::Mesh);
        }
        if self.path_streak >= self.required_consecutive
            && current != TopologyType::HierarchicalMesh
        {
            self.path_streak = 0;
            return Some(TopologyType::HierarchicalMesh);
        }
        None
    }
}
