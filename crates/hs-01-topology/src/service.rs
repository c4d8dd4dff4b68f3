//! # Topology Service
//!
//! Owns the communication graph and implements the [`TopologyApi`] driving
//! port. All mutation happens inside this service; the rest of the swarm
//! reads through copy-out snapshots.
//!
//! The service also runs the periodic partition sweep: detect, attempt to
//! heal, publish what remains. When the declared topology is `adaptive`, the
//! sweep additionally feeds metrics to the [`AdaptivePolicy`] and applies
//! its recommendations.

use crate::domain::{
    AdaptivePolicy, GraphMetrics, HealReport, TopologyError, TopologyGraph, TopologySnapshot,
};
use crate::ports::{BridgeProber, TopologyApi, TopologyEventBus};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{NodeId, NodeRole, TopologyType};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Topology Service implementing the driving port.
pub struct TopologyService<E, P>
where
    E: TopologyEventBus,
    P: BridgeProber,
{
    graph: RwLock<TopologyGraph>,
    policy: Mutex<AdaptivePolicy>,
    event_bus: Arc<E>,
    prober: Arc<P>,
    sweep_interval: Duration,
}

impl<E, P> TopologyService<E, P>
where
    E: TopologyEventBus + 'static,
    P: BridgeProber + 'static,
{
    /// Create a service managing a fresh graph.
    pub fn new(
        topology_type: TopologyType,
        peer_cap: usize,
        event_bus: Arc<E>,
        prober: Arc<P>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            graph: RwLock::new(TopologyGraph::new(topology_type, peer_cap)),
            policy: Mutex::new(AdaptivePolicy::default()),
            event_bus,
            prober,
            sweep_interval,
        }
    }

    /// Replace the adaptive policy (thresholds, hysteresis).
    pub fn with_policy(self, policy: AdaptivePolicy) -> Self {
        *self.policy.lock() = policy;
        self
    }

    /// Spawn the periodic partition sweep. The task runs until aborted.
    pub fn spawn_partition_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                service.run_sweep().await;
            }
        })
    }

    /// One detection + heal + adaptive pass. Public so the runtime (and
    /// tests) can trigger it on demand.
    pub async fn run_sweep(&self) {
        let unreachable = { self.graph.read().detect_partitions() };
        if !unreachable.is_empty() {
            debug!(count = unreachable.len(), "Partition detected");
            if let Err(e) = self
                .event_bus
                .publish_partition_detected(unreachable.clone())
                .await
            {
                warn!(error = %e, "Failed to publish partition-detected");
            }
            match self.heal_partitions().await {
                Ok(report) => {
                    if !report.unresolved.is_empty() {
                        warn!(
                            unresolved = report.unresolved.len(),
                            "Partitions left unresolved; transport must reconnect"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "Heal pass failed"),
            }
        }

        self.run_adaptive_check().await;
    }

    /// Apply the adaptive policy when the declared type is `adaptive`.
    async fn run_adaptive_check(&self) {
        let (declared, effective, metrics) = {
            let g = self.graph.read();
            (g.topology_type(), g.effective_layout(), g.metrics())
        };
        if declared != TopologyType::Adaptive {
            return;
        }
        let recommendation = self.policy.lock().observe(&metrics, effective);
        if let Some(target) = recommendation {
            info!(from = %effective, to = %target, "Adaptive policy triggered reconfiguration");
            if let Err(e) = self.reconfigure(target).await {
                warn!(error = %e, "Adaptive reconfiguration failed");
            }
        }
    }

    /// Probe which bridging edges the transport can realize for the given
    /// partitioned nodes, one accepted candidate per node.
    async fn probe_bridges(
        &self,
        partitioned: &[NodeId],
        queen: &NodeId,
        component: &[NodeId],
    ) -> HashSet<(NodeId, NodeId)> {
        let mut allowed = HashSet::new();
        for node in partitioned {
            let candidates =
                std::iter::once(queen).chain(component.iter().filter(|id| *id != queen));
            for via in candidates {
                if self.prober.can_connect(node, via).await {
                    allowed.insert((node.clone(), via.clone()));
                    break;
                }
            }
        }
        allowed
    }
}

#[async_trait]
impl<E, P> TopologyApi for TopologyService<E, P>
where
    E: TopologyEventBus + 'static,
    P: BridgeProber + 'static,
{
    async fn add_node(&self, id: NodeId, role: NodeRole) -> Result<(), TopologyError> {
        self.graph.write().add_node(id.clone(), role)?;
        debug!(node = %id, ?role, "Node added to topology");
        Ok(())
    }

    async fn remove_node(&self, id: &NodeId) -> Result<(), TopologyError> {
        self.graph.write().remove_node(id)?;
        debug!(node = %id, "Node removed from topology");
        Ok(())
    }

    async fn reconfigure(&self, new_layout: TopologyType) -> Result<(), TopologyError> {
        let previous = self.graph.write().reconfigure(new_layout)?;
        if previous != new_layout {
            if let Err(e) = self
                .event_bus
                .publish_reconfigured(previous, new_layout)
                .await
            {
                warn!(error = %e, "Failed to publish reconfiguration");
            }
        }
        Ok(())
    }

    async fn detect_partitions(&self) -> Vec<NodeId> {
        self.graph.read().detect_partitions()
    }

    async fn heal_partitions(&self) -> Result<HealReport, TopologyError> {
        let (partitioned, queen, component) = {
            let g = self.graph.read();
            let queen = g.queen().cloned().ok_or(TopologyError::NoQueen)?;
            let component: Vec<NodeId> = g.reachable_from(&queen).into_iter().collect();
            (g.detect_partitions(), queen, component)
        };
        if partitioned.is_empty() {
            return Ok(HealReport::default());
        }

        // Probe the transport outside the graph lock.
        let allowed = self.probe_bridges(&partitioned, &queen, &component).await;

        let report = self
            .graph
            .write()
            .heal_partitions(|node, via| allowed.contains(&(node.clone(), via.clone())))?;

        for (node, via) in &report.healed {
            if let Err(e) = self
                .event_bus
                .publish_partition_healed(node.clone(), via.clone())
                .await
            {
                warn!(error = %e, "Failed to publish partition-healed");
            }
        }
        if !report.unresolved.is_empty() {
            if let Err(e) = self
                .event_bus
                .publish_partition_unresolved(report.unresolved.clone())
                .await
            {
                warn!(error = %e, "Failed to publish partition-unresolved");
            }
        }
        Ok(report)
    }

    async fn snapshot(&self) -> TopologySnapshot {
        self.graph.read().snapshot()
    }

    async fn metrics(&self) -> GraphMetrics {
        self.graph.read().metrics()
    }

    async fn neighbors(&self, id: &NodeId) -> Vec<NodeId> {
        self.graph.read().neighbors(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct RecordingBus {
        events: PlMutex<Vec<String>>,
    }

    #[async_trait]
    impl TopologyEventBus for RecordingBus {
        async fn publish_partition_detected(
            &self,
            unreachable: Vec<NodeId>,
        ) -> Result<(), String> {
            self.events
                .lock()
                .push(format!("detected:{}", unreachable.len()));
            Ok(())
        }

        async fn publish_partition_healed(
            &self,
            node: NodeId,
            _bridged_via: NodeId,
        ) -> Result<(), String> {
            self.events.lock().push(format!("healed:{node}"));
            Ok(())
        }

        async fn publish_partition_unresolved(
            &self,
            unreachable: Vec<NodeId>,
        ) -> Result<(), String> {
            self.events
                .lock()
                .push(format!("unresolved:{}", unreachable.len()));
            Ok(())
        }

        async fn publish_reconfigured(
            &self,
            from: TopologyType,
            to: TopologyType,
        ) -> Result<(), String> {
            self.events.lock().push(format!("reconfigured:{from}->{to}"));
            Ok(())
        }
    }

    struct StaticProber(bool);

    #[async_trait]
    impl BridgeProber for StaticProber {
        async fn can_connect(&self, _a: &NodeId, _b: &NodeId) -> bool {
            self.0
        }
    }

    fn service(
        layout: TopologyType,
        bridgeable: bool,
    ) -> (Arc<TopologyService<RecordingBus, StaticProber>>, Arc<RecordingBus>) {
        let bus = Arc::new(RecordingBus::default());
        let svc = Arc::new(TopologyService::new(
            layout,
            2,
            Arc::clone(&bus),
            Arc::new(StaticProber(bridgeable)),
            Duration::from_millis(50),
        ));
        (svc, bus)
    }

    async fn seed(svc: &TopologyService<RecordingBus, StaticProber>, workers: usize) {
        svc.add_node(NodeId::new("queen"), NodeRole::Queen)
            .await
            .unwrap();
        for i in 0..workers {
            svc.add_node(NodeId::new(format!("w{i}")), NodeRole::Worker)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn heal_publishes_healed_event() {
        let (svc, bus) = service(TopologyType::Hierarchical, true);
        seed(&svc, 3).await;
        {
            let mut g = svc.graph.write();
            g.disconnect(&NodeId::new("w1"), &NodeId::new("queen"));
        }
        let report = svc.heal_partitions().await.unwrap();
        assert_eq!(report.healed.len(), 1);
        assert!(bus.events.lock().iter().any(|e| e.starts_with("healed:w1")));
    }

    #[tokio::test]
    async fn unhealable_partition_is_reported_not_dropped() {
        let (svc, bus) = service(TopologyType::Hierarchical, false);
        seed(&svc, 2).await;
        {
            let mut g = svc.graph.write();
            g.disconnect(&NodeId::new("w0"), &NodeId::new("queen"));
        }
        let report = svc.heal_partitions().await.unwrap();
        assert_eq!(report.unresolved, vec![NodeId::new("w0")]);
        assert!(bus.events.lock().iter().any(|e| e == "unresolved:1"));
        // Still detectable on the next sweep.
        assert_eq!(svc.detect_partitions().await, vec![NodeId::new("w0")]);
    }

    #[tokio::test]
    async fn reconfigure_publishes_transition() {
        let (svc, bus) = service(TopologyType::Hierarchical, true);
        seed(&svc, 5).await;
        svc.reconfigure(TopologyType::Mesh).await.unwrap();
        assert!(bus
            .events
            .lock()
            .iter()
            .any(|e| e == "reconfigured:hierarchical->mesh"));
        // Every worker still reachable.
        assert!(svc.detect_partitions().await.is_empty());
    }

    #[tokio::test]
    async fn adaptive_sweep_reconfigures_under_sustained_imbalance() {
        let bus = Arc::new(RecordingBus::default());
        let svc = Arc::new(
            TopologyService::new(
                TopologyType::Adaptive,
                2,
                Arc::clone(&bus),
                Arc::new(StaticProber(true)),
                Duration::from_millis(50),
            )
            .with_policy(AdaptivePolicy::new(4.0, 100.0, 2)),
        );
        seed(&svc, 5).await;
        // Star layout: imbalance 5.0 > 4.0 on consecutive sweeps.
        svc.run_sweep().await;
        svc.run_sweep().await;
        assert_eq!(
            svc.snapshot().await.effective_layout,
            TopologyType::Mesh
        );
        assert!(bus
            .events
            .lock()
            .iter()
            .any(|e| e == "reconfigured:hierarchical->mesh"));
    }

    #[tokio::test]
    async fn snapshot_is_copy_out() {
        let (svc, _bus) = service(TopologyType::Hierarchical, true);
        seed(&svc, 2).await;
        let snap = svc.snapshot().await;
        svc.remove_node(&NodeId::new("w0")).await.unwrap();
        // The snapshot still shows the removed node; it is a copy.
        assert!(snap.nodes.iter().any(|(id, _)| id == &NodeId::new("w0")));
    }
}
