//! # Topology Layout Transitions
//!
//! Reconfiguration through the topology service with its real bus adapter
//! and the runtime's in-process bridge prober. The invariant under test:
//! the queen stays reachable from every worker at every observable point.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hs_01_topology::adapters::SharedBusPublisher;
    use hs_01_topology::{TopologyApi, TopologyService};
    use shared_bus::{EventFilter, EventTopic, InMemoryEventBus, SwarmEvent};
    use shared_types::{NodeId, NodeRole, TopologyType};
    use swarm_runtime::adapters::AlwaysBridge;

    type Service = TopologyService<SharedBusPublisher, AlwaysBridge>;

    async fn populated(layout: TopologyType) -> (Arc<Service>, Arc<InMemoryEventBus>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let service = Arc::new(TopologyService::new(
            layout,
            4,
            Arc::new(SharedBusPublisher::new(Arc::clone(&bus))),
            Arc::new(AlwaysBridge),
            Duration::from_millis(200),
        ));
        service
            .add_node(NodeId::new("queen"), NodeRole::Queen)
            .await
            .expect("add queen");
        for name in ["w1", "w2", "w3", "w4", "w5"] {
            service
                .add_node(NodeId::new(name), NodeRole::Worker)
                .await
                .expect("add worker");
        }
        (service, bus)
    }

    #[tokio::test]
    async fn hierarchical_to_mesh_preserves_queen_reachability() {
        let (service, bus) = populated(TopologyType::Hierarchical).await;
        let mut events = bus.subscribe(EventFilter::topic(EventTopic::Topology));

        // Star layout: each worker's only neighbor is the queen.
        for name in ["w1", "w2", "w3", "w4", "w5"] {
            let neighbors = service.neighbors(&NodeId::new(name)).await;
            assert_eq!(neighbors, vec![NodeId::new("queen")]);
        }
        assert!(service.detect_partitions().await.is_empty());
        let star = service.metrics().await;

        service
            .reconfigure(TopologyType::Mesh)
            .await
            .expect("reconfigure");

        // No node is orphaned by the transition and the graph got denser.
        assert!(service.detect_partitions().await.is_empty());
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.effective_layout, TopologyType::Mesh);
        for (id, _) in &snapshot.nodes {
            assert!(
                !service.neighbors(id).await.is_empty(),
                "{id} lost all edges"
            );
        }
        let mesh = service.metrics().await;
        assert!(mesh.edge_density > star.edge_density);

        let event = events.recv().await.expect("reconfiguration event");
        assert!(matches!(
            event,
            SwarmEvent::TopologyReconfigured {
                from: TopologyType::Hierarchical,
                to: TopologyType::Mesh,
            }
        ));
    }

    #[tokio::test]
    async fn hierarchical_mesh_keeps_the_queen_edge_per_worker() {
        let (service, _bus) = populated(TopologyType::HierarchicalMesh).await;

        for name in ["w1", "w2", "w3", "w4", "w5"] {
            let neighbors = service.neighbors(&NodeId::new(name)).await;
            assert!(
                neighbors.contains(&NodeId::new("queen")),
                "{name} is missing its queen edge"
            );
        }
        assert!(service.detect_partitions().await.is_empty());
    }

    #[tokio::test]
    async fn node_removal_keeps_the_rest_connected() {
        let (service, _bus) = populated(TopologyType::HierarchicalMesh).await;

        service
            .remove_node(&NodeId::new("w3"))
            .await
            .expect("remove");

        assert!(service.detect_partitions().await.is_empty());
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.metrics.node_count, 5);
        assert!(snapshot
            .nodes
            .iter()
            .all(|(id, _)| id != &NodeId::new("w3")));
    }
}
