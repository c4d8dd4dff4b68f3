//! # Multi-Replica PBFT Clusters
//!
//! Full consensus rounds over the same loopback fabric the runtime uses,
//! with real timers driving view changes. Silent replicas are members that
//! were never attached to the transport.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hs_02_consensus::ports::AcceptAll;
    use hs_02_consensus::{
        ConsensusApi, ConsensusConfig, ConsensusService, SharedBusPublisher, SystemTimeSource,
    };
    use shared_bus::{EventPublisher, InMemoryEventBus};
    use shared_types::NodeId;
    use swarm_runtime::adapters::{LoopbackPeerTransport, SharedMembership};

    type Replica = ConsensusService<
        LoopbackPeerTransport,
        SharedMembership,
        SharedBusPublisher,
        AcceptAll,
        SystemTimeSource,
    >;

    struct Cluster {
        transport: Arc<LoopbackPeerTransport>,
        membership: Arc<SharedMembership>,
        bus: Arc<InMemoryEventBus>,
        live: Vec<Arc<Replica>>,
    }

    /// `total` members, of which only the ones outside `silent` are
    /// attached to the fabric. Member IDs sort as n0 < n1 < ... so the
    /// primary for view `v` is `n{v mod total}`.
    fn cluster(total: usize, silent: &[usize], config: ConsensusConfig) -> Cluster {
        let transport = Arc::new(LoopbackPeerTransport::new());
        let membership = Arc::new(SharedMembership::new());
        let bus = Arc::new(InMemoryEventBus::new());

        let mut live = Vec::new();
        for index in 0..total {
            let id = NodeId::new(format!("n{index}"));
            membership.add(id.clone());
            if silent.contains(&index) {
                continue;
            }
            let replica = Arc::new(ConsensusService::new(
                id.clone(),
                config.clone(),
                Arc::clone(&transport),
                Arc::clone(&membership),
                Arc::new(SharedBusPublisher::new(Arc::clone(&bus))),
                Arc::new(AcceptAll),
                Arc::new(SystemTimeSource),
            ));
            transport.register(id, Arc::clone(&replica) as Arc<dyn ConsensusApi>);
            live.push(replica);
        }
        Cluster {
            transport,
            membership,
            bus,
            live,
        }
    }

    /// Four replicas tolerate one silent node without any view change.
    #[tokio::test(flavor = "multi_thread")]
    async fn four_replicas_commit_around_one_silent_node() {
        let cluster = cluster(4, &[3], ConsensusConfig::default());
        let primary = &cluster.live[0];

        let round = primary
            .start_round("rebalance shard 7".into())
            .await
            .expect("round opens");

        let decision = primary
            .await_consensus(round, 2_000)
            .await
            .expect("commitment despite one silent replica");
        assert_eq!(decision.value, "rebalance shard 7");
        assert_eq!(decision.view, 0);

        // Every live replica converges on the same decision.
        for replica in &cluster.live[1..] {
            let peer_decision = replica
                .await_consensus(round, 2_000)
                .await
                .expect("peer commitment");
            assert_eq!(peer_decision.value, decision.value);
        }
    }

    /// Seven replicas with `f = 2`: the primaries for views 0 and 1 are
    /// both silent, so the five live replicas vote through two view
    /// changes and commit under the third primary. The pending value
    /// survives both transitions.
    #[tokio::test(flavor = "multi_thread")]
    async fn silent_primaries_are_skipped_by_view_changes() {
        let config = ConsensusConfig {
            fault_tolerance: 2,
            view_change_timeout_ms: 150,
            max_view_changes: 3,
        };
        let cluster = cluster(7, &[0, 1], config);
        let mut sweepers = Vec::new();
        for replica in &cluster.live {
            sweepers.push(replica.spawn_timeout_sweeper(Duration::from_millis(50)));
        }

        let opener = &cluster.live[0]; // n2
        let round = opener
            .start_round("evict stale cache".into())
            .await
            .expect("round opens");

        let decision = opener
            .await_consensus(round, 5_000)
            .await
            .expect("commitment after two view changes");
        assert_eq!(decision.value, "evict stale cache");
        assert_eq!(decision.view, 2);

        for sweeper in sweepers {
            sweeper.abort();
        }
    }

    /// Membership below `3f+1` is refused before any message is sent.
    #[tokio::test(flavor = "multi_thread")]
    async fn undersized_membership_is_refused() {
        let cluster = cluster(3, &[], ConsensusConfig::default());
        let err = cluster.live[0]
            .start_round("anything".into())
            .await
            .expect_err("too few members");
        assert!(matches!(
            err,
            hs_02_consensus::ConsensusError::InsufficientNodes {
                required: 4,
                actual: 3,
                ..
            }
        ));
        // The fabric and membership are still usable afterwards.
        cluster.membership.add(NodeId::new("n3"));
        assert_eq!(cluster.bus.events_published(), 0);
        drop(cluster.transport);
    }
}
