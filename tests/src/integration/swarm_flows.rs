//! # Swarm Lifecycle Flows
//!
//! End-to-end coordination through `SwarmRuntime`: the queen, workers, the
//! consensus fabric, and the topology manager wired exactly as the binary
//! wires them. Every assertion goes through the public control surface.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hs_04_queen::QueenState;
    use serde_json::json;
    use shared_types::{
        CapabilitySet, ConsensusType, DirectiveStatus, NodeId, ProposalOutcome, SwarmConfig,
    };
    use swarm_runtime::SwarmRuntime;

    /// Short timings so flows settle in milliseconds instead of seconds.
    fn fast_config() -> SwarmConfig {
        SwarmConfig {
            heartbeat_interval_ms: 50,
            worker_timeout_ms: 300,
            election_timeout_ms: 50,
            consensus_timeout_ms: 3_000,
            partition_check_interval_ms: 200,
            ..SwarmConfig::default()
        }
    }

    fn caps(items: &[&str]) -> CapabilitySet {
        CapabilitySet::from_iter(items.iter().copied())
    }

    async fn started_runtime() -> SwarmRuntime {
        let runtime = SwarmRuntime::new(fast_config()).expect("valid config");
        runtime.initialize().await.expect("initialize");
        assert_eq!(runtime.queen_state().await, QueenState::Leader);
        runtime
    }

    /// Poll every 20ms until the probe passes or the deadline expires.
    macro_rules! eventually {
        ($deadline_ms:expr, $probe:expr) => {{
            let started = tokio::time::Instant::now();
            loop {
                if let Some(value) = $probe {
                    break value;
                }
                assert!(
                    started.elapsed() < Duration::from_millis($deadline_ms),
                    "condition not reached within {}ms",
                    $deadline_ms
                );
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }};
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn directive_flows_from_issue_to_completion() {
        let runtime = started_runtime().await;
        runtime
            .spawn_worker(NodeId::new("w1"), caps(&["build"]))
            .await
            .expect("spawn worker");

        let id = runtime
            .issue_directive("compile".into(), json!({}), caps(&["build"]), 50)
            .await
            .expect("issue");

        let queen = runtime.queen();
        let directive = eventually!(3_000, {
            let d = queen.directive_status(id).await.expect("known directive");
            (d.status == DirectiveStatus::Completed).then_some(d)
        });
        assert_eq!(directive.assigned_to, Some(NodeId::new("w1")));

        let metrics = runtime.metrics().await;
        assert_eq!(metrics.coordination.directives_completed, 1);
        assert_eq!(metrics.coordination.directives_pending, 0);
        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_payload_closes_the_directive_as_failed() {
        let runtime = started_runtime().await;
        runtime
            .spawn_worker(NodeId::new("w1"), caps(&["build"]))
            .await
            .expect("spawn worker");

        let id = runtime
            .issue_directive(
                "compile".into(),
                json!({ "fail_with": "linker exploded" }),
                caps(&["build"]),
                50,
            )
            .await
            .expect("issue");

        let queen = runtime.queen();
        let directive = eventually!(3_000, {
            let d = queen.directive_status(id).await.expect("known directive");
            d.status.is_terminal().then_some(d)
        });
        assert_eq!(directive.status, DirectiveStatus::Failed);
        assert_eq!(directive.failure_reason.as_deref(), Some("linker exploded"));
        runtime.shutdown().await;
    }

    /// A directive with no eligible worker stays pending and dispatches as
    /// soon as a capable worker registers.
    #[tokio::test(flavor = "multi_thread")]
    async fn unmatched_directive_waits_for_a_capable_worker() {
        let runtime = started_runtime().await;
        runtime
            .spawn_worker(NodeId::new("w1"), caps(&["build"]))
            .await
            .expect("spawn worker");

        let id = runtime
            .issue_directive("render".into(), json!({}), caps(&["gpu"]), 80)
            .await
            .expect("issue");

        let queen = runtime.queen();
        let pending = queen.directive_status(id).await.expect("known directive");
        assert_eq!(pending.status, DirectiveStatus::Pending);

        runtime
            .spawn_worker(NodeId::new("w2"), caps(&["gpu", "build"]))
            .await
            .expect("spawn gpu worker");

        let directive = eventually!(3_000, {
            let d = queen.directive_status(id).await.expect("known directive");
            (d.status == DirectiveStatus::Completed).then_some(d)
        });
        assert_eq!(directive.assigned_to, Some(NodeId::new("w2")));
        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn majority_proposal_resolves_across_live_workers() {
        let runtime = started_runtime().await;
        for name in ["w1", "w2", "w3"] {
            runtime
                .spawn_worker(NodeId::new(name), caps(&["vote"]))
                .await
                .expect("spawn worker");
        }

        let id = runtime
            .propose_decision(
                "adopt mesh layout?".into(),
                vec!["adopt".into(), "reject".into()],
                ConsensusType::Majority,
            )
            .await
            .expect("propose");

        // Healthy workers all vote for the first option, so the proposal
        // resolves early, well before the deadline.
        let queen = runtime.queen();
        let proposal = eventually!(3_000, {
            let p = queen.proposal_status(id).await.expect("known proposal");
            p.outcome.is_terminal().then_some(p)
        });
        assert_eq!(proposal.outcome, ProposalOutcome::Accepted("adopt".into()));
        assert_eq!(proposal.votes.len(), 3);
        runtime.shutdown().await;
    }

    /// A byzantine proposal runs a real PBFT round over the loopback
    /// fabric: the queen's replica plus three worker replicas satisfy
    /// `3f+1` for the default `f = 1`.
    #[tokio::test(flavor = "multi_thread")]
    async fn byzantine_proposal_commits_over_the_loopback_fabric() {
        let runtime = started_runtime().await;
        for name in ["w1", "w2", "w3"] {
            runtime
                .spawn_worker(NodeId::new(name), caps(&["vote"]))
                .await
                .expect("spawn worker");
        }

        let id = runtime
            .propose_decision(
                "promote w1 to bridge?".into(),
                vec!["promote".into()],
                ConsensusType::Byzantine,
            )
            .await
            .expect("propose");

        let queen = runtime.queen();
        let proposal = eventually!(5_000, {
            let p = queen.proposal_status(id).await.expect("known proposal");
            p.outcome.is_terminal().then_some(p)
        });
        assert_eq!(proposal.outcome, ProposalOutcome::Accepted("promote".into()));
        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn worker_removal_frees_registry_and_topology() {
        let runtime = started_runtime().await;
        runtime
            .spawn_worker(NodeId::new("w1"), caps(&["build"]))
            .await
            .expect("spawn w1");
        runtime
            .spawn_worker(NodeId::new("w2"), caps(&["build"]))
            .await
            .expect("spawn w2");

        let before = runtime.metrics().await;
        assert_eq!(before.coordination.workers_total, 2);
        assert_eq!(before.graph.node_count, 3); // queen + two workers

        runtime
            .remove_worker(&NodeId::new("w1"))
            .await
            .expect("remove");

        let after = runtime.metrics().await;
        assert_eq!(after.coordination.workers_total, 1);
        assert_eq!(after.graph.node_count, 2);
        assert!(runtime.detect_partitions().await.is_empty());
        runtime.shutdown().await;
    }
}
