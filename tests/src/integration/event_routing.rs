//! # Bus Topic Routing
//!
//! Subscriptions with topic filters against real runtime traffic: a
//! queen-topic subscriber must see coordination events and never worker
//! heartbeats, while an unfiltered subscriber sees both.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, SwarmEvent};
    use shared_types::{CapabilitySet, NodeId, SwarmConfig};
    use swarm_runtime::SwarmRuntime;

    fn fast_config() -> SwarmConfig {
        SwarmConfig {
            heartbeat_interval_ms: 50,
            worker_timeout_ms: 300,
            election_timeout_ms: 50,
            partition_check_interval_ms: 200,
            ..SwarmConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queen_topic_subscriber_never_sees_heartbeats() {
        let runtime = SwarmRuntime::new(fast_config()).expect("valid config");
        let mut queen_events = runtime
            .event_bus()
            .subscribe(EventFilter::topic(EventTopic::Queen));
        let mut all_events = runtime.event_bus().subscribe(EventFilter::all());

        runtime.initialize().await.expect("initialize");
        runtime
            .spawn_worker(
                NodeId::new("w1"),
                CapabilitySet::from_iter(["build"]),
            )
            .await
            .expect("spawn worker");
        runtime
            .issue_directive(
                "compile".into(),
                json!({}),
                CapabilitySet::from_iter(["build"]),
                50,
            )
            .await
            .expect("issue");

        // Drain the queen-topic subscription until the directive closes.
        let mut saw_leader = false;
        let mut saw_registration = false;
        loop {
            let event = tokio::time::timeout(Duration::from_secs(3), queen_events.recv())
                .await
                .expect("queen event within deadline")
                .expect("bus open");
            assert_eq!(
                event.topic(),
                EventTopic::Queen,
                "filtered subscription leaked {event:?}"
            );
            match event {
                SwarmEvent::LeaderElected { .. } => saw_leader = true,
                SwarmEvent::WorkerRegistered { .. } => saw_registration = true,
                SwarmEvent::DirectiveClosed { status, .. } => {
                    assert_eq!(status, "completed");
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_leader);
        assert!(saw_registration);

        // Give the worker a few heartbeat intervals, then check that the
        // unfiltered subscriber observed worker traffic too.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut saw_heartbeat = false;
        while let Ok(Some(event)) = all_events.try_recv() {
            if matches!(event, SwarmEvent::HeartbeatObserved(_)) {
                saw_heartbeat = true;
            }
        }
        assert!(saw_heartbeat, "no heartbeat reached the unfiltered subscriber");
        runtime.shutdown().await;
    }
}
