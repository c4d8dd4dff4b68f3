//! Shared-bus adapter for the [`WorkerEventBus`] port.

use crate::ports::WorkerEventBus;
use async_trait::async_trait;
use shared_bus::{EventPublisher, InMemoryEventBus, SwarmEvent};
use shared_types::ipc::HeartbeatPayload;
use shared_types::NodeId;
use std::sync::Arc;

/// Publishes worker lifecycle notifications onto the shared in-memory bus.
pub struct SharedBusPublisher {
    bus: Arc<InMemoryEventBus>,
}

impl SharedBusPublisher {
    /// Wrap a shared bus handle.
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl WorkerEventBus for SharedBusPublisher {
    async fn publish_degraded(&self, worker_id: &NodeId) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::WorkerDegraded {
                worker_id: worker_id.clone(),
            })
            .await;
        Ok(())
    }

    async fn publish_recovered(&self, worker_id: &NodeId) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::WorkerRecovered {
                worker_id: worker_id.clone(),
            })
            .await;
        Ok(())
    }

    async fn publish_heartbeat(&self, heartbeat: &HeartbeatPayload) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::HeartbeatObserved(heartbeat.clone()))
            .await;
        Ok(())
    }
}
