//! Shared-bus adapter for the [`TopologyEventBus`] port.

use crate::ports::TopologyEventBus;
use async_trait::async_trait;
use shared_bus::{EventPublisher, InMemoryEventBus, SwarmEvent};
use shared_types::{NodeId, TopologyType};
use std::sync::Arc;

/// Publishes topology notifications onto the shared in-memory bus.
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
impl TopologyEventBus for SharedBusPublisher {
    async fn publish_partition_detected(&self, unreachable: Vec<NodeId>) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::PartitionDetected { unreachable })
            .await;
        Ok(())
    }

    async fn publish_partition_healed(
        &self,
        node: NodeId,
        bridged_via: NodeId,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::PartitionHealed { node, bridged_via })
            .await;
        Ok(())
    }

    async fn publish_partition_unresolved(&self, unreachable: Vec<NodeId>) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::PartitionUnresolved { unreachable })
            .await;
        Ok(())
    }

    async fn publish_reconfigured(
        &self,
        from: TopologyType,
        to: TopologyType,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::TopologyReconfigured { from, to })
            .await;
        Ok(())
    }
}
