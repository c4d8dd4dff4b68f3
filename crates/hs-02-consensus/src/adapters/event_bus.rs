//! Shared-bus adapter for the [`ConsensusEventBus`] port.

use crate::domain::ConsensusDecision;
use crate::ports::ConsensusEventBus;
use async_trait::async_trait;
use shared_bus::{EventPublisher, InMemoryEventBus, SwarmEvent};
use shared_types::{NodeId, RoundId};
use std::sync::Arc;

/// Publishes round lifecycle notifications onto the shared in-memory bus.
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
impl ConsensusEventBus for SharedBusPublisher {
    async fn publish_round_committed(&self, decision: &ConsensusDecision) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::RoundCommitted {
                round_id: decision.round_id,
                value: decision.value.clone(),
                view: decision.view,
            })
            .await;
        Ok(())
    }

    async fn publish_round_failed(&self, round_id: RoundId, reason: &str) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::RoundFailed {
                round_id,
                reason: reason.to_owned(),
            })
            .await;
        Ok(())
    }

    async fn publish_view_changed(
        &self,
        round_id: RoundId,
        new_view: u64,
        new_primary: &NodeId,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::ViewChanged {
                round_id,
                new_view,
                new_primary: new_primary.clone(),
            })
            .await;
        Ok(())
    }
}
