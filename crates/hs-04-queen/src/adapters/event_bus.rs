//! Shared-bus adapter for the [`QueenEventBus`] port.

use crate::ports::QueenEventBus;
use async_trait::async_trait;
use shared_bus::{EventPublisher, InMemoryEventBus, SwarmEvent};
use shared_types::{DirectiveId, NodeId, ProposalId};
use std::sync::Arc;

/// Publishes coordination notifications onto the shared in-memory bus.
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
impl QueenEventBus for SharedBusPublisher {
    async fn publish_leader_elected(&self, queen_id: &NodeId, term: u64) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::LeaderElected {
                queen_id: queen_id.clone(),
                term,
            })
            .await;
        Ok(())
    }

    async fn publish_worker_registered(&self, worker_id: &NodeId) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::WorkerRegistered {
                worker_id: worker_id.clone(),
            })
            .await;
        Ok(())
    }

    async fn publish_worker_removed(
        &self,
        worker_id: &NodeId,
        evicted: bool,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::WorkerRemoved {
                worker_id: worker_id.clone(),
                evicted,
            })
            .await;
        Ok(())
    }

    async fn publish_directive_closed(
        &self,
        directive_id: DirectiveId,
        status: &str,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::DirectiveClosed {
                directive_id,
                status: status.to_owned(),
            })
            .await;
        Ok(())
    }

    async fn publish_proposal_decided(
        &self,
        proposal_id: ProposalId,
        accepted: Option<String>,
    ) -> Result<(), String> {
        self.bus
            .publish(SwarmEvent::ProposalDecided {
                proposal_id,
                accepted,
            })
            .await;
        Ok(())
    }
}
