//! # Swarm Events
//!
//! Defines all event types that flow through the shared bus. These are the
//! asynchronous notifications driving cross-subsystem choreography; payload
//! structs live in `shared-types/src/ipc.rs`.

use serde::{Deserialize, Serialize};
use shared_types::{
    DirectiveId, HeartbeatPayload, NodeId, ProposalId, RoundId, TopologyType,
};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwarmEvent {
    // =========================================================================
    // SUBSYSTEM 1: TOPOLOGY
    // =========================================================================
    /// One or more nodes are unreachable from the queen.
    PartitionDetected {
        /// Nodes BFS from the queen failed to reach.
        unreachable: Vec<NodeId>,
    },

    /// A previously detected partition was bridged.
    PartitionHealed {
        /// The node reconnected to the queen's component.
        node: NodeId,
        /// The peer the bridging edge was attached to.
        bridged_via: NodeId,
    },

    /// A partition could not be bridged; transport must re-establish
    /// connectivity.
    PartitionUnresolved {
        /// Nodes still unreachable after the heal attempt.
        unreachable: Vec<NodeId>,
    },

    /// The active topology type changed.
    TopologyReconfigured {
        /// Previous layout.
        from: TopologyType,
        /// New layout.
        to: TopologyType,
    },

    // =========================================================================
    // SUBSYSTEM 2: CONSENSUS
    // =========================================================================
    /// A PBFT round reached the committed phase.
    RoundCommitted {
        /// The committed round.
        round_id: RoundId,
        /// The agreed value.
        value: String,
        /// The view in which commitment happened.
        view: u64,
    },

    /// A PBFT round failed terminally.
    RoundFailed {
        /// The failed round.
        round_id: RoundId,
        /// Failure description.
        reason: String,
    },

    /// A replica quorum advanced the view for a round.
    ViewChanged {
        /// The round whose view advanced.
        round_id: RoundId,
        /// The new view number.
        new_view: u64,
        /// The primary for the new view.
        new_primary: NodeId,
    },

    // =========================================================================
    // SUBSYSTEM 3: WORKER
    // =========================================================================
    /// A worker entered degraded mode (queen unreachable).
    WorkerDegraded {
        /// The degraded worker.
        worker_id: NodeId,
    },

    /// A degraded worker reconnected and resumed active status.
    WorkerRecovered {
        /// The recovered worker.
        worker_id: NodeId,
    },

    /// A worker produced a heartbeat (also delivered point-to-point; the bus
    /// copy feeds observers).
    HeartbeatObserved(HeartbeatPayload),

    // =========================================================================
    // SUBSYSTEM 4: QUEEN
    // =========================================================================
    /// The queen won an election.
    LeaderElected {
        /// The elected queen.
        queen_id: NodeId,
        /// The winning term.
        term: u64,
    },

    /// Membership changed; topology rewires on this.
    WorkerRegistered {
        /// The new worker.
        worker_id: NodeId,
    },

    /// A worker left or was evicted after heartbeat timeout.
    WorkerRemoved {
        /// The removed worker.
        worker_id: NodeId,
        /// True when removal was timeout-based eviction.
        evicted: bool,
    },

    /// A directive reached a terminal state.
    DirectiveClosed {
        /// The directive.
        directive_id: DirectiveId,
        /// Terminal status as a string tag ("completed", "failed",
        /// "cancelled").
        status: String,
    },

    /// A proposal reached a terminal outcome.
    ProposalDecided {
        /// The proposal.
        proposal_id: ProposalId,
        /// Winning option, or `None` for no-consensus.
        accepted: Option<String>,
    },

    // =========================================================================
    // CRITICAL EVENTS
    // =========================================================================
    /// Operator-attention error that no subsystem could resolve locally.
    CriticalError {
        /// The subsystem that encountered the error.
        subsystem_id: u8,
        /// Error description.
        error: String,
    },
}

impl SwarmEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PartitionDetected { .. }
            | Self::PartitionHealed { .. }
            | Self::PartitionUnresolved { .. }
            | Self::TopologyReconfigured { .. } => EventTopic::Topology,
            Self::RoundCommitted { .. } | Self::RoundFailed { .. } | Self::ViewChanged { .. } => {
                EventTopic::Consensus
            }
            Self::WorkerDegraded { .. }
            | Self::WorkerRecovered { .. }
            | Self::HeartbeatObserved(_) => EventTopic::Worker,
            Self::LeaderElected { .. }
            | Self::WorkerRegistered { .. }
            | Self::WorkerRemoved { .. }
            | Self::DirectiveClosed { .. }
            | Self::ProposalDecided { .. } => EventTopic::Queen,
            Self::CriticalError { .. } => EventTopic::Critical,
        }
    }

    /// Get the originating subsystem ID.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self {
            Self::PartitionDetected { .. }
            | Self::PartitionHealed { .. }
            | Self::PartitionUnresolved { .. }
            | Self::TopologyReconfigured { .. } => 1,
            Self::RoundCommitted { .. } | Self::RoundFailed { .. } | Self::ViewChanged { .. } => 2,
            Self::WorkerDegraded { .. }
            | Self::WorkerRecovered { .. }
            | Self::HeartbeatObserved(_) => 3,
            Self::LeaderElected { .. }
            | Self::WorkerRegistered { .. }
            | Self::WorkerRemoved { .. }
            | Self::DirectiveClosed { .. }
            | Self::ProposalDecided { .. } => 4,
            Self::CriticalError { subsystem_id, .. } => *subsystem_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 1 events.
    Topology,
    /// Subsystem 2 events.
    Consensus,
    /// Subsystem 3 events.
    Worker,
    /// Subsystem 4 events.
    Queen,
    /// Operator-attention errors.
    Critical,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source subsystems to include. Empty means all sources.
    pub source_subsystems: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic: EventTopic) -> Self {
        Self::topics(vec![topic])
    }

    /// Check whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &SwarmEvent) -> bool {
        let topic_ok = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());
        let source_ok = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());
        topic_ok && source_ok
    }
}
