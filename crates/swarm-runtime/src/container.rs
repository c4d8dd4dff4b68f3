//! Subsystem container: concrete wiring of every service behind its ports.
//!
//! Initialization order follows the dependency levels:
//!
//! ```text
//! Level 0: event bus, loopback fabric, collective memory
//! Level 1: topology manager, queen's consensus replica
//! Level 2: queen coordinator (talks to everything below)
//! ```
//!
//! Worker services are created later, one per `spawn_worker` call, and get
//! their own consensus replica on the same fabric.

use crate::adapters::{
    AlwaysBridge, ConsensusGatewayAdapter, InMemoryCollectiveMemory, LocalExecutor,
    LoopbackElectionTransport, LoopbackPeerTransport, QueenLinkAdapter, SharedMembership,
    WorkerTransportAdapter,
};
use hs_01_topology::TopologyService;
use hs_02_consensus::ports::AcceptAll;
use hs_02_consensus::{
    ConsensusApi, ConsensusConfig, ConsensusService, SystemTimeSource as ConsensusClock,
};
use hs_03_worker::{HealthThresholdPolicy, SystemTimeSource as WorkerClock, WorkerService};
use hs_04_queen::{QueenApi, QueenService, SystemTimeSource as QueenClock};
use shared_bus::InMemoryEventBus;
use shared_types::{NodeId, SwarmConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Peer-degree cap for hierarchical-mesh edge wiring.
pub const DEFAULT_PEER_CAP: usize = 4;

/// Topology manager wired to the shared bus and the in-process prober.
pub type RuntimeTopology = TopologyService<hs_01_topology::adapters::SharedBusPublisher, AlwaysBridge>;

/// One PBFT replica on the loopback fabric.
pub type RuntimeConsensus = ConsensusService<
    LoopbackPeerTransport,
    SharedMembership,
    hs_02_consensus::SharedBusPublisher,
    AcceptAll,
    ConsensusClock,
>;

/// The queen coordinator with in-process collaborators.
pub type RuntimeQueen = QueenService<
    LoopbackElectionTransport,
    WorkerTransportAdapter,
    ConsensusGatewayAdapter,
    InMemoryCollectiveMemory,
    hs_04_queen::SharedBusPublisher,
    QueenClock,
>;

/// One worker agent with the payload-driven local executor.
pub type RuntimeWorker = WorkerService<
    QueenLinkAdapter,
    LocalExecutor,
    HealthThresholdPolicy,
    hs_03_worker::SharedBusPublisher,
    WorkerClock,
>;

/// Derive the PBFT engine's tuning from the swarm configuration. The
/// view-change window is a quarter of the proposal deadline so the default
/// budget of view changes fits inside one `consensus_timeout_ms`.
#[must_use]
pub fn consensus_config(config: &SwarmConfig) -> ConsensusConfig {
    ConsensusConfig {
        fault_tolerance: config.fault_tolerance,
        view_change_timeout_ms: (config.consensus_timeout_ms / 4).max(500),
        ..ConsensusConfig::default()
    }
}

/// Central container holding the long-lived subsystem instances.
pub struct SwarmContainer {
    pub config: SwarmConfig,
    pub queen_id: NodeId,
    pub event_bus: Arc<InMemoryEventBus>,
    pub membership: Arc<SharedMembership>,
    pub peer_transport: Arc<LoopbackPeerTransport>,
    pub worker_transport: Arc<WorkerTransportAdapter>,
    pub topology: Arc<RuntimeTopology>,
    pub queen: Arc<RuntimeQueen>,
    pub queen_replica: Arc<RuntimeConsensus>,
    pub memory: Arc<InMemoryCollectiveMemory>,
}

impl SwarmContainer {
    /// Wire every subsystem. Nothing runs yet; background loops are the
    /// runtime's responsibility.
    #[must_use]
    pub fn new(config: SwarmConfig) -> Self {
        info!("wiring Hive-Swarm subsystem container");

        // Level 0: shared infrastructure.
        let event_bus = Arc::new(InMemoryEventBus::new());
        let membership = Arc::new(SharedMembership::new());
        let peer_transport = Arc::new(LoopbackPeerTransport::new());
        let worker_transport = Arc::new(WorkerTransportAdapter::new());
        let memory = Arc::new(InMemoryCollectiveMemory::new(config.memory_capacity));

        // Level 1: topology manager and the queen's consensus replica.
        let topology = Arc::new(TopologyService::new(
            config.topology,
            DEFAULT_PEER_CAP,
            Arc::new(hs_01_topology::adapters::SharedBusPublisher::new(Arc::clone(&event_bus))),
            Arc::new(AlwaysBridge),
            Duration::from_millis(config.partition_check_interval_ms),
        ));

        let queen_id = NodeId::new(format!("queen-{}", Uuid::new_v4()));
        let queen_replica = Arc::new(ConsensusService::new(
            queen_id.clone(),
            consensus_config(&config),
            Arc::clone(&peer_transport),
            Arc::clone(&membership),
            Arc::new(hs_02_consensus::SharedBusPublisher::new(Arc::clone(&event_bus))),
            Arc::new(AcceptAll),
            Arc::new(ConsensusClock),
        ));
        membership.add(queen_id.clone());
        peer_transport.register(
            queen_id.clone(),
            Arc::clone(&queen_replica) as Arc<dyn ConsensusApi>,
        );

        // Level 2: the queen herself.
        let queen = Arc::new(QueenService::new(
            queen_id.clone(),
            config.clone(),
            Arc::new(LoopbackElectionTransport),
            Arc::clone(&worker_transport),
            Arc::new(ConsensusGatewayAdapter::new(
                Arc::clone(&queen_replica) as Arc<dyn ConsensusApi>,
                config.consensus_timeout_ms,
            )),
            Arc::clone(&memory),
            Arc::new(hs_04_queen::SharedBusPublisher::new(Arc::clone(&event_bus))),
            Arc::new(QueenClock),
        ));
        worker_transport.set_queen(Arc::clone(&queen) as Arc<dyn QueenApi>);

        Self {
            config,
            queen_id,
            event_bus,
            membership,
            peer_transport,
            worker_transport,
            topology,
            queen,
            queen_replica,
            memory,
        }
    }

    /// Build a consensus replica for a newly spawned node on the shared
    /// fabric. The caller registers it with the transport and membership.
    #[must_use]
    pub fn new_replica(&self, id: NodeId) -> Arc<RuntimeConsensus> {
        Arc::new(ConsensusService::new(
            id,
            consensus_config(&self.config),
            Arc::clone(&self.peer_transport),
            Arc::clone(&self.membership),
            Arc::new(hs_02_consensus::SharedBusPublisher::new(Arc::clone(&self.event_bus))),
            Arc::new(AcceptAll),
            Arc::new(ConsensusClock),
        ))
    }

    /// Build a worker service bound to this container's queen.
    #[must_use]
    pub fn new_worker(
        &self,
        id: NodeId,
        capabilities: shared_types::CapabilitySet,
    ) -> Arc<RuntimeWorker> {
        Arc::new(WorkerService::new(
            id,
            capabilities,
            self.config.clone(),
            Arc::new(QueenLinkAdapter::new(
                Arc::clone(&self.queen) as Arc<dyn QueenApi>
            )),
            Arc::new(LocalExecutor),
            Arc::new(HealthThresholdPolicy::default()),
            Arc::new(hs_03_worker::SharedBusPublisher::new(Arc::clone(&self.event_bus))),
            Arc::new(WorkerClock),
        ))
    }
}
