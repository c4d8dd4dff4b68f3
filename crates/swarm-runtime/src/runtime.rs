//! Runtime control surface: lifecycle of the queen, workers, and the
//! background loops that keep the swarm healthy.

use crate::container::{consensus_config, RuntimeConsensus, RuntimeWorker, SwarmContainer};
use anyhow::Context;
use hs_01_topology::{GraphMetrics, TopologyApi};
use hs_02_consensus::ConsensusApi;
use hs_03_worker::WorkerApi;
use hs_04_queen::{QueenApi, QueenState, SwarmMetricsReport};
use parking_lot::Mutex;
use shared_types::{
    CapabilitySet, ConsensusType, DirectiveId, NodeId, NodeRole, ProposalId, SwarmConfig,
    TopologyType,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything spawned for one worker, so it can be torn down as a unit.
struct WorkerHandle {
    service: Arc<RuntimeWorker>,
    replica: Arc<RuntimeConsensus>,
    tasks: Vec<JoinHandle<()>>,
}

/// Combined health report: coordination counters plus graph shape.
#[derive(Debug, Clone)]
pub struct RuntimeMetrics {
    pub coordination: SwarmMetricsReport,
    pub graph: GraphMetrics,
}

/// A whole swarm in one process.
pub struct SwarmRuntime {
    container: SwarmContainer,
    workers: Mutex<HashMap<NodeId, WorkerHandle>>,
    core_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SwarmRuntime {
    /// Validate the configuration and wire the container.
    pub fn new(config: SwarmConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid swarm configuration")?;
        Ok(Self {
            container: SwarmContainer::new(config),
            workers: Mutex::new(HashMap::new()),
            core_tasks: Mutex::new(Vec::new()),
        })
    }

    /// The queen's node identifier.
    #[must_use]
    pub fn queen_id(&self) -> &NodeId {
        &self.container.queen_id
    }

    /// Shared bus handle, for subscribers outside the runtime.
    #[must_use]
    pub fn event_bus(&self) -> Arc<shared_bus::InMemoryEventBus> {
        Arc::clone(&self.container.event_bus)
    }

    /// Elect the queen, seed the topology, and start the background loops.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        let container = &self.container;

        container
            .queen
            .initialize()
            .await
            .context("queen election failed")?;

        container
            .topology
            .add_node(container.queen_id.clone(), NodeRole::Queen)
            .await
            .context("seeding topology with the queen")?;

        let sweep = Duration::from_millis(container.config.heartbeat_interval_ms.max(100));
        let view_sweep = Duration::from_millis(
            (consensus_config(&container.config).view_change_timeout_ms / 2).max(100),
        );
        let mut tasks = self.core_tasks.lock();
        tasks.push(container.queen.spawn_monitor_loop(sweep));
        tasks.push(container.topology.spawn_partition_sweeper());
        tasks.push(container.queen_replica.spawn_timeout_sweeper(view_sweep));

        info!(queen = %container.queen_id, "swarm runtime initialized");
        Ok(())
    }

    /// Bring one worker online: register it with the queen, attach it to
    /// the transports and the consensus fabric, and start its loops.
    pub async fn spawn_worker(
        &self,
        id: NodeId,
        capabilities: CapabilitySet,
    ) -> anyhow::Result<()> {
        let container = &self.container;

        // Attach and connect before registering: registration makes the
        // worker eligible immediately, and the queen retries pending
        // directives at that moment.
        let service = container.new_worker(id.clone(), capabilities.clone());
        container
            .worker_transport
            .register_worker(id.clone(), Arc::clone(&service) as Arc<dyn WorkerApi>);

        if let Err(err) = service.connect().await {
            container.worker_transport.unregister_worker(&id);
            anyhow::bail!("worker {id} failed to connect: {err}");
        }

        if let Err(err) = container
            .queen
            .register_worker(id.clone(), capabilities)
            .await
        {
            container.worker_transport.unregister_worker(&id);
            anyhow::bail!("registering worker {id}: {err}");
        }

        let replica = container.new_replica(id.clone());
        container.membership.add(id.clone());
        container
            .peer_transport
            .register(id.clone(), Arc::clone(&replica) as Arc<dyn ConsensusApi>);

        container
            .topology
            .add_node(id.clone(), NodeRole::Worker)
            .await
            .with_context(|| format!("adding worker {id} to topology"))?;

        let view_sweep = Duration::from_millis(
            (consensus_config(&container.config).view_change_timeout_ms / 2).max(100),
        );
        let tasks = vec![
            service.spawn_heartbeat_loop(),
            service.spawn_executor_loop(),
            replica.spawn_timeout_sweeper(view_sweep),
        ];

        self.workers.lock().insert(
            id.clone(),
            WorkerHandle {
                service,
                replica,
                tasks,
            },
        );
        info!(worker = %id, "worker online");
        Ok(())
    }

    /// Take one worker offline and return its in-flight directives to the
    /// pending pool.
    pub async fn remove_worker(&self, id: &NodeId) -> anyhow::Result<()> {
        let container = &self.container;

        let handle = self.workers.lock().remove(id);
        let Some(handle) = handle else {
            anyhow::bail!("worker {id} is not part of this runtime");
        };
        for task in &handle.tasks {
            task.abort();
        }
        drop(handle.service);
        drop(handle.replica);

        container.worker_transport.unregister_worker(id);
        container.peer_transport.unregister(id);
        container.membership.remove(id);
        if let Err(err) = container.topology.remove_node(id).await {
            warn!(worker = %id, error = %err, "topology removal failed");
        }
        container
            .queen
            .remove_worker(id)
            .await
            .with_context(|| format!("deregistering worker {id}"))?;
        info!(worker = %id, "worker offline");
        Ok(())
    }

    /// Current queen lifecycle state.
    pub async fn queen_state(&self) -> QueenState {
        self.container.queen.state().await
    }

    /// Issue a directive through the queen.
    pub async fn issue_directive(
        &self,
        directive_type: String,
        payload: serde_json::Value,
        required_capabilities: CapabilitySet,
        priority: u8,
    ) -> anyhow::Result<DirectiveId> {
        self.container
            .queen
            .issue_directive(directive_type, payload, required_capabilities, priority)
            .await
            .context("issuing directive")
    }

    /// Open a proposal through the queen.
    pub async fn propose_decision(
        &self,
        question: String,
        options: Vec<String>,
        consensus_type: ConsensusType,
    ) -> anyhow::Result<ProposalId> {
        self.container
            .queen
            .propose_decision(question, options, consensus_type)
            .await
            .context("opening proposal")
    }

    /// Switch the communication layout at runtime.
    pub async fn reconfigure_topology(&self, layout: TopologyType) -> anyhow::Result<()> {
        self.container
            .topology
            .reconfigure(layout)
            .await
            .context("reconfiguring topology")
    }

    /// On-demand partition detection; returns unreachable nodes.
    pub async fn detect_partitions(&self) -> Vec<NodeId> {
        self.container.topology.detect_partitions().await
    }

    /// Aggregate coordination and graph metrics.
    pub async fn metrics(&self) -> RuntimeMetrics {
        RuntimeMetrics {
            coordination: self.container.queen.swarm_metrics().await,
            graph: self.container.topology.metrics().await,
        }
    }

    /// Direct access to the queen's coordination surface.
    #[must_use]
    pub fn queen(&self) -> Arc<dyn QueenApi> {
        Arc::clone(&self.container.queen) as Arc<dyn QueenApi>
    }

    /// Abort every background task. Idempotent.
    pub async fn shutdown(&self) {
        info!("shutting down swarm runtime");
        let workers: Vec<WorkerHandle> = {
            let mut map = self.workers.lock();
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &workers {
            for task in &handle.tasks {
                task.abort();
            }
        }
        for task in self.core_tasks.lock().drain(..) {
            task.abort();
        }
    }
}
