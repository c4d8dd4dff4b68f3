//! Ports: inbound API and outbound dependencies of the queen service.

pub mod inbound;
pub mod outbound;

pub use inbound::{QueenApi, SwarmMetricsReport};
pub use outbound::{
    ConsensusGateway, ElectionTransport, MemoryGateway, QueenEventBus, SystemTimeSource,
    TimeSource, WorkerTransport,
};
