//! In-process adapters implementing the subsystems' outbound ports.

mod consensus_gateway;
mod executor;
mod loopback;
mod memory;
mod prober;
mod queen_link;
mod worker_transport;

pub use consensus_gateway::ConsensusGatewayAdapter;
pub use executor::LocalExecutor;
pub use loopback::{LoopbackElectionTransport, LoopbackPeerTransport, SharedMembership};
pub use memory::InMemoryCollectiveMemory;
pub use prober::AlwaysBridge;
pub use queen_link::QueenLinkAdapter;
pub use worker_transport::WorkerTransportAdapter;
