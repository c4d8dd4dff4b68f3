//! Ports: inbound API and outbound dependencies of the consensus service.

pub mod inbound;
pub mod outbound;

pub use inbound::ConsensusApi;
pub use outbound::{
    AcceptAll, ConsensusEventBus, MembershipProvider, PeerTransport, ReplicaVotePolicy,
    SystemTimeSource, TimeSource,
};
