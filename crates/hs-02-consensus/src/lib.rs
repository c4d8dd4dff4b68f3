//! # hs-02-consensus
//!
//! Byzantine consensus subsystem for Hive-Swarm.
//!
//! ## Architecture
//!
//! Implements PBFT three-phase agreement: a deterministic primary announces
//! a value digest (`pre-prepare`), replicas acknowledge (`prepare`), then
//! lock in (`commit`), each phase advancing only on a `2f+1` quorum out of
//! `n >= 3f+1` replicas. A silent or equivocating primary is replaced by
//! view change: `2f+1` replicas voting for `view+1` hand the round to the
//! next primary, which retries the pending value.
//!
//! ```text
//! proposer ──Request──→ all replicas
//! primary  ──PrePrepare──→ replicas ──Prepare──→ (2f+1) ──Commit──→ (2f+1)
//!                                                                     │
//!                                                                 committed
//! ```
//!
//! ## Fault tolerance
//!
//! | n  | f | quorum |
//! |----|---|--------|
//! | 4  | 1 | 3      |
//! | 7  | 2 | 5      |
//! | 10 | 3 | 7      |
//! | 13 | 4 | 9      |
//!
//! ## Message handling policy
//!
//! Malformed, stale-view, duplicate, and already-advanced-phase messages are
//! discarded locally; they are protocol noise, not errors. Only terminal
//! conditions (`InsufficientNodes`, exhausted view changes) surface to the
//! caller.

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::SharedBusPublisher;
pub use domain::{
    digest_value, ConsensusConfig, ConsensusDecision, ConsensusError, ConsensusResult,
    ConsensusRound, RoundPhase,
};
pub use ports::{
    ConsensusApi, ConsensusEventBus, MembershipProvider, PeerTransport, ReplicaVotePolicy,
    SystemTimeSource, TimeSource,
};
pub use service::ConsensusService;
