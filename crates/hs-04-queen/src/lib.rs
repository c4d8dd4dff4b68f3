//! # hs-04-queen
//!
//! Queen coordinator subsystem for Hive-Swarm.
//!
//! The queen wins a Raft-style election over the known membership, then
//! owns the worker registry, directive scheduling, and proposal resolution:
//!
//! - **Registry** — `NodeInfo` records keyed by `NodeId`; heartbeats update
//!   health and load, silence past `worker_timeout_ms` marks a worker
//!   failed and removes it from eligibility until it re-registers.
//! - **Directives** — capability-superset filtering, least-load then
//!   highest-health ranking; directives with no eligible worker stay
//!   pending and are retried when membership or health changes.
//! - **Proposals** — majority, supermajority, unanimous and weighted
//!   tallies computed locally; byzantine proposals are delegated to the
//!   PBFT engine through the `ConsensusGateway` port.
//!
//! The collective-memory collaborator is reached through the narrow
//! `MemoryGateway` port; its failures are logged and never affect
//! correctness.

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::SharedBusPublisher;
pub use domain::{
    resolve_outcome, ElectionState, QueenError, QueenResult, QueenState, WorkerRegistry,
};
pub use ports::{
    ConsensusGateway, ElectionTransport, MemoryGateway, QueenApi, QueenEventBus,
    SwarmMetricsReport, SystemTimeSource, TimeSource, WorkerTransport,
};
pub use service::QueenService;
