//! # swarm-runtime
//!
//! Composition root for a Hive-Swarm node. The subsystem crates know
//! nothing about each other; this crate implements their outbound ports
//! with in-process adapters and wires everything through the shared bus.
//!
//! ## Startup sequence
//!
//! 1. Shared infrastructure: event bus, loopback transports, membership.
//! 2. Queen + her consensus replica, registered on the loopback fabric.
//! 3. `initialize()`: election, topology seeding, background loops.
//! 4. `spawn_worker()` per agent: worker service + consensus replica,
//!    registration with the queen, heartbeat and executor loops.
//!
//! All cross-subsystem traffic stays inside the process: transports
//! deliver by calling the peer's inbound port on a spawned task.

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::{SwarmContainer, DEFAULT_PEER_CAP};
pub use runtime::{RuntimeMetrics, SwarmRuntime};
