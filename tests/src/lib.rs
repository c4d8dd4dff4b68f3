//! # Hive-Swarm Test Suite
//!
//! Unified test crate for cross-subsystem behavior. Per-subsystem unit
//! tests live next to the code they cover; everything here exercises two
//! or more subsystems through their real adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/integration/
//! ├── consensus_clusters.rs   # Multi-replica PBFT over the loopback fabric
//! ├── event_routing.rs        # Bus topic routing under real swarm traffic
//! ├── swarm_flows.rs          # Queen/worker lifecycle through SwarmRuntime
//! └── topology_transitions.rs # Layout reconfiguration and reachability
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hive-tests
//! cargo test -p hive-tests integration::swarm_flows
//! ```

#![allow(dead_code)]

pub mod integration;
