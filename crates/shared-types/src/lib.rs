//! # Shared Types Crate
//!
//! This crate contains all cross-subsystem domain entities, IPC message
//! payloads, and the recognized configuration surface for the swarm.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **ID-Based Relations**: Components refer to each other by `NodeId` and
//!   look records up through the Queen's registry; no object cycles.
//! - **Copy-Out Queries**: Every type here is cheaply cloneable so services
//!   can hand out owned snapshots instead of live references.

pub mod config;
pub mod entities;
pub mod ipc;

pub use config::{ConfigError, SwarmConfig};
pub use entities::*;
pub use ipc::*;
