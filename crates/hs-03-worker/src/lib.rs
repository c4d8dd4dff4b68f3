//! # hs-03-worker
//!
//! Worker agent subsystem for Hive-Swarm.
//!
//! A worker accepts directives from the queen into a bounded FIFO queue,
//! executes them with bounded concurrency through an injected executor, and
//! reports every outcome back. A heartbeat loop keeps the queen informed;
//! sustained heartbeat delivery failure drops the worker into degraded mode,
//! where it stops accepting new directives, keeps draining its queue,
//! buffers reports, and reconnects with jittered exponential backoff.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──connect──→ Connecting ──ok──→ Active
//!                                                │ heartbeat failures past
//!                                                │ worker_timeout * threshold
//!                                                ▼
//!                                            Degraded ──reconnect──→ Active
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::SharedBusPublisher;
pub use domain::{WorkerCore, WorkerError, WorkerResult, WorkerState};
pub use ports::{
    DirectiveExecutor, HealthThresholdPolicy, QueenLink, SystemTimeSource, TimeSource, VotePolicy,
    WorkerApi, WorkerEventBus,
};
pub use service::WorkerService;
