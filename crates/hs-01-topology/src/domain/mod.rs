//! Domain layer: pure graph logic, no I/O, no async.

pub mod adaptive;
pub mod errors;
pub mod graph;
pub mod metrics;

pub use adaptive::AdaptivePolicy;
pub use errors::TopologyError;
pub use graph::{HealReport, TopologyGraph, TopologySnapshot};
pub use metrics::GraphMetrics;
