//! Ports layer: trait seams between this subsystem and the outside.

pub mod inbound;
pub mod outbound;

pub use inbound::TopologyApi;
pub use outbound::{BridgeProber, TopologyEventBus};
