//! Ports: inbound API and outbound dependencies of the worker service.

pub mod inbound;
pub mod outbound;

pub use inbound::WorkerApi;
pub use outbound::{
    DirectiveExecutor, HealthThresholdPolicy, QueenLink, SystemTimeSource, TimeSource, VotePolicy,
    WorkerEventBus,
};
