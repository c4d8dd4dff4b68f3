//! Outbound ports: what the worker service needs from its environment.

use async_trait::async_trait;
use shared_types::ipc::{DirectiveReportPayload, HeartbeatPayload, VoteRequestPayload};
use shared_types::{Directive, NodeId};
use std::time::{SystemTime, UNIX_EPOCH};

/// Point-to-point channel from a worker to its queen.
#[async_trait]
pub trait QueenLink: Send + Sync {
    /// Establish (or re-establish) the session with the queen.
    async fn connect(&self, worker_id: &NodeId) -> Result<(), String>;

    /// Deliver a liveness report.
    async fn send_heartbeat(&self, heartbeat: HeartbeatPayload) -> Result<(), String>;

    /// Deliver a directive outcome report.
    async fn send_report(&self, report: DirectiveReportPayload) -> Result<(), String>;
}

/// Executes directive payloads. The runtime supplies a real executor; tests
/// supply mocks.
#[async_trait]
pub trait DirectiveExecutor: Send + Sync {
    /// Run one directive to completion. `Err` becomes a failure report; it
    /// never kills the worker.
    async fn execute(&self, directive: &Directive) -> Result<(), String>;
}

/// Local decision rule for vote requests.
pub trait VotePolicy: Send + Sync {
    /// Choose an option and a confidence, or `None` to abstain.
    fn decide(&self, request: &VoteRequestPayload, health: f64) -> Option<(String, f64)>;
}

/// Default policy: vote for the first option iff local health is at or
/// above the threshold, with confidence equal to current health.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholdPolicy {
    pub threshold: f64,
}

impl Default for HealthThresholdPolicy {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl VotePolicy for HealthThresholdPolicy {
    fn decide(&self, request: &VoteRequestPayload, health: f64) -> Option<(String, f64)> {
        if health < self.threshold {
            return None;
        }
        request
            .options
            .first()
            .map(|option| (option.clone(), health))
    }
}

/// Worker lifecycle notifications published to the rest of the swarm.
#[async_trait]
pub trait WorkerEventBus: Send + Sync {
    async fn publish_degraded(&self, worker_id: &NodeId) -> Result<(), String>;
    async fn publish_recovered(&self, worker_id: &NodeId) -> Result<(), String>;
    async fn publish_heartbeat(&self, heartbeat: &HeartbeatPayload) -> Result<(), String>;
}

/// Clock abstraction so degradation timing is testable.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
