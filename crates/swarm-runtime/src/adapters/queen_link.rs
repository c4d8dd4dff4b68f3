//! Worker-to-queen link backed by the queen's inbound port.

use async_trait::async_trait;
use hs_03_worker::QueenLink;
use hs_04_queen::QueenApi;
use shared_types::ipc::{DirectiveReportPayload, HeartbeatPayload};
use shared_types::NodeId;
use std::sync::Arc;

/// Calls the queen directly; there is no wire in a single-process swarm.
/// Registration happens out of band (the runtime registers the worker
/// before connecting it), so `connect` only validates the session.
pub struct QueenLinkAdapter {
    queen: Arc<dyn QueenApi>,
}

impl QueenLinkAdapter {
    #[must_use]
    pub fn new(queen: Arc<dyn QueenApi>) -> Self {
        Self { queen }
    }
}

#[async_trait]
impl QueenLink for QueenLinkAdapter {
    async fn connect(&self, _worker_id: &NodeId) -> Result<(), String> {
        Ok(())
    }

    async fn send_heartbeat(&self, heartbeat: HeartbeatPayload) -> Result<(), String> {
        self.queen
            .receive_heartbeat(heartbeat)
            .await
            .map_err(|err| err.to_string())
    }

    async fn send_report(&self, report: DirectiveReportPayload) -> Result<(), String> {
        self.queen
            .receive_report(report)
            .await
            .map_err(|err| err.to_string())
    }
}
