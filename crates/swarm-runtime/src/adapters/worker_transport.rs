//! Queen-to-worker transport backed by the workers' inbound ports.

use async_trait::async_trait;
use hs_03_worker::WorkerApi;
use hs_04_queen::{QueenApi, WorkerTransport};
use parking_lot::RwLock;
use shared_types::ipc::{DirectiveCancelPayload, DirectiveDispatchPayload, VoteRequestPayload};
use shared_types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes queen traffic to registered worker handles. Vote responses flow
/// back to the queen on a spawned task so the request path never re-enters
/// her state while she is still sending.
#[derive(Default)]
pub struct WorkerTransportAdapter {
    workers: RwLock<HashMap<NodeId, Arc<dyn WorkerApi>>>,
    queen: RwLock<Option<Arc<dyn QueenApi>>>,
}

impl WorkerTransportAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Late-bound queen handle; set once during container wiring.
    pub fn set_queen(&self, queen: Arc<dyn QueenApi>) {
        *self.queen.write() = Some(queen);
    }

    pub fn register_worker(&self, id: NodeId, worker: Arc<dyn WorkerApi>) {
        self.workers.write().insert(id, worker);
    }

    pub fn unregister_worker(&self, id: &NodeId) {
        self.workers.write().remove(id);
    }

    fn worker(&self, id: &NodeId) -> Result<Arc<dyn WorkerApi>, String> {
        self.workers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| format!("worker {id} not attached to transport"))
    }
}

#[async_trait]
impl WorkerTransport for WorkerTransportAdapter {
    async fn dispatch_directive(
        &self,
        worker: &NodeId,
        dispatch: DirectiveDispatchPayload,
    ) -> Result<(), String> {
        self.worker(worker)?
            .receive_directive(dispatch)
            .await
            .map_err(|err| err.to_string())
    }

    async fn cancel_directive(
        &self,
        worker: &NodeId,
        cancel: DirectiveCancelPayload,
    ) -> Result<(), String> {
        self.worker(worker)?
            .cancel_directive(cancel)
            .await
            .map_err(|err| err.to_string())
    }

    async fn request_vote(
        &self,
        worker: &NodeId,
        request: VoteRequestPayload,
    ) -> Result<(), String> {
        let handle = self.worker(worker)?;
        let queen = self
            .queen
            .read()
            .clone()
            .ok_or_else(|| "queen handle not wired".to_owned())?;
        let worker_id = worker.clone();
        tokio::spawn(async move {
            match handle.handle_vote_request(request).await {
                Ok(Some(vote)) => {
                    if let Err(err) = queen.receive_vote(vote).await {
                        debug!(worker = %worker_id, error = %err, "vote discarded");
                    }
                }
                Ok(None) => debug!(worker = %worker_id, "worker abstained"),
                Err(err) => debug!(worker = %worker_id, error = %err, "vote request failed"),
            }
        });
        Ok(())
    }
}
