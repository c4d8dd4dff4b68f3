//! Inbound port: the API the queen (via transport) drives on a worker.

use crate::domain::{WorkerResult, WorkerState};
use async_trait::async_trait;
use shared_types::ipc::{
    DirectiveCancelPayload, DirectiveDispatchPayload, VoteRequestPayload, VoteResponsePayload,
};

/// Directive intake, cancellation, and voting surface of a worker agent.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    /// Accept a dispatched directive into the bounded queue.
    async fn receive_directive(&self, dispatch: DirectiveDispatchPayload) -> WorkerResult<()>;

    /// Advisory cancellation: drops the directive if still queued, is a
    /// no-op once execution has started.
    async fn cancel_directive(&self, cancel: DirectiveCancelPayload) -> WorkerResult<()>;

    /// Answer a vote request through the injected vote policy. `None` is an
    /// abstention.
    async fn handle_vote_request(
        &self,
        request: VoteRequestPayload,
    ) -> WorkerResult<Option<VoteResponsePayload>>;

    /// Current lifecycle state.
    async fn state(&self) -> WorkerState;

    /// Directives queued plus executing.
    async fn load(&self) -> u32;
}
