//! Inbound port: the API other subsystems call on the consensus engine.

use crate::domain::{ConsensusDecision, ConsensusResult, RoundPhase};
use async_trait::async_trait;
use shared_types::ipc::PbftMessage;
use shared_types::RoundId;

/// Byzantine agreement over a string value.
#[async_trait]
pub trait ConsensusApi: Send + Sync {
    /// Open a round for `value` over the current membership and broadcast
    /// the request. Fails fast with `InsufficientNodes` when membership is
    /// below `3f+1`.
    async fn start_round(&self, value: String) -> ConsensusResult<RoundId>;

    /// Feed one protocol message from a peer into the local replica.
    ///
    /// Noise (stale views, duplicates, non-members, digest mismatches) is
    /// discarded without error.
    async fn handle_message(&self, message: PbftMessage) -> ConsensusResult<()>;

    /// Wait until the round commits, fails, or `timeout_ms` elapses.
    async fn await_consensus(
        &self,
        round_id: RoundId,
        timeout_ms: u64,
    ) -> ConsensusResult<ConsensusDecision>;

    /// Current phase of a round.
    async fn round_phase(&self, round_id: RoundId) -> ConsensusResult<RoundPhase>;
}
