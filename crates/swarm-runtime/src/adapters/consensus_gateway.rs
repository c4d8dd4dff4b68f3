//! Byzantine proposal delegation to the local consensus replica.

use async_trait::async_trait;
use hs_02_consensus::{ConsensusApi, ConsensusError};
use hs_04_queen::ConsensusGateway;
use shared_types::ProposalId;
use std::sync::Arc;
use tracing::debug;

/// Drives a PBFT round on the queen's replica and waits for the decision.
pub struct ConsensusGatewayAdapter {
    replica: Arc<dyn ConsensusApi>,
    timeout_ms: u64,
}

impl ConsensusGatewayAdapter {
    #[must_use]
    pub fn new(replica: Arc<dyn ConsensusApi>, timeout_ms: u64) -> Self {
        Self {
            replica,
            timeout_ms,
        }
    }
}

#[async_trait]
impl ConsensusGateway for ConsensusGatewayAdapter {
    async fn decide(
        &self,
        proposal_id: ProposalId,
        value: String,
    ) -> Result<String, ConsensusError> {
        let round_id = self.replica.start_round(value).await?;
        debug!(proposal = %proposal_id, round = %round_id, "byzantine round opened");
        let decision = self.replica.await_consensus(round_id, self.timeout_ms).await?;
        Ok(decision.value)
    }
}
