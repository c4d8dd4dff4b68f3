//! Error types for the Queen subsystem.

use hs_02_consensus::ConsensusError;
use shared_types::{DirectiveId, NodeId, ProposalId};

/// Queen error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueenError {
    /// No majority within the bounded retries of one `initialize()` call.
    #[error("Election timed out after {attempts} attempts (term {term})")]
    ElectionTimeout { attempts: u32, term: u64 },

    /// The registry is at `max_workers`.
    #[error("Worker capacity exceeded (max {max_workers})")]
    CapacityExceeded { max_workers: usize },

    /// No active worker holds the required capabilities.
    #[error("No eligible worker for the required capabilities")]
    NoEligibleWorker,

    /// The operation requires leadership.
    #[error("Queen is not the leader")]
    NotLeader,

    /// The worker is not registered.
    #[error("Unknown worker: {0}")]
    UnknownWorker(NodeId),

    /// The directive ID is not known.
    #[error("Unknown directive: {0}")]
    UnknownDirective(DirectiveId),

    /// The proposal ID is not known.
    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    /// A byzantine proposal failed in the consensus engine.
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

/// Result type for queen operations.
pub type QueenResult<T> = Result<T, QueenError>;
