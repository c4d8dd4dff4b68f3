//! Error types for the Consensus subsystem.

use shared_types::RoundId;

/// Consensus error types.
///
/// Protocol-internal anomalies (stale views, duplicate votes, digest
/// mismatches) never appear here; they are resolved locally by discarding
/// the offending message. Only conditions the caller must act on surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsensusError {
    /// Membership is below `3f+1`; the round is never attempted.
    #[error("Insufficient nodes for f={fault_tolerance}: need {required}, have {actual}")]
    InsufficientNodes {
        fault_tolerance: usize,
        required: usize,
        actual: usize,
    },

    /// View-change retries were exhausted without commitment.
    #[error("Consensus timed out for round {0} after exhausting view changes")]
    ConsensusTimeout(RoundId),

    /// The round ID is not (or no longer) known to this replica.
    #[error("Unknown round: {0}")]
    UnknownRound(RoundId),

    /// Broadcast could not reach any peer; the round cannot progress.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
