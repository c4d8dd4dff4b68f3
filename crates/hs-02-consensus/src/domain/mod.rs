//! Domain layer: the PBFT round state machine, pure and synchronous.

pub mod error;
pub mod round;

pub use error::{ConsensusError, ConsensusResult};
pub use round::{
    digest_value, ConsensusConfig, ConsensusDecision, ConsensusRound, RoundPhase, VoteOutcome,
};
