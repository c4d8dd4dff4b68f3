//! Local proposal resolution: threshold math over the tally.
//!
//! Byzantine proposals never resolve here; they are delegated to the PBFT
//! engine by the service.

use shared_types::{ConsensusType, Proposal, ProposalOutcome};

/// Share of the tally the leading option needs, per strategy.
const SUPERMAJORITY_SHARE: f64 = 0.67;

/// Resolve an open proposal from its current votes.
///
/// - Majority: leading option holds strictly more than half the votes.
/// - Supermajority / Weighted: leading option holds at least 67% of the
///   (possibly confidence-weighted) total.
/// - Unanimous: every vote names the same option.
///
/// An empty tally, a tie, or an unmet threshold is `NoConsensus`.
#[must_use]
pub fn resolve_outcome(proposal: &Proposal) -> ProposalOutcome {
    if proposal.consensus_type == ConsensusType::Byzantine {
        return ProposalOutcome::Open;
    }
    let tally = proposal.tally();
    let total: f64 = tally.values().sum();
    let Some((leader, leader_score)) = tally.iter().max_by(|a, b| a.1.total_cmp(b.1)) else {
        return ProposalOutcome::NoConsensus;
    };
    if total <= 0.0 {
        return ProposalOutcome::NoConsensus;
    }
    let share = leader_score / total;
    let accepted = match proposal.consensus_type {
        ConsensusType::Majority => share > 0.5,
        ConsensusType::Supermajority | ConsensusType::Weighted => share >= SUPERMAJORITY_SHARE,
        ConsensusType::Unanimous => (leader_score - total).abs() < f64::EPSILON,
        ConsensusType::Byzantine => false,
    };
    if accepted {
        ProposalOutcome::Accepted(leader.clone())
    } else {
        ProposalOutcome::NoConsensus
    }
}
