//! One PBFT round: phase state machine, idempotent vote bookkeeping, and
//! quorum math.
//!
//! # Invariants
//!
//! - A round only advances phase when the `2f+1` quorum for the current
//!   phase is met.
//! - Votes are sets keyed by node ID; replaying a message can never change
//!   a count.
//! - Phase transitions are strictly ordered: pre-prepare, prepare, commit.
//!   Messages for an already-advanced or not-yet-reached phase are
//!   discarded.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shared_types::{NodeId, RoundId, ValueDigest};
use std::collections::{BTreeMap, BTreeSet};

/// Keccak256 digest of a proposed value.
#[must_use]
pub fn digest_value(value: &str) -> ValueDigest {
    let mut hasher = Keccak256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Upper bound `f` on Byzantine nodes tolerated.
    pub fault_tolerance: usize,
    /// Silence window before a replica votes view-change.
    pub view_change_timeout_ms: u64,
    /// View changes allowed per round before it fails terminally.
    pub max_view_changes: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            fault_tolerance: 1,
            view_change_timeout_ms: 2_000,
            max_view_changes: 3,
        }
    }
}

impl ConsensusConfig {
    /// Minimum membership a round needs: `3f + 1`.
    #[must_use]
    pub fn required_nodes(&self) -> usize {
        3 * self.fault_tolerance + 1
    }
}

/// Phase of a PBFT round, in strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundPhase {
    /// Awaiting the primary's pre-prepare for the current view.
    PrePrepare,
    /// Pre-prepare accepted; collecting prepare votes.
    Prepare,
    /// Prepared; collecting commit votes.
    Commit,
    /// Terminal: quorum committed the value.
    Committed,
    /// A view change is being voted (round will resume or fail).
    ViewChange,
    /// Terminal: view-change budget exhausted.
    Failed,
}

impl RoundPhase {
    /// True for states that permit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

/// The agreed value reported upward once a round commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    /// The committed round.
    pub round_id: RoundId,
    /// The agreed value.
    pub value: String,
    /// The view in which commitment happened.
    pub view: u64,
}

/// What recording a vote did to the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote recorded; quorum not yet met.
    Recorded,
    /// Vote completed the quorum and the phase advanced.
    QuorumReached,
    /// Duplicate, stale, mismatched, or non-member vote; discarded.
    Discarded,
}

/// One PBFT consensus instance.
#[derive(Debug, Clone)]
pub struct ConsensusRound {
    /// Round identifier.
    pub round_id: RoundId,
    /// Current view number; advances on view change.
    pub view: u64,
    /// Current phase.
    pub phase: RoundPhase,
    /// The pending value, known from the request or the pre-prepare.
    pub value: Option<String>,
    /// Digest the current view is agreeing on.
    pub digest: Option<ValueDigest>,
    /// View changes consumed so far.
    pub view_changes: u32,
    /// Unix timestamp (ms) of the last accepted protocol step.
    pub last_progress_ms: u64,
    /// Sorted membership snapshot taken at round start.
    membership: Vec<NodeId>,
    /// Effective `f` for this round.
    f: usize,
    /// Prepare votes per digest, keyed by voter.
    prepares: BTreeMap<ValueDigest, BTreeSet<NodeId>>,
    /// Commit votes per digest, keyed by voter.
    commits: BTreeMap<ValueDigest, BTreeSet<NodeId>>,
    /// View-change votes per proposed view, keyed by voter.
    view_votes: BTreeMap<u64, BTreeSet<NodeId>>,
    /// Views this replica has already voted to abandon.
    local_view_votes: BTreeSet<u64>,
}

impl ConsensusRound {
    /// Create a round over a membership snapshot. The snapshot is sorted so
    /// every replica derives the same primary.
    #[must_use]
    pub fn new(round_id: RoundId, mut membership: Vec<NodeId>, f: usize, now_ms: u64) -> Self {
        membership.sort();
        membership.dedup();
        Self {
            round_id,
            view: 0,
            phase: RoundPhase::PrePrepare,
            value: None,
            digest: None,
            view_changes: 0,
            last_progress_ms: now_ms,
            membership,
            f,
            prepares: BTreeMap::new(),
            commits: BTreeMap::new(),
            view_votes: BTreeMap::new(),
            local_view_votes: BTreeSet::new(),
        }
    }

    /// Membership size `n`.
    #[must_use]
    pub fn n(&self) -> usize {
        self.membership.len()
    }

    /// Effective fault tolerance for this round.
    #[must_use]
    pub fn f(&self) -> usize {
        self.f
    }

    /// Quorum threshold `2f + 1`.
    #[must_use]
    pub fn quorum(&self) -> usize {
        2 * self.f + 1
    }

    /// Primary for the current view: `view mod n` over sorted membership.
    #[must_use]
    pub fn primary(&self) -> &NodeId {
        &self.membership[(self.view as usize) % self.membership.len()]
    }

    /// Primary a given view would have.
    #[must_use]
    pub fn primary_for(&self, view: u64) -> &NodeId {
        &self.membership[(view as usize) % self.membership.len()]
    }

    /// True if the node is part of this round's membership snapshot.
    #[must_use]
    pub fn is_member(&self, id: &NodeId) -> bool {
        self.membership.binary_search(id).is_ok()
    }

    /// Membership snapshot (sorted).
    #[must_use]
    pub fn members(&self) -> &[NodeId] {
        &self.membership
    }

    /// Record the pending value from the proposer's request. Idempotent; a
    /// conflicting later request is discarded.
    pub fn record_request(&mut self, value: String, now_ms: u64) {
        if self.value.is_none() {
            self.value = Some(value);
            self.last_progress_ms = now_ms;
        }
    }

    /// Accept the primary's pre-prepare for the current view.
    ///
    /// Discards: wrong sender, wrong view, digest not matching the value,
    /// conflicting pre-prepare, or an already-advanced phase.
    pub fn record_pre_prepare(
        &mut self,
        sender: &NodeId,
        view: u64,
        digest: ValueDigest,
        value: &str,
        now_ms: u64,
    ) -> VoteOutcome {
        if self.phase != RoundPhase::PrePrepare
            || view != self.view
            || sender != self.primary()
            || digest_value(value) != digest
        {
            return VoteOutcome::Discarded;
        }
        if let Some(existing) = &self.digest {
            if *existing != digest {
                return VoteOutcome::Discarded;
            }
        }
        self.value = Some(value.to_owned());
        self.digest = Some(digest);
        self.phase = RoundPhase::Prepare;
        self.last_progress_ms = now_ms;
        VoteOutcome::QuorumReached
    }

    /// Record a prepare vote. Advances to `Commit` on the `2f+1` quorum for
    /// the accepted digest.
    pub fn record_prepare(
        &mut self,
        voter: &NodeId,
        view: u64,
        digest: ValueDigest,
        now_ms: u64,
    ) -> VoteOutcome {
        if view != self.view || !self.is_member(voter) || self.phase.is_terminal() {
            return VoteOutcome::Discarded;
        }
        // Votes arriving just before our own pre-prepare acceptance are
        // kept; they count once the digest is fixed.
        let inserted = self
            .prepares
            .entry(digest)
            .or_default()
            .insert(voter.clone());
        if !inserted {
            return VoteOutcome::Discarded;
        }
        if self.phase == RoundPhase::Prepare && self.accepted_votes(&self.prepares) >= self.quorum()
        {
            self.phase = RoundPhase::Commit;
            self.last_progress_ms = now_ms;
            return VoteOutcome::QuorumReached;
        }
        VoteOutcome::Recorded
    }

    /// Record a commit vote. Advances to `Committed` on the `2f+1` quorum.
    pub fn record_commit(
        &mut self,
        voter: &NodeId,
        view: u64,
        digest: ValueDigest,
        now_ms: u64,
    ) -> VoteOutcome {
        if view != self.view || !self.is_member(voter) || self.phase.is_terminal() {
            return VoteOutcome::Discarded;
        }
        let inserted = self
            .commits
            .entry(digest)
            .or_default()
            .insert(voter.clone());
        if !inserted {
            return VoteOutcome::Discarded;
        }
        if self.phase == RoundPhase::Commit && self.accepted_votes(&self.commits) >= self.quorum() {
            self.phase = RoundPhase::Committed;
            self.last_progress_ms = now_ms;
            return VoteOutcome::QuorumReached;
        }
        VoteOutcome::Recorded
    }

    /// Record a view-change vote for `new_view`. Returns `QuorumReached`
    /// when `2f+1` members want the same higher view; the caller then
    /// decides between [`Self::advance_view`] and terminal failure.
    pub fn record_view_change(&mut self, voter: &NodeId, new_view: u64) -> VoteOutcome {
        if new_view <= self.view || !self.is_member(voter) || self.phase.is_terminal() {
            return VoteOutcome::Discarded;
        }
        let inserted = self
            .view_votes
            .entry(new_view)
            .or_default()
            .insert(voter.clone());
        if !inserted {
            return VoteOutcome::Discarded;
        }
        if self.view_votes[&new_view].len() >= self.quorum() {
            VoteOutcome::QuorumReached
        } else {
            VoteOutcome::Recorded
        }
    }

    /// True if this replica has not yet voted to abandon the current view.
    pub fn mark_local_view_vote(&mut self, new_view: u64) -> bool {
        self.local_view_votes.insert(new_view)
    }

    /// Move the round to `new_view`: reset per-view vote state, keep the
    /// pending value so the new primary can retry it.
    pub fn advance_view(&mut self, new_view: u64, now_ms: u64) {
        self.view = new_view;
        self.view_changes += 1;
        self.phase = RoundPhase::PrePrepare;
        self.digest = None;
        self.prepares.clear();
        self.commits.clear();
        self.view_votes.retain(|v, _| *v > new_view);
        self.last_progress_ms = now_ms;
    }

    /// Terminally fail the round.
    pub fn fail(&mut self, now_ms: u64) {
        self.phase = RoundPhase::Failed;
        self.last_progress_ms = now_ms;
    }

    /// The decision, once committed.
    #[must_use]
    pub fn decision(&self) -> Option<ConsensusDecision> {
        if self.phase != RoundPhase::Committed {
            return None;
        }
        self.value.as_ref().map(|value| ConsensusDecision {
            round_id: self.round_id,
            value: value.clone(),
            view: self.view,
        })
    }

    /// Votes for the digest this view accepted; zero until pre-prepare.
    fn accepted_votes(&self, votes: &BTreeMap<ValueDigest, BTreeSet<NodeId>>) -> usize {
        match &self.digest {
            Some(digest) => votes.get(digest).map_or(0, BTreeSet::len),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("n{i}"))).collect()
    }

    fn committed_round(n: usize, f: usize) -> ConsensusRound {
        let ms = members(n);
        let mut round = ConsensusRound::new(RoundId::new(), ms.clone(), f, 0);
        let digest = digest_value("v");
        let primary = round.primary().clone();
        round.record_pre_prepare(&primary, 0, digest, "v", 1);
        for m in ms.iter().take(2 * f + 1) {
            round.record_prepare(m, 0, digest, 2);
        }
        for m in ms.iter().take(2 * f + 1) {
            round.record_commit(m, 0, digest, 3);
        }
        round
    }

    #[test]
    fn quorum_table() {
        for (n, f) in [(4usize, 1usize), (7, 2), (10, 3), (13, 4)] {
            let round = ConsensusRound::new(RoundId::new(), members(n), f, 0);
            assert_eq!(round.quorum(), 2 * f + 1);
        }
    }

    #[test]
    fn full_happy_path_commits() {
        let round = committed_round(4, 1);
        assert_eq!(round.phase, RoundPhase::Committed);
        assert_eq!(round.decision().unwrap().value, "v");
    }

    #[test]
    fn quorum_met_with_one_silent_node() {
        // 4 nodes, f=1: 3 voters suffice, the 4th never speaks.
        let round = committed_round(4, 1);
        assert_eq!(round.decision().unwrap().view, 0);
    }

    #[test]
    fn duplicate_prepare_does_not_change_count() {
        let ms = members(4);
        let mut round = ConsensusRound::new(RoundId::new(), ms.clone(), 1, 0);
        let digest = digest_value("v");
        let primary = round.primary().clone();
        round.record_pre_prepare(&primary, 0, digest, "v", 1);

        assert_eq!(round.record_prepare(&ms[0], 0, digest, 2), VoteOutcome::Recorded);
        assert_eq!(
            round.record_prepare(&ms[0], 0, digest, 2),
            VoteOutcome::Discarded
        );
        assert_eq!(round.record_prepare(&ms[1], 0, digest, 2), VoteOutcome::Recorded);
        // Third distinct voter completes the quorum; the duplicate did not.
        assert_eq!(
            round.record_prepare(&ms[2], 0, digest, 2),
            VoteOutcome::QuorumReached
        );
    }

    #[test]
    fn pre_prepare_from_non_primary_is_discarded() {
        let ms = members(4);
        let mut round = ConsensusRound::new(RoundId::new(), ms.clone(), 1, 0);
        let digest = digest_value("v");
        let not_primary = ms
            .iter()
            .find(|m| *m != round.primary())
            .cloned()
            .unwrap();
        assert_eq!(
            round.record_pre_prepare(&not_primary, 0, digest, "v", 1),
            VoteOutcome::Discarded
        );
        assert_eq!(round.phase, RoundPhase::PrePrepare);
    }

    #[test]
    fn digest_mismatch_is_discarded() {
        let ms = members(4);
        let mut round = ConsensusRound::new(RoundId::new(), ms, 1, 0);
        let primary = round.primary().clone();
        let wrong = digest_value("other");
        assert_eq!(
            round.record_pre_prepare(&primary, 0, wrong, "v", 1),
            VoteOutcome::Discarded
        );
    }

    #[test]
    fn stale_view_votes_are_discarded() {
        let ms = members(4);
        let mut round = ConsensusRound::new(RoundId::new(), ms.clone(), 1, 0);
        let digest = digest_value("v");
        let primary = round.primary().clone();
        round.record_pre_prepare(&primary, 0, digest, "v", 1);
        round.advance_view(1, 2);
        // Old-view prepare no longer counts.
        assert_eq!(
            round.record_prepare(&ms[0], 0, digest, 3),
            VoteOutcome::Discarded
        );
    }

    #[test]
    fn view_change_quorum_then_new_primary() {
        let ms = members(7);
        let mut round = ConsensusRound::new(RoundId::new(), ms.clone(), 2, 0);
        round.record_request("v".into(), 0);
        let old_primary = round.primary().clone();

        let mut reached = false;
        for m in ms.iter().take(5) {
            if round.record_view_change(m, 1) == VoteOutcome::QuorumReached {
                reached = true;
            }
        }
        assert!(reached);
        round.advance_view(1, 1);
        assert_eq!(round.view, 1);
        assert_ne!(round.primary(), &old_primary);
        // Pending value survives the view change.
        assert_eq!(round.value.as_deref(), Some("v"));
        assert_eq!(round.phase, RoundPhase::PrePrepare);
    }

    #[test]
    fn non_member_votes_are_discarded() {
        let ms = members(4);
        let mut round = ConsensusRound::new(RoundId::new(), ms, 1, 0);
        let digest = digest_value("v");
        let primary = round.primary().clone();
        round.record_pre_prepare(&primary, 0, digest, "v", 1);
        assert_eq!(
            round.record_prepare(&NodeId::new("outsider"), 0, digest, 2),
            VoteOutcome::Discarded
        );
    }

    #[test]
    fn committed_round_ignores_late_messages() {
        let mut round = committed_round(4, 1);
        let digest = round.digest.unwrap();
        let voter = round.members()[3].clone();
        assert_eq!(
            round.record_commit(&voter, 0, digest, 9),
            VoteOutcome::Discarded
        );
        assert_eq!(round.phase, RoundPhase::Committed);
    }
}
