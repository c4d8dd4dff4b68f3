//! Raft-style election bookkeeping: term counter, state machine, majority
//! math. The async vote collection lives in the service; this module only
//! decides.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the queen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueenState {
    /// Created but no election run yet.
    Uninitialized,
    /// Requesting votes for the current term.
    Candidate,
    /// Won a majority; coordinating the swarm.
    Leader,
    /// Relinquishing leadership.
    SteppingDown,
}

/// Election term and state bookkeeping.
#[derive(Debug, Clone)]
pub struct ElectionState {
    state: QueenState,
    term: u64,
}

impl Default for ElectionState {
    fn default() -> Self {
        Self {
            state: QueenState::Uninitialized,
            term: 0,
        }
    }
}

impl ElectionState {
    #[must_use]
    pub fn state(&self) -> QueenState {
        self.state
    }

    #[must_use]
    pub fn term(&self) -> u64 {
        self.term
    }

    /// Open a new candidacy: bump the term.
    pub fn start_candidacy(&mut self) -> u64 {
        self.state = QueenState::Candidate;
        self.term += 1;
        self.term
    }

    /// A majority granted their vote for `term`. Stale terms are ignored.
    pub fn won(&mut self, term: u64) -> bool {
        if term != self.term || self.state != QueenState::Candidate {
            return false;
        }
        self.state = QueenState::Leader;
        true
    }

    pub fn step_down(&mut self) {
        self.state = QueenState::SteppingDown;
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.state == QueenState::Leader
    }
}

/// Strict majority: more than half of the electorate, self-vote included.
#[must_use]
pub fn has_majority(granted: usize, electorate: usize) -> bool {
    electorate > 0 && granted * 2 > electorate
}
