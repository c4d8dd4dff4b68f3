//! # IPC Message Payloads
//!
//! Defines the message payloads exchanged between subsystems over the shared
//! bus and the transport collaborator.
//!
//! ## Design Rules
//!
//! - Request/response pairs correlate through the entity id they concern
//!   (`RoundId`, `ProposalId`, `DirectiveId`); there is no separate
//!   correlation field.
//! - Sender identity is supplied by the (already authenticated) transport;
//!   payloads do not duplicate it unless the protocol itself needs the
//!   originating node (e.g. PBFT votes are keyed by voter).
//! - Every protocol tolerates duplicated and out-of-order delivery.

use crate::entities::{Directive, DirectiveId, DirectiveResult, NodeId, ProposalId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// HEARTBEATS
// =============================================================================

/// Periodic worker liveness report.
/// Sender: Worker | Receiver: Queen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// The reporting worker.
    pub worker_id: NodeId,
    /// Self-reported health in `0.0..=1.0`.
    pub health: f64,
    /// Directives currently queued or executing on the worker.
    pub load: u32,
    /// Unix timestamp (ms) on the worker when the heartbeat was produced.
    pub sent_at_ms: u64,
}

// =============================================================================
// DIRECTIVES
// =============================================================================

/// Dispatch of a directive to its selected worker.
/// Sender: Queen | Receiver: Worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveDispatchPayload {
    /// The directive to execute.
    pub directive: Directive,
}

/// Advisory cancellation of a previously dispatched directive.
/// Sender: Queen | Receiver: Worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveCancelPayload {
    /// The directive being cancelled.
    pub directive_id: DirectiveId,
}

/// Execution outcome report.
/// Sender: Worker | Receiver: Queen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveReportPayload {
    /// The outcome.
    pub result: DirectiveResult,
}

// =============================================================================
// VOTING
// =============================================================================

/// Request for a worker's vote on an open proposal.
/// Sender: Queen | Receiver: Worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequestPayload {
    /// The proposal being voted on.
    pub proposal_id: ProposalId,
    /// The question text, for policy evaluation.
    pub question: String,
    /// Candidate options.
    pub options: Vec<String>,
}

/// A worker's vote in response to a [`VoteRequestPayload`].
/// Sender: Worker | Receiver: Queen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponsePayload {
    /// The proposal voted on.
    pub proposal_id: ProposalId,
    /// The voter.
    pub voter: NodeId,
    /// Chosen option.
    pub option: String,
    /// Confidence in `0.0..=1.0` (used by weighted tallies only).
    pub confidence: f64,
}

// =============================================================================
// PBFT CONSENSUS
// =============================================================================

/// Unique identifier for one PBFT consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundId(pub Uuid);

impl RoundId {
    /// Generate a new random round ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A 32-byte Keccak256 digest of a proposed value.
pub type ValueDigest = [u8; 32];

/// PBFT protocol messages, broadcast between replicas.
///
/// Phase ordering within a round is strict: `Request` registers the pending
/// value, the primary answers with `PrePrepare`, replicas exchange `Prepare`
/// then `Commit`, each phase advancing only on a `2f+1` quorum. Duplicates
/// and messages for already-advanced phases are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PbftMessage {
    /// Proposer registers a value for agreement with every replica.
    Request {
        /// The round being opened.
        round_id: RoundId,
        /// The value to agree on.
        value: String,
    },
    /// Primary announces the value digest for the round in its view.
    PrePrepare {
        /// The round.
        round_id: RoundId,
        /// The primary's view number.
        view: u64,
        /// Digest of the proposed value.
        digest: ValueDigest,
        /// The proposed value itself (transport is trusted for integrity).
        value: String,
        /// The sending primary.
        sender: NodeId,
    },
    /// Replica acknowledges a well-formed pre-prepare.
    Prepare {
        /// The round.
        round_id: RoundId,
        /// View this prepare belongs to.
        view: u64,
        /// Digest being prepared.
        digest: ValueDigest,
        /// The voting replica.
        sender: NodeId,
    },
    /// Replica has collected a prepare quorum and moves to commit.
    Commit {
        /// The round.
        round_id: RoundId,
        /// View this commit belongs to.
        view: u64,
        /// Digest being committed.
        digest: ValueDigest,
        /// The voting replica.
        sender: NodeId,
    },
    /// Replica suspects the primary and votes to advance the view.
    ViewChange {
        /// The round.
        round_id: RoundId,
        /// The view being voted *for* (current view + 1).
        new_view: u64,
        /// The voting replica.
        sender: NodeId,
    },
}

impl PbftMessage {
    /// The round this message belongs to.
    #[must_use]
    pub fn round_id(&self) -> RoundId {
        match self {
            Self::Request { round_id, .. }
            | Self::PrePrepare { round_id, .. }
            | Self::Prepare { round_id, .. }
            | Self::Commit { round_id, .. }
            | Self::ViewChange { round_id, .. } => *round_id,
        }
    }
}
