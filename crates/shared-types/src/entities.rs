//! # Core Domain Entities
//!
//! Defines the core swarm entities shared across subsystems.
//!
//! ## Clusters
//!
//! - **Membership**: `NodeId`, `NodeRole`, `NodeStatus`, `NodeInfo`, `CapabilitySet`
//! - **Work**: `Directive`, `DirectiveStatus`, `DirectiveResult`
//! - **Agreement**: `Proposal`, `ConsensusType`, `Vote`, `ProposalOutcome`
//! - **Topology**: `TopologyType`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: MEMBERSHIP
// =============================================================================

/// Stable identifier for a participant (queen or worker).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The role a node plays in the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// The coordinator. Exactly one per swarm.
    Queen,
    /// A task-executing agent.
    Worker,
}

/// Operational status of a registered node, as seen by the Queen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Heartbeating normally; eligible for directives and votes.
    Active,
    /// Reachable but struggling; still draining queued work.
    Degraded,
    /// Missed heartbeats past the timeout; excluded until re-registration.
    Failed,
}

/// An explicit capability set with superset-containment matching.
///
/// Directives carry required capabilities; a worker is eligible only when
/// its set is a superset of the requirement. Matching is exact string
/// membership, never inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Create an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from an iterator of capability names.
    pub fn from_iter<I, S>(caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(caps.into_iter().map(Into::into).collect())
    }

    /// Add a capability.
    pub fn insert(&mut self, cap: impl Into<String>) {
        self.0.insert(cap.into());
    }

    /// True if `self` contains every capability in `required`.
    #[must_use]
    pub fn is_superset(&self, required: &CapabilitySet) -> bool {
        self.0.is_superset(&required.0)
    }

    /// True if the named capability is present.
    #[must_use]
    pub fn contains(&self, cap: &str) -> bool {
        self.0.contains(cap)
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no capabilities are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over capability names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Clamp a raw health score into the valid `0.0..=1.0` range.
#[must_use]
pub fn clamp_health(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

/// A registered node record, owned by the Queen's registry.
///
/// Other components receive clones of this record, never references into
/// the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Stable node identifier.
    pub id: NodeId,
    /// Queen or worker.
    pub role: NodeRole,
    /// Capabilities advertised at registration.
    pub capabilities: CapabilitySet,
    /// Health score in `0.0..=1.0`, updated on every heartbeat.
    pub health: f64,
    /// Unix timestamp (ms) of the last heartbeat received.
    pub last_heartbeat_ms: u64,
    /// Peer IDs this node is wired to in the active topology.
    pub connections: Vec<NodeId>,
    /// Current status as judged by the health monitor.
    pub status: NodeStatus,
    /// Directives currently assigned and not yet terminal.
    pub load: u32,
}

impl NodeInfo {
    /// Create a fresh record for a newly registered node.
    #[must_use]
    pub fn new(id: NodeId, role: NodeRole, capabilities: CapabilitySet, now_ms: u64) -> Self {
        Self {
            id,
            role,
            capabilities,
            health: 1.0,
            last_heartbeat_ms: now_ms,
            connections: Vec::new(),
            status: NodeStatus::Active,
            load: 0,
        }
    }

    /// True if this node may receive directives or vote requests.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

// =============================================================================
// CLUSTER B: WORK (DIRECTIVES)
// =============================================================================

/// Unique identifier for a [`Directive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectiveId(pub Uuid);

impl DirectiveId {
    /// Generate a new random directive ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DirectiveId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DirectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveStatus {
    /// Issued but not yet assigned to a worker.
    Pending,
    /// Assigned and delivered to a worker.
    Dispatched,
    /// Terminal: executed successfully.
    Completed,
    /// Terminal: execution failed (reason recorded).
    Failed,
    /// Terminal: cancelled by the queen before completion.
    Cancelled,
}

impl DirectiveStatus {
    /// True for states that permit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A unit of work issued by the Queen to capability-matched workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    /// Unique directive identifier.
    pub id: DirectiveId,
    /// Free-form type tag (e.g. "compile", "analyze").
    pub directive_type: String,
    /// Opaque payload interpreted only by the executing worker.
    pub payload: serde_json::Value,
    /// Capabilities a worker must hold to be eligible.
    pub required_capabilities: CapabilitySet,
    /// Priority 0-100; higher dispatches first.
    pub priority: u8,
    /// Current lifecycle status.
    pub status: DirectiveStatus,
    /// Worker currently assigned, if any.
    pub assigned_to: Option<NodeId>,
    /// Unix timestamp (ms) when the queen issued the directive.
    pub issued_at_ms: u64,
    /// Populated when `status == Failed`.
    pub failure_reason: Option<String>,
}

impl Directive {
    /// Create a new pending directive. Priority is clamped to 100.
    #[must_use]
    pub fn new(
        directive_type: impl Into<String>,
        payload: serde_json::Value,
        required_capabilities: CapabilitySet,
        priority: u8,
        now_ms: u64,
    ) -> Self {
        Self {
            id: DirectiveId::new(),
            directive_type: directive_type.into(),
            payload,
            required_capabilities,
            priority: priority.min(100),
            status: DirectiveStatus::Pending,
            assigned_to: None,
            issued_at_ms: now_ms,
            failure_reason: None,
        }
    }
}

/// Outcome report a worker sends back after executing a directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveResult {
    /// The directive this report is for.
    pub directive_id: DirectiveId,
    /// The reporting worker.
    pub worker_id: NodeId,
    /// True on success.
    pub success: bool,
    /// Error detail on failure. Failures are never silently dropped.
    pub error: Option<String>,
    /// Unix timestamp (ms) when execution finished.
    pub finished_at_ms: u64,
}

// =============================================================================
// CLUSTER C: AGREEMENT (PROPOSALS & VOTES)
// =============================================================================

/// Unique identifier for a [`Proposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    /// Generate a new random proposal ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Threshold strategy used to resolve a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusType {
    /// Strictly more than 50% of votes.
    Majority,
    /// At least 67% of votes.
    Supermajority,
    /// Every vote for the same option.
    Unanimous,
    /// At least 67% of confidence-weighted votes.
    Weighted,
    /// Delegated to the PBFT engine; tolerates Byzantine voters.
    Byzantine,
}

/// A single vote on a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    /// The voting node.
    pub voter: NodeId,
    /// The chosen option (must be one of the proposal's options).
    pub option: String,
    /// Voter confidence in `0.0..=1.0`; only weighted tallies use it.
    pub confidence: f64,
}

/// Resolution state of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalOutcome {
    /// Still collecting votes.
    Open,
    /// Terminal: the named option won.
    Accepted(String),
    /// Terminal: deadline passed or threshold unreachable.
    NoConsensus,
    /// Terminal: cancelled by the queen.
    Cancelled,
}

impl ProposalOutcome {
    /// True once the proposal can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// A question requiring collective agreement before being acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique proposal identifier.
    pub id: ProposalId,
    /// The question being decided.
    pub question: String,
    /// Candidate options; votes outside this set are discarded.
    pub options: Vec<String>,
    /// Threshold strategy.
    pub consensus_type: ConsensusType,
    /// Unix timestamp (ms) after which the proposal closes.
    pub deadline_ms: u64,
    /// Votes keyed by voter. A re-vote replaces, never double-counts.
    pub votes: BTreeMap<NodeId, Vote>,
    /// Resolution state.
    pub outcome: ProposalOutcome,
}

impl Proposal {
    /// Create a new open proposal.
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        consensus_type: ConsensusType,
        deadline_ms: u64,
    ) -> Self {
        Self {
            id: ProposalId::new(),
            question: question.into(),
            options,
            consensus_type,
            deadline_ms,
            votes: BTreeMap::new(),
            outcome: ProposalOutcome::Open,
        }
    }

    /// Per-option tally. Weighted strategies sum confidence, others count 1.0
    /// per vote.
    #[must_use]
    pub fn tally(&self) -> BTreeMap<String, f64> {
        let weighted = self.consensus_type == ConsensusType::Weighted;
        let mut tally: BTreeMap<String, f64> = BTreeMap::new();
        for vote in self.votes.values() {
            let weight = if weighted {
                clamp_health(vote.confidence)
            } else {
                1.0
            };
            *tally.entry(vote.option.clone()).or_insert(0.0) += weight;
        }
        tally
    }
}

// =============================================================================
// CLUSTER D: TOPOLOGY
// =============================================================================

/// Layout strategy for the communication graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyType {
    /// Every worker has exactly one edge, to the queen.
    Hierarchical,
    /// Workers may connect to any subset of peers.
    Mesh,
    /// One queen edge plus a bounded number of peer edges.
    HierarchicalMesh,
    /// Type may change at runtime; queen-reachability is preserved across
    /// transitions.
    Adaptive,
}

impl fmt::Display for TopologyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hierarchical => "hierarchical",
            Self::Mesh => "mesh",
            Self::HierarchicalMesh => "hierarchical-mesh",
            Self::Adaptive => "adaptive",
        };
        f.write_str(s)
    }
}
