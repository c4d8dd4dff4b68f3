use super::*;
use hs_02_consensus::ConsensusError;
use parking_lot::Mutex;
use shared_types::{DirectiveResult, RoundId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Election transport whose voters grant or refuse wholesale.
struct ScriptedElection {
    grant: AtomicBool,
}

impl ScriptedElection {
    fn granting(grant: bool) -> Self {
        Self {
            grant: AtomicBool::new(grant),
        }
    }
}

#[async_trait]
impl ElectionTransport for ScriptedElection {
    async fn request_vote(
        &self,
        _peer: &NodeId,
        _candidate: &NodeId,
        _term: u64,
    ) -> Result<bool, String> {
        Ok(self.grant.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
struct RecordingWorkerTransport {
    dispatches: Mutex<Vec<(NodeId, DirectiveDispatchPayload)>>,
    cancels: Mutex<Vec<(NodeId, DirectiveCancelPayload)>>,
    vote_requests: Mutex<Vec<(NodeId, VoteRequestPayload)>>,
}

#[async_trait]
impl WorkerTransport for RecordingWorkerTransport {
    async fn dispatch_directive(
        &self,
        worker: &NodeId,
        dispatch: DirectiveDispatchPayload,
    ) -> Result<(), String> {
        self.dispatches.lock().push((worker.clone(), dispatch));
        Ok(())
    }

    async fn cancel_directive(
        &self,
        worker: &NodeId,
        cancel: DirectiveCancelPayload,
    ) -> Result<(), String> {
        self.cancels.lock().push((worker.clone(), cancel));
        Ok(())
    }

    async fn request_vote(
        &self,
        worker: &NodeId,
        request: VoteRequestPayload,
    ) -> Result<(), String> {
        self.vote_requests.lock().push((worker.clone(), request));
        Ok(())
    }
}

/// Gateway that commits the proposed value, or always fails.
struct StubGateway {
    fail: bool,
}

#[async_trait]
impl ConsensusGateway for StubGateway {
    async fn decide(
        &self,
        _proposal_id: ProposalId,
        value: String,
    ) -> Result<String, ConsensusError> {
        if self.fail {
            Err(ConsensusError::ConsensusTimeout(RoundId::new()))
        } else {
            Ok(value)
        }
    }
}

#[derive(Default)]
struct RecordingMemory {
    stored: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl MemoryGateway for RecordingMemory {
    async fn store(&self, key: String, value: serde_json::Value) -> Result<(), String> {
        self.stored.lock().push((key, value));
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<serde_json::Value>, String> {
        Ok(self
            .stored
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    async fn search_similar(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<(String, serde_json::Value)>, String> {
        Ok(self
            .stored
            .lock()
            .iter()
            .filter(|(k, _)| k.contains(pattern))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RecordingBus {
    elected: Mutex<Vec<(NodeId, u64)>>,
    registered: Mutex<Vec<NodeId>>,
    removed: Mutex<Vec<(NodeId, bool)>>,
    directives_closed: Mutex<Vec<(DirectiveId, String)>>,
    proposals_decided: Mutex<Vec<(ProposalId, Option<String>)>>,
}

#[async_trait]
impl QueenEventBus for RecordingBus {
    async fn publish_leader_elected(&self, queen_id: &NodeId, term: u64) -> Result<(), String> {
        self.elected.lock().push((queen_id.clone(), term));
        Ok(())
    }

    async fn publish_worker_registered(&self, worker_id: &NodeId) -> Result<(), String> {
        self.registered.lock().push(worker_id.clone());
        Ok(())
    }

    async fn publish_worker_removed(
        &self,
        worker_id: &NodeId,
        evicted: bool,
    ) -> Result<(), String> {
        self.removed.lock().push((worker_id.clone(), evicted));
        Ok(())
    }

    async fn publish_directive_closed(
        &self,
        directive_id: DirectiveId,
        status: &str,
    ) -> Result<(), String> {
        self.directives_closed
            .lock()
            .push((directive_id, status.to_owned()));
        Ok(())
    }

    async fn publish_proposal_decided(
        &self,
        proposal_id: ProposalId,
        accepted: Option<String>,
    ) -> Result<(), String> {
        self.proposals_decided.lock().push((proposal_id, accepted));
        Ok(())
    }
}

#[derive(Default)]
struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

type TestQueen = QueenService<
    ScriptedElection,
    RecordingWorkerTransport,
    StubGateway,
    RecordingMemory,
    RecordingBus,
    MockClock,
>;

struct Fixture {
    queen: TestQueen,
    transport: Arc<RecordingWorkerTransport>,
    memory: Arc<RecordingMemory>,
    bus: Arc<RecordingBus>,
    clock: Arc<MockClock>,
}

fn fixture_with(config: SwarmConfig, grant_votes: bool, gateway_fails: bool) -> Fixture {
    let transport = Arc::new(RecordingWorkerTransport::default());
    let memory = Arc::new(RecordingMemory::default());
    let bus = Arc::new(RecordingBus::default());
    let clock = Arc::new(MockClock::default());
    let queen = QueenService::new(
        NodeId::new("queen"),
        config,
        Arc::new(ScriptedElection::granting(grant_votes)),
        Arc::clone(&transport),
        Arc::new(StubGateway {
            fail: gateway_fails,
        }),
        Arc::clone(&memory),
        Arc::clone(&bus),
        Arc::clone(&clock),
    );
    Fixture {
        queen,
        transport,
        memory,
        bus,
        clock,
    }
}

fn fast_config() -> SwarmConfig {
    SwarmConfig {
        election_timeout_ms: 10,
        enable_failover: false,
        ..SwarmConfig::default()
    }
}

async fn leader_fixture() -> Fixture {
    let f = fixture_with(fast_config(), true, false);
    f.queen.initialize().await.unwrap();
    f
}

async fn register(f: &Fixture, id: &str, caps: &[&str]) {
    f.queen
        .register_worker(NodeId::new(id), CapabilitySet::from_iter(caps.iter().copied()))
        .await
        .unwrap();
}

fn heartbeat(id: &str, health: f64, load: u32, at: u64) -> HeartbeatPayload {
    HeartbeatPayload {
        worker_id: NodeId::new(id),
        health,
        load,
        sent_at_ms: at,
    }
}

fn vote(proposal_id: ProposalId, voter: &str, option: &str, confidence: f64) -> VoteResponsePayload {
    VoteResponsePayload {
        proposal_id,
        voter: NodeId::new(voter),
        option: option.into(),
        confidence,
    }
}

#[tokio::test]
async fn lone_queen_elects_itself() {
    let f = fixture_with(fast_config(), true, false);
    f.queen.initialize().await.unwrap();
    assert_eq!(f.queen.state().await, QueenState::Leader);
    assert_eq!(f.bus.elected.lock().as_slice(), &[(NodeId::new("queen"), 1)]);
}

#[tokio::test]
async fn refused_votes_time_out_and_stay_candidate() {
    let f = fixture_with(fast_config(), false, false);
    register(&f, "w1", &[]).await;
    register(&f, "w2", &[]).await;

    let err = f.queen.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        QueenError::ElectionTimeout {
            attempts: MAX_ELECTION_ATTEMPTS,
            ..
        }
    ));
    assert_eq!(f.queen.state().await, QueenState::Candidate);
}

#[tokio::test]
async fn directives_require_leadership() {
    let f = fixture_with(fast_config(), true, false);
    let err = f
        .queen
        .issue_directive("compile".into(), serde_json::json!({}), CapabilitySet::new(), 50)
        .await
        .unwrap_err();
    assert!(matches!(err, QueenError::NotLeader));
}

#[tokio::test]
async fn registration_capacity_is_enforced() {
    let config = SwarmConfig {
        max_workers: 1,
        ..fast_config()
    };
    let f = fixture_with(config, true, false);
    f.queen.initialize().await.unwrap();
    register(&f, "w1", &[]).await;
    let err = f
        .queen
        .register_worker(NodeId::new("w2"), CapabilitySet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QueenError::CapacityExceeded { max_workers: 1 }));
}

#[tokio::test]
async fn dispatch_selects_capable_least_loaded_worker() {
    let f = leader_fixture().await;
    register(&f, "w1", &["rust"]).await;
    register(&f, "w2", &["rust", "wasm"]).await;

    let id = f
        .queen
        .issue_directive(
            "build-wasm".into(),
            serde_json::json!({"target": "wasm32"}),
            CapabilitySet::from_iter(["rust", "wasm"]),
            80,
        )
        .await
        .unwrap();

    let dispatches = f.transport.dispatches.lock();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].0, NodeId::new("w2"));
    assert_eq!(dispatches[0].1.directive.id, id);
    drop(dispatches);

    let directive = f.queen.directive_status(id).await.unwrap();
    assert_eq!(directive.status, DirectiveStatus::Dispatched);
    assert_eq!(directive.assigned_to, Some(NodeId::new("w2")));
}

#[tokio::test]
async fn unmatched_directive_stays_pending_until_registration() {
    let f = leader_fixture().await;
    let id = f
        .queen
        .issue_directive(
            "train".into(),
            serde_json::json!({}),
            CapabilitySet::from_iter(["gpu"]),
            50,
        )
        .await
        .unwrap();
    assert_eq!(
        f.queen.directive_status(id).await.unwrap().status,
        DirectiveStatus::Pending
    );

    // The matching worker arriving triggers the retry.
    register(&f, "w-gpu", &["gpu", "rust"]).await;
    assert_eq!(
        f.queen.directive_status(id).await.unwrap().status,
        DirectiveStatus::Dispatched
    );
}

#[tokio::test]
async fn report_closes_directive_and_frees_load() {
    let f = leader_fixture().await;
    register(&f, "w1", &[]).await;
    let id = f
        .queen
        .issue_directive("compile".into(), serde_json::json!({}), CapabilitySet::new(), 50)
        .await
        .unwrap();

    f.queen
        .receive_report(DirectiveReportPayload {
            result: DirectiveResult {
                directive_id: id,
                worker_id: NodeId::new("w1"),
                success: true,
                error: None,
                finished_at_ms: 5,
            },
        })
        .await
        .unwrap();

    let directive = f.queen.directive_status(id).await.unwrap();
    assert_eq!(directive.status, DirectiveStatus::Completed);
    assert!(f
        .bus
        .directives_closed
        .lock()
        .contains(&(id, "completed".to_owned())));
    // The result was archived in collective memory.
    assert!(f
        .memory
        .stored
        .lock()
        .iter()
        .any(|(k, _)| k == &format!("directive:{id}")));
    let snapshot = f.queen.worker_snapshot().await;
    assert_eq!(snapshot[0].load, 0);
}

#[tokio::test]
async fn eviction_requeues_and_revival_redispatches() {
    let f = leader_fixture().await;
    register(&f, "w1", &[]).await;
    let id = f
        .queen
        .issue_directive("compile".into(), serde_json::json!({}), CapabilitySet::new(), 50)
        .await
        .unwrap();
    assert_eq!(
        f.queen.directive_status(id).await.unwrap().status,
        DirectiveStatus::Dispatched
    );

    f.clock.advance(SwarmConfig::default().worker_timeout_ms + 1);
    f.queen.run_sweep(f.clock.now_ms()).await;
    assert!(f.bus.removed.lock().contains(&(NodeId::new("w1"), true)));
    assert_eq!(
        f.queen.directive_status(id).await.unwrap().status,
        DirectiveStatus::Pending
    );

    // A heartbeat revives the worker and the directive goes out again.
    f.queen
        .receive_heartbeat(heartbeat("w1", 0.9, 0, f.clock.now_ms()))
        .await
        .unwrap();
    assert_eq!(
        f.queen.directive_status(id).await.unwrap().status,
        DirectiveStatus::Dispatched
    );
    assert_eq!(f.transport.dispatches.lock().len(), 2);
}

#[tokio::test]
async fn cancellation_is_advisory_and_closes_the_directive() {
    let f = leader_fixture().await;
    register(&f, "w1", &[]).await;
    let id = f
        .queen
        .issue_directive("compile".into(), serde_json::json!({}), CapabilitySet::new(), 50)
        .await
        .unwrap();

    f.queen.cancel_directive(id).await.unwrap();
    let directive = f.queen.directive_status(id).await.unwrap();
    assert_eq!(directive.status, DirectiveStatus::Cancelled);
    assert_eq!(f.transport.cancels.lock().len(), 1);
    // Cancelling a terminal directive is a no-op.
    f.queen.cancel_directive(id).await.unwrap();
    assert_eq!(f.transport.cancels.lock().len(), 1);
}

#[tokio::test]
async fn majority_proposal_resolves_from_votes() {
    let f = leader_fixture().await;
    for w in ["w1", "w2", "w3", "w4", "w5"] {
        register(&f, w, &[]).await;
    }

    let id = f
        .queen
        .propose_decision(
            "which plan?".into(),
            vec!["A".into(), "B".into()],
            ConsensusType::Majority,
        )
        .await
        .unwrap();
    // Every eligible worker was asked to vote.
    assert_eq!(f.transport.vote_requests.lock().len(), 5);

    for (w, option) in [("w1", "A"), ("w2", "A"), ("w3", "B"), ("w4", "A")] {
        f.queen.receive_vote(vote(id, w, option, 1.0)).await.unwrap();
        assert_eq!(
            f.queen.proposal_status(id).await.unwrap().outcome,
            ProposalOutcome::Open
        );
    }
    f.queen.receive_vote(vote(id, "w5", "B", 1.0)).await.unwrap();

    let proposal = f.queen.proposal_status(id).await.unwrap();
    assert_eq!(proposal.outcome, ProposalOutcome::Accepted("A".into()));
    let tally = proposal.tally();
    assert_eq!(tally["A"], 3.0);
    assert_eq!(tally["B"], 2.0);
    assert!(f
        .bus
        .proposals_decided
        .lock()
        .contains(&(id, Some("A".to_owned()))));
}

#[tokio::test]
async fn votes_from_strangers_are_rejected() {
    let f = leader_fixture().await;
    register(&f, "w1", &[]).await;
    let id = f
        .queen
        .propose_decision("q".into(), vec!["A".into()], ConsensusType::Majority)
        .await
        .unwrap();
    let err = f
        .queen
        .receive_vote(vote(id, "intruder", "A", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, QueenError::UnknownWorker(_)));
}

#[tokio::test]
async fn deadline_sweep_closes_unresolved_proposals() {
    let f = leader_fixture().await;
    for w in ["w1", "w2"] {
        register(&f, w, &[]).await;
    }
    let id = f
        .queen
        .propose_decision(
            "q".into(),
            vec!["A".into(), "B".into()],
            ConsensusType::Majority,
        )
        .await
        .unwrap();
    // Split vote, then the deadline passes.
    f.queen.receive_vote(vote(id, "w1", "A", 1.0)).await.unwrap();
    f.clock.advance(SwarmConfig::default().consensus_timeout_ms + 1);
    f.queen.run_sweep(f.clock.now_ms()).await;

    // One of two votes is not a strict majority.
    assert_eq!(
        f.queen.proposal_status(id).await.unwrap().outcome,
        ProposalOutcome::NoConsensus
    );
}

#[tokio::test]
async fn byzantine_proposal_delegates_to_the_gateway() {
    let f = leader_fixture().await;
    let id = f
        .queen
        .propose_decision(
            "promote build?".into(),
            vec!["promote".into(), "hold".into()],
            ConsensusType::Byzantine,
        )
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let proposal = f.queen.proposal_status(id).await.unwrap();
            if proposal.outcome != ProposalOutcome::Open {
                break proposal.outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(outcome, ProposalOutcome::Accepted("promote".into()));
}

#[tokio::test]
async fn failed_byzantine_round_is_no_consensus() {
    let f = fixture_with(fast_config(), true, true);
    f.queen.initialize().await.unwrap();
    let id = f
        .queen
        .propose_decision("q".into(), vec!["A".into()], ConsensusType::Byzantine)
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let proposal = f.queen.proposal_status(id).await.unwrap();
            if proposal.outcome != ProposalOutcome::Open {
                break proposal.outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(outcome, ProposalOutcome::NoConsensus);
}

#[tokio::test]
async fn swarm_metrics_aggregate_counts() {
    let f = leader_fixture().await;
    register(&f, "w1", &[]).await;
    f.queen
        .issue_directive("compile".into(), serde_json::json!({}), CapabilitySet::new(), 50)
        .await
        .unwrap();
    f.queen
        .propose_decision("q".into(), vec!["A".into()], ConsensusType::Majority)
        .await
        .unwrap();

    let report = f.queen.swarm_metrics().await;
    assert_eq!(report.workers_total, 1);
    assert_eq!(report.workers_active, 1);
    assert_eq!(report.directives_dispatched, 1);
    assert_eq!(report.proposals_open, 1);
}
