//! Queen service: election, registry, directive scheduling, and proposal
//! resolution over the outbound ports.
//!
//! All mutable state sits behind `parking_lot` locks that are never held
//! across an await. Lock order is directives before registry; sweeps and
//! retries copy IDs out before re-acquiring.

use crate::domain::election::has_majority;
use crate::domain::{
    resolve_outcome, ElectionState, QueenError, QueenResult, QueenState, WorkerRegistry,
};
use crate::metrics;
use crate::ports::{
    ConsensusGateway, ElectionTransport, MemoryGateway, QueenApi, QueenEventBus,
    SwarmMetricsReport, TimeSource, WorkerTransport,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use shared_types::ipc::{
    DirectiveCancelPayload, DirectiveDispatchPayload, DirectiveReportPayload, HeartbeatPayload,
    VoteRequestPayload, VoteResponsePayload,
};
use shared_types::{
    CapabilitySet, ConsensusType, Directive, DirectiveId, DirectiveStatus, NodeId, NodeInfo,
    Proposal, ProposalId, ProposalOutcome, SwarmConfig, Vote,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Vote-request retries within one `initialize()` call.
const MAX_ELECTION_ATTEMPTS: u32 = 5;

/// The queen coordinator.
pub struct QueenService<ET, WT, CG, MG, EB, C> {
    id: NodeId,
    config: SwarmConfig,
    election: Arc<RwLock<ElectionState>>,
    registry: Arc<RwLock<WorkerRegistry>>,
    directives: Arc<RwLock<HashMap<DirectiveId, Directive>>>,
    proposals: Arc<RwLock<HashMap<ProposalId, Proposal>>>,
    election_transport: Arc<ET>,
    worker_transport: Arc<WT>,
    consensus: Arc<CG>,
    memory: Arc<MG>,
    event_bus: Arc<EB>,
    clock: Arc<C>,
}

impl<ET, WT, CG, MG, EB, C> Clone for QueenService<ET, WT, CG, MG, EB, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            config: self.config.clone(),
            election: Arc::clone(&self.election),
            registry: Arc::clone(&self.registry),
            directives: Arc::clone(&self.directives),
            proposals: Arc::clone(&self.proposals),
            election_transport: Arc::clone(&self.election_transport),
            worker_transport: Arc::clone(&self.worker_transport),
            consensus: Arc::clone(&self.consensus),
            memory: Arc::clone(&self.memory),
            event_bus: Arc::clone(&self.event_bus),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<ET, WT, CG, MG, EB, C> QueenService<ET, WT, CG, MG, EB, C>
where
    ET: ElectionTransport + 'static,
    WT: WorkerTransport + 'static,
    CG: ConsensusGateway + 'static,
    MG: MemoryGateway + 'static,
    EB: QueenEventBus + 'static,
    C: TimeSource + 'static,
{
    pub fn new(
        id: NodeId,
        config: SwarmConfig,
        election_transport: Arc<ET>,
        worker_transport: Arc<WT>,
        consensus: Arc<CG>,
        memory: Arc<MG>,
        event_bus: Arc<EB>,
        clock: Arc<C>,
    ) -> Self {
        let registry = WorkerRegistry::new(config.max_workers);
        Self {
            id,
            config,
            election: Arc::new(RwLock::new(ElectionState::default())),
            registry: Arc::new(RwLock::new(registry)),
            directives: Arc::new(RwLock::new(HashMap::new())),
            proposals: Arc::new(RwLock::new(HashMap::new())),
            election_transport,
            worker_transport,
            consensus,
            memory,
            event_bus,
            clock,
        }
    }

    /// This queen's identifier.
    #[must_use]
    pub fn queen_id(&self) -> &NodeId {
        &self.id
    }

    /// Spawn the monitor loop: worker eviction and proposal deadlines.
    pub fn spawn_monitor_loop(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                service.run_sweep(service.clock.now_ms()).await;
            }
        })
    }

    /// One monitor pass: evict silent workers, requeue their directives,
    /// close expired proposals.
    pub async fn run_sweep(&self, now_ms: u64) {
        let evicted = self
            .registry
            .write()
            .sweep_failed(now_ms, self.config.worker_timeout_ms);
        for worker_id in &evicted {
            warn!(worker_id = %worker_id, "worker evicted after heartbeat timeout");
            self.requeue_assigned(worker_id);
            if let Err(err) = self.event_bus.publish_worker_removed(worker_id, true).await {
                debug!(error = %err, "eviction bus publish failed");
            }
        }
        if !evicted.is_empty() {
            self.retry_pending().await;
        }

        let expired: Vec<ProposalId> = {
            let proposals = self.proposals.read();
            proposals
                .values()
                .filter(|p| p.outcome == ProposalOutcome::Open && p.deadline_ms <= now_ms)
                .map(|p| p.id)
                .collect()
        };
        for id in expired {
            self.close_proposal(id).await;
        }
    }

    /// Run one election attempt for a fresh term. Returns true on win.
    async fn election_attempt(&self) -> bool {
        let term = self.election.write().start_candidacy();
        let electorate = self.registry.read().electorate_ids();
        let total = electorate.len() + 1;
        let mut granted = 1; // self-vote
        for peer in &electorate {
            match self
                .election_transport
                .request_vote(peer, &self.id, term)
                .await
            {
                Ok(true) => granted += 1,
                Ok(false) => debug!(peer = %peer, term, "vote refused"),
                Err(err) => debug!(peer = %peer, term, error = %err, "voter unreachable"),
            }
        }
        if has_majority(granted, total) && self.election.write().won(term) {
            info!(queen_id = %self.id, term, granted, electorate = total, "election won");
            metrics::record_election_won();
            if let Err(err) = self.event_bus.publish_leader_elected(&self.id, term).await {
                debug!(error = %err, "election bus publish failed");
            }
            true
        } else {
            debug!(term, granted, electorate = total, "no majority");
            false
        }
    }

    /// Randomized backoff within `election_timeout_ms/2 ..= election_timeout_ms`.
    fn election_backoff(&self) -> Duration {
        let upper = self.config.election_timeout_ms.max(2);
        let jittered = rand::thread_rng().gen_range(upper / 2..=upper);
        Duration::from_millis(jittered)
    }

    fn spawn_background_election(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            while !service.election.read().is_leader() {
                tokio::time::sleep(service.election_backoff()).await;
                service.election_attempt().await;
            }
        });
    }

    /// Return a removed/evicted worker's in-flight directives to pending.
    fn requeue_assigned(&self, worker_id: &NodeId) {
        let mut directives = self.directives.write();
        for directive in directives.values_mut() {
            if directive.status == DirectiveStatus::Dispatched
                && directive.assigned_to.as_ref() == Some(worker_id)
            {
                directive.status = DirectiveStatus::Pending;
                directive.assigned_to = None;
            }
        }
    }

    /// Try to dispatch one pending directive.
    async fn try_dispatch(&self, id: DirectiveId) -> QueenResult<()> {
        let (worker, dispatch) = {
            let mut directives = self.directives.write();
            let directive = directives
                .get_mut(&id)
                .ok_or(QueenError::UnknownDirective(id))?;
            if directive.status != DirectiveStatus::Pending {
                return Ok(());
            }
            let worker = self
                .registry
                .read()
                .select_worker(&directive.required_capabilities)?;
            directive.status = DirectiveStatus::Dispatched;
            directive.assigned_to = Some(worker.clone());
            (
                worker,
                DirectiveDispatchPayload {
                    directive: directive.clone(),
                },
            )
        };
        self.registry.write().adjust_load(&worker, 1);

        match self.worker_transport.dispatch_directive(&worker, dispatch).await {
            Ok(()) => {
                metrics::record_directive_dispatched();
                debug!(directive_id = %id, worker_id = %worker, "directive dispatched");
                Ok(())
            }
            Err(err) => {
                warn!(directive_id = %id, worker_id = %worker, error = %err,
                    "dispatch delivery failed, directive stays pending");
                let mut directives = self.directives.write();
                if let Some(directive) = directives.get_mut(&id) {
                    directive.status = DirectiveStatus::Pending;
                    directive.assigned_to = None;
                }
                self.registry.write().adjust_load(&worker, -1);
                Ok(())
            }
        }
    }

    /// Re-attempt every pending directive, highest priority first.
    async fn retry_pending(&self) {
        let mut pending: Vec<(u8, u64, DirectiveId)> = {
            let directives = self.directives.read();
            directives
                .values()
                .filter(|d| d.status == DirectiveStatus::Pending)
                .map(|d| (d.priority, d.issued_at_ms, d.id))
                .collect()
        };
        pending.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for (_, _, id) in pending {
            if let Err(QueenError::NoEligibleWorker) = self.try_dispatch(id).await {
                // No worker for this one; later directives may still match.
                continue;
            }
        }
    }

    /// Close an open proposal from its current votes and publish the
    /// outcome.
    async fn close_proposal(&self, id: ProposalId) {
        let outcome = {
            let mut proposals = self.proposals.write();
            let Some(proposal) = proposals.get_mut(&id) else {
                return;
            };
            if proposal.outcome != ProposalOutcome::Open {
                return;
            }
            let resolved = match resolve_outcome(proposal) {
                // Byzantine rounds that never committed close empty-handed.
                ProposalOutcome::Open => ProposalOutcome::NoConsensus,
                other => other,
            };
            proposal.outcome = resolved.clone();
            resolved
        };
        self.publish_proposal_outcome(id, &outcome).await;
    }

    async fn publish_proposal_outcome(&self, id: ProposalId, outcome: &ProposalOutcome) {
        metrics::record_proposal_decided();
        let accepted = match outcome {
            ProposalOutcome::Accepted(option) => Some(option.clone()),
            _ => None,
        };
        info!(proposal_id = %id, ?outcome, "proposal decided");
        if let Err(err) = self
            .event_bus
            .publish_proposal_decided(id, accepted.clone())
            .await
        {
            debug!(error = %err, "proposal bus publish failed");
        }
        let record = serde_json::json!({ "proposal_id": id.to_string(), "accepted": accepted });
        if let Err(err) = self.memory.store(format!("proposal:{id}"), record).await {
            warn!(proposal_id = %id, error = %err, "memory store failed, ignoring");
        }
    }

    /// All eligible workers have voted: resolve early.
    async fn maybe_resolve_early(&self, id: ProposalId) {
        let ready = {
            let proposals = self.proposals.read();
            let Some(proposal) = proposals.get(&id) else {
                return;
            };
            if proposal.outcome != ProposalOutcome::Open
                || proposal.consensus_type == ConsensusType::Byzantine
            {
                return;
            }
            let eligible = self.registry.read().eligible_ids();
            !eligible.is_empty() && eligible.iter().all(|w| proposal.votes.contains_key(w))
        };
        if ready {
            self.close_proposal(id).await;
        }
    }

    /// Delegate a byzantine proposal to the PBFT engine in the background.
    fn spawn_byzantine_round(&self, id: ProposalId, value: String) {
        let service = self.clone();
        tokio::spawn(async move {
            let outcome = match service.consensus.decide(id, value).await {
                Ok(committed) => ProposalOutcome::Accepted(committed),
                Err(err) => {
                    warn!(proposal_id = %id, error = %err, "byzantine round failed");
                    ProposalOutcome::NoConsensus
                }
            };
            {
                let mut proposals = service.proposals.write();
                let Some(proposal) = proposals.get_mut(&id) else {
                    return;
                };
                if proposal.outcome != ProposalOutcome::Open {
                    return;
                }
                proposal.outcome = outcome.clone();
            }
            service.publish_proposal_outcome(id, &outcome).await;
        });
    }

    fn require_leader(&self) -> QueenResult<()> {
        if self.election.read().is_leader() {
            Ok(())
        } else {
            Err(QueenError::NotLeader)
        }
    }
}

#[async_trait]
impl<ET, WT, CG, MG, EB, C> QueenApi for QueenService<ET, WT, CG, MG, EB, C>
where
    ET: ElectionTransport + 'static,
    WT: WorkerTransport + 'static,
    CG: ConsensusGateway + 'static,
    MG: MemoryGateway + 'static,
    EB: QueenEventBus + 'static,
    C: TimeSource + 'static,
{
    async fn initialize(&self) -> QueenResult<()> {
        for attempt in 1..=MAX_ELECTION_ATTEMPTS {
            if self.election_attempt().await {
                return Ok(());
            }
            if attempt < MAX_ELECTION_ATTEMPTS {
                tokio::time::sleep(self.election_backoff()).await;
            }
        }
        let term = self.election.read().term();
        warn!(queen_id = %self.id, term, "election retries exhausted");
        if self.config.enable_failover {
            self.spawn_background_election();
        }
        Err(QueenError::ElectionTimeout {
            attempts: MAX_ELECTION_ATTEMPTS,
            term,
        })
    }

    async fn state(&self) -> QueenState {
        self.election.read().state()
    }

    async fn register_worker(&self, id: NodeId, capabilities: CapabilitySet) -> QueenResult<()> {
        self.registry
            .write()
            .register(id.clone(), capabilities, self.clock.now_ms())?;
        info!(worker_id = %id, "worker registered");
        if let Err(err) = self.event_bus.publish_worker_registered(&id).await {
            debug!(error = %err, "registration bus publish failed");
        }
        // A new worker may unblock pending directives.
        self.retry_pending().await;
        Ok(())
    }

    async fn remove_worker(&self, id: &NodeId) -> QueenResult<()> {
        self.registry.write().remove(id)?;
        info!(worker_id = %id, "worker removed");
        self.requeue_assigned(id);
        if let Err(err) = self.event_bus.publish_worker_removed(id, false).await {
            debug!(error = %err, "removal bus publish failed");
        }
        self.retry_pending().await;
        Ok(())
    }

    async fn receive_heartbeat(&self, heartbeat: HeartbeatPayload) -> QueenResult<()> {
        let revived = self
            .registry
            .write()
            .record_heartbeat(&heartbeat, self.clock.now_ms())?;
        if revived {
            info!(worker_id = %heartbeat.worker_id, "worker revived by heartbeat");
            self.retry_pending().await;
        }
        Ok(())
    }

    async fn issue_directive(
        &self,
        directive_type: String,
        payload: serde_json::Value,
        required_capabilities: CapabilitySet,
        priority: u8,
    ) -> QueenResult<DirectiveId> {
        self.require_leader()?;
        let directive = Directive::new(
            directive_type,
            payload,
            required_capabilities,
            priority,
            self.clock.now_ms(),
        );
        let id = directive.id;
        self.directives.write().insert(id, directive);
        match self.try_dispatch(id).await {
            Ok(()) => {}
            Err(QueenError::NoEligibleWorker) => {
                debug!(directive_id = %id, "no eligible worker, directive stays pending");
            }
            Err(err) => return Err(err),
        }
        Ok(id)
    }

    async fn cancel_directive(&self, id: DirectiveId) -> QueenResult<()> {
        let assigned = {
            let mut directives = self.directives.write();
            let directive = directives
                .get_mut(&id)
                .ok_or(QueenError::UnknownDirective(id))?;
            if directive.status.is_terminal() {
                return Ok(());
            }
            let assigned = directive.assigned_to.take();
            directive.status = DirectiveStatus::Cancelled;
            assigned
        };
        if let Some(worker) = assigned {
            self.registry.write().adjust_load(&worker, -1);
            // Advisory: the worker may already be executing.
            if let Err(err) = self
                .worker_transport
                .cancel_directive(&worker, DirectiveCancelPayload { directive_id: id })
                .await
            {
                debug!(directive_id = %id, error = %err, "cancel notice delivery failed");
            }
        }
        if let Err(err) = self.event_bus.publish_directive_closed(id, "cancelled").await {
            debug!(error = %err, "cancellation bus publish failed");
        }
        Ok(())
    }

    async fn receive_report(&self, report: DirectiveReportPayload) -> QueenResult<()> {
        let result = &report.result;
        let (status_tag, assigned) = {
            let mut directives = self.directives.write();
            let directive = directives
                .get_mut(&result.directive_id)
                .ok_or(QueenError::UnknownDirective(result.directive_id))?;
            if directive.status.is_terminal() {
                // Duplicate or late report.
                return Ok(());
            }
            if result.success {
                directive.status = DirectiveStatus::Completed;
            } else {
                directive.status = DirectiveStatus::Failed;
                directive.failure_reason = result.error.clone();
            }
            (
                if result.success { "completed" } else { "failed" },
                directive.assigned_to.clone(),
            )
        };
        if let Some(worker) = assigned {
            self.registry.write().adjust_load(&worker, -1);
        }
        if result.success {
            metrics::record_directive_completed();
        } else {
            metrics::record_directive_failed();
        }
        if let Err(err) = self
            .event_bus
            .publish_directive_closed(result.directive_id, status_tag)
            .await
        {
            debug!(error = %err, "report bus publish failed");
        }
        let record = serde_json::json!({
            "directive_id": result.directive_id.to_string(),
            "worker_id": result.worker_id.to_string(),
            "success": result.success,
            "error": result.error,
        });
        if let Err(err) = self
            .memory
            .store(format!("directive:{}", result.directive_id), record)
            .await
        {
            warn!(directive_id = %result.directive_id, error = %err,
                "memory store failed, ignoring");
        }
        self.retry_pending().await;
        Ok(())
    }

    async fn directive_status(&self, id: DirectiveId) -> QueenResult<Directive> {
        self.directives
            .read()
            .get(&id)
            .cloned()
            .ok_or(QueenError::UnknownDirective(id))
    }

    async fn propose_decision(
        &self,
        question: String,
        options: Vec<String>,
        consensus_type: ConsensusType,
    ) -> QueenResult<ProposalId> {
        self.require_leader()?;
        let deadline = self.clock.now_ms() + self.config.consensus_timeout_ms;
        let proposal = Proposal::new(question.clone(), options.clone(), consensus_type, deadline);
        let id = proposal.id;
        self.proposals.write().insert(id, proposal);
        info!(proposal_id = %id, ?consensus_type, "proposal opened");

        if consensus_type == ConsensusType::Byzantine {
            match options.first() {
                Some(value) => self.spawn_byzantine_round(id, value.clone()),
                None => self.close_proposal(id).await,
            }
            return Ok(id);
        }

        let voters = self.registry.read().eligible_ids();
        for worker in voters {
            let request = VoteRequestPayload {
                proposal_id: id,
                question: question.clone(),
                options: options.clone(),
            };
            if let Err(err) = self.worker_transport.request_vote(&worker, request).await {
                debug!(worker_id = %worker, error = %err, "vote request delivery failed");
            }
        }
        Ok(id)
    }

    async fn receive_vote(&self, vote: VoteResponsePayload) -> QueenResult<()> {
        if !self.registry.read().contains(&vote.voter) {
            return Err(QueenError::UnknownWorker(vote.voter));
        }
        {
            let mut proposals = self.proposals.write();
            let proposal = proposals
                .get_mut(&vote.proposal_id)
                .ok_or(QueenError::UnknownProposal(vote.proposal_id))?;
            if proposal.outcome != ProposalOutcome::Open {
                return Ok(());
            }
            if !proposal.options.contains(&vote.option) {
                debug!(proposal_id = %vote.proposal_id, option = %vote.option,
                    "vote for unknown option discarded");
                return Ok(());
            }
            // A re-vote replaces, never double-counts.
            proposal.votes.insert(
                vote.voter.clone(),
                Vote {
                    voter: vote.voter.clone(),
                    option: vote.option,
                    confidence: vote.confidence,
                },
            );
        }
        self.maybe_resolve_early(vote.proposal_id).await;
        Ok(())
    }

    async fn proposal_status(&self, id: ProposalId) -> QueenResult<Proposal> {
        self.proposals
            .read()
            .get(&id)
            .cloned()
            .ok_or(QueenError::UnknownProposal(id))
    }

    async fn cancel_proposal(&self, id: ProposalId) -> QueenResult<()> {
        {
            let mut proposals = self.proposals.write();
            let proposal = proposals.get_mut(&id).ok_or(QueenError::UnknownProposal(id))?;
            if proposal.outcome != ProposalOutcome::Open {
                return Ok(());
            }
            proposal.outcome = ProposalOutcome::Cancelled;
        }
        if let Err(err) = self.event_bus.publish_proposal_decided(id, None).await {
            debug!(error = %err, "proposal cancellation bus publish failed");
        }
        Ok(())
    }

    async fn worker_snapshot(&self) -> Vec<NodeInfo> {
        self.registry.read().snapshot()
    }

    async fn swarm_metrics(&self) -> SwarmMetricsReport {
        let (workers_total, workers_active, workers_degraded, workers_failed) =
            self.registry.read().counts();
        let mut report = SwarmMetricsReport {
            workers_total,
            workers_active,
            workers_degraded,
            workers_failed,
            ..SwarmMetricsReport::default()
        };
        for directive in self.directives.read().values() {
            match directive.status {
                DirectiveStatus::Pending => report.directives_pending += 1,
                DirectiveStatus::Dispatched => report.directives_dispatched += 1,
                DirectiveStatus::Completed => report.directives_completed += 1,
                DirectiveStatus::Failed | DirectiveStatus::Cancelled => {
                    report.directives_failed += 1
                }
            }
        }
        for proposal in self.proposals.read().values() {
            match proposal.outcome {
                ProposalOutcome::Open => report.proposals_open += 1,
                ProposalOutcome::Accepted(_) => report.proposals_accepted += 1,
                ProposalOutcome::NoConsensus | ProposalOutcome::Cancelled => {
                    report.proposals_no_consensus += 1
                }
            }
        }
        report
    }
}
