//! Consensus service: drives PBFT rounds over the outbound ports.
//!
//! Round state lives behind a `parking_lot` lock that is never held across
//! an await. Every inbound message mutates the state machine under the
//! lock, collects the resulting side effects (broadcasts, bus events,
//! waiter wakeups) and performs them after the lock is released.

use crate::domain::{
    digest_value, ConsensusConfig, ConsensusDecision, ConsensusError, ConsensusResult,
    ConsensusRound, RoundPhase, VoteOutcome,
};
use crate::metrics;
use crate::ports::{
    ConsensusApi, ConsensusEventBus, MembershipProvider, PeerTransport, ReplicaVotePolicy,
    TimeSource,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::ipc::PbftMessage;
use shared_types::{NodeId, RoundId, ValueDigest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};


/// Side effect produced while the round lock was held.
enum Effect {
    Broadcast(PbftMessage),
    Committed(ConsensusDecision),
    Failed(RoundId, String),
    ViewChanged(RoundId, u64, NodeId),
}

/// One replica of the PBFT engine.
pub struct ConsensusService<T, M, E, P, C> {
    node_id: NodeId,
    config: ConsensusConfig,
    transport: Arc<T>,
    membership: Arc<M>,
    event_bus: Arc<E>,
    vote_policy: Arc<P>,
    clock: Arc<C>,
    rounds: RwLock<HashMap<RoundId, ConsensusRound>>,
    waiters: Mutex<HashMap<RoundId, Arc<Notify>>>,
}

impl<T, M, E, P, C> ConsensusService<T, M, E, P, C>
where
    T: PeerTransport + 'static,
    M: MembershipProvider + 'static,
    E: ConsensusEventBus + 'static,
    P: ReplicaVotePolicy + 'static,
    C: TimeSource + 'static,
{
    pub fn new(
        node_id: NodeId,
        config: ConsensusConfig,
        transport: Arc<T>,
        membership: Arc<M>,
        event_bus: Arc<E>,
        vote_policy: Arc<P>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            node_id,
            config,
            transport,
            membership,
            event_bus,
            vote_policy,
            clock,
            rounds: RwLock::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// This replica's identifier.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Spawn the background loop that sweeps stalled rounds into view
    /// change. Returns the task handle so the runtime can abort it on
    /// shutdown.
    pub fn spawn_timeout_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                service.check_timeouts(service.clock.now_ms()).await;
            }
        })
    }

    /// Sweep every live round: a round silent past the view-change window
    /// gets this replica's view-change vote, or fails terminally once the
    /// view-change budget is spent.
    pub async fn check_timeouts(&self, now_ms: u64) {
        let mut effects = Vec::new();
        {
            let mut rounds = self.rounds.write();
            for round in rounds.values_mut() {
                if round.phase.is_terminal() {
                    continue;
                }
                if now_ms.saturating_sub(round.last_progress_ms)
                    < self.config.view_change_timeout_ms
                {
                    continue;
                }
                if round.view_changes >= self.config.max_view_changes {
                    warn!(round_id = %round.round_id, view = round.view,
                        "view-change budget exhausted, failing round");
                    round.fail(now_ms);
                    effects.push(Effect::Failed(
                        round.round_id,
                        "view-change budget exhausted".to_owned(),
                    ));
                    continue;
                }
                let new_view = round.view + 1;
                if round.mark_local_view_vote(new_view) {
                    debug!(round_id = %round.round_id, new_view,
                        "round stalled, voting for view change");
                    effects.push(Effect::Broadcast(PbftMessage::ViewChange {
                        round_id: round.round_id,
                        new_view,
                        sender: self.node_id.clone(),
                    }));
                }
            }
        }
        self.apply_effects(effects).await;
    }

    fn waiter(&self, round_id: RoundId) -> Arc<Notify> {
        Arc::clone(
            self.waiters
                .lock()
                .entry(round_id)
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    async fn apply_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(message) => {
                    if let Err(err) = self.transport.broadcast(message).await {
                        warn!(error = %err, "broadcast failed");
                    }
                }
                Effect::Committed(decision) => {
                    info!(round_id = %decision.round_id, view = decision.view,
                        "round committed");
                    metrics::record_round_committed();
                    if let Err(err) = self.event_bus.publish_round_committed(&decision).await {
                        warn!(error = %err, "failed to publish round committed");
                    }
                    self.waiter(decision.round_id).notify_waiters();
                }
                Effect::Failed(round_id, reason) => {
                    metrics::record_round_failed();
                    if let Err(err) = self.event_bus.publish_round_failed(round_id, &reason).await
                    {
                        warn!(error = %err, "failed to publish round failed");
                    }
                    self.waiter(round_id).notify_waiters();
                }
                Effect::ViewChanged(round_id, new_view, new_primary) => {
                    metrics::record_view_change();
                    if let Err(err) = self
                        .event_bus
                        .publish_view_changed(round_id, new_view, &new_primary)
                        .await
                    {
                        warn!(error = %err, "failed to publish view changed");
                    }
                }
            }
        }
    }

    /// Make sure a round exists, snapshotting membership on first sight.
    /// Returns false when membership is below `3f+1` and the round cannot
    /// be opened.
    async fn ensure_round(&self, round_id: RoundId) -> bool {
        if self.rounds.read().contains_key(&round_id) {
            return true;
        }
        let members = self.membership.current_members().await;
        let required = self.config.required_nodes();
        if members.len() < required {
            warn!(round_id = %round_id, actual = members.len(), required,
                "ignoring round, insufficient membership");
            return false;
        }
        let now = self.clock.now_ms();
        let f = self.config.fault_tolerance;
        self.rounds
            .write()
            .entry(round_id)
            .or_insert_with(|| ConsensusRound::new(round_id, members, f, now));
        true
    }

    /// The primary's announcement for the round's pending value, if this
    /// replica currently holds that role.
    fn pre_prepare_if_primary(&self, round: &ConsensusRound) -> Option<PbftMessage> {
        if round.phase != RoundPhase::PrePrepare || round.primary() != &self.node_id {
            return None;
        }
        let value = round.value.clone()?;
        let digest = digest_value(&value);
        Some(PbftMessage::PrePrepare {
            round_id: round.round_id,
            view: round.view,
            digest,
            value,
            sender: self.node_id.clone(),
        })
    }

    fn on_request(&self, round_id: RoundId, value: String, now_ms: u64) -> Vec<Effect> {
        let mut rounds = self.rounds.write();
        let Some(round) = rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        round.record_request(value, now_ms);
        self.pre_prepare_if_primary(round)
            .map(Effect::Broadcast)
            .into_iter()
            .collect()
    }

    fn on_pre_prepare(
        &self,
        round_id: RoundId,
        sender: &NodeId,
        view: u64,
        digest: ValueDigest,
        value: &str,
        now_ms: u64,
    ) -> Vec<Effect> {
        let mut rounds = self.rounds.write();
        let Some(round) = rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        if round.record_pre_prepare(sender, view, digest, value, now_ms)
            != VoteOutcome::QuorumReached
        {
            return Vec::new();
        }
        if !self.vote_policy.accepts(value, &digest) {
            debug!(round_id = %round_id, "vote policy rejected value, staying silent");
            return Vec::new();
        }
        vec![Effect::Broadcast(PbftMessage::Prepare {
            round_id,
            view,
            digest,
            sender: self.node_id.clone(),
        })]
    }

    fn on_prepare(
        &self,
        round_id: RoundId,
        voter: &NodeId,
        view: u64,
        digest: ValueDigest,
        now_ms: u64,
    ) -> Vec<Effect> {
        let mut rounds = self.rounds.write();
        let Some(round) = rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        if round.record_prepare(voter, view, digest, now_ms) != VoteOutcome::QuorumReached {
            return Vec::new();
        }
        vec![Effect::Broadcast(PbftMessage::Commit {
            round_id,
            view,
            digest,
            sender: self.node_id.clone(),
        })]
    }

    fn on_commit(
        &self,
        round_id: RoundId,
        voter: &NodeId,
        view: u64,
        digest: ValueDigest,
        now_ms: u64,
    ) -> Vec<Effect> {
        let mut rounds = self.rounds.write();
        let Some(round) = rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        if round.record_commit(voter, view, digest, now_ms) != VoteOutcome::QuorumReached {
            return Vec::new();
        }
        round
            .decision()
            .map(Effect::Committed)
            .into_iter()
            .collect()
    }

    fn on_view_change(&self, round_id: RoundId, voter: &NodeId, new_view: u64) -> Vec<Effect> {
        let now_ms = self.clock.now_ms();
        let mut rounds = self.rounds.write();
        let Some(round) = rounds.get_mut(&round_id) else {
            return Vec::new();
        };
        if round.record_view_change(voter, new_view) != VoteOutcome::QuorumReached {
            return Vec::new();
        }
        if round.view_changes >= self.config.max_view_changes {
            round.fail(now_ms);
            return vec![Effect::Failed(
                round_id,
                "view-change budget exhausted".to_owned(),
            )];
        }
        round.advance_view(new_view, now_ms);
        let new_primary = round.primary().clone();
        info!(round_id = %round_id, new_view, new_primary = %new_primary, "view changed");
        let mut effects = vec![Effect::ViewChanged(round_id, new_view, new_primary)];
        // The new primary re-announces the pending value.
        if let Some(message) = self.pre_prepare_if_primary(round) {
            effects.push(Effect::Broadcast(message));
        }
        effects
    }
}

#[async_trait]
impl<T, M, E, P, C> ConsensusApi for ConsensusService<T, M, E, P, C>
where
    T: PeerTransport + 'static,
    M: MembershipProvider + 'static,
    E: ConsensusEventBus + 'static,
    P: ReplicaVotePolicy + 'static,
    C: TimeSource + 'static,
{
    async fn start_round(&self, value: String) -> ConsensusResult<RoundId> {
        let members = self.membership.current_members().await;
        let required = self.config.required_nodes();
        if members.len() < required {
            return Err(ConsensusError::InsufficientNodes {
                fault_tolerance: self.config.fault_tolerance,
                required,
                actual: members.len(),
            });
        }

        let round_id = RoundId::new();
        let now = self.clock.now_ms();
        {
            let mut round =
                ConsensusRound::new(round_id, members, self.config.fault_tolerance, now);
            round.record_request(value.clone(), now);
            self.rounds.write().insert(round_id, round);
        }
        info!(round_id = %round_id, "round opened");
        metrics::record_round_started();

        self.transport
            .broadcast(PbftMessage::Request { round_id, value })
            .await
            .map_err(ConsensusError::Transport)?;
        Ok(round_id)
    }

    async fn handle_message(&self, message: PbftMessage) -> ConsensusResult<()> {
        let round_id = message.round_id();
        // Only a request or pre-prepare may open a round on this replica;
        // votes for rounds we have never seen are noise.
        match &message {
            PbftMessage::Request { .. } | PbftMessage::PrePrepare { .. } => {
                if !self.ensure_round(round_id).await {
                    return Ok(());
                }
            }
            _ => {}
        }
        let now = self.clock.now_ms();
        let effects = match message {
            PbftMessage::Request { round_id, value } => self.on_request(round_id, value, now),
            PbftMessage::PrePrepare {
                round_id,
                view,
                digest,
                value,
                sender,
            } => self.on_pre_prepare(round_id, &sender, view, digest, &value, now),
            PbftMessage::Prepare {
                round_id,
                view,
                digest,
                sender,
            } => self.on_prepare(round_id, &sender, view, digest, now),
            PbftMessage::Commit {
                round_id,
                view,
                digest,
                sender,
            } => self.on_commit(round_id, &sender, view, digest, now),
            PbftMessage::ViewChange {
                round_id,
                new_view,
                sender,
            } => self.on_view_change(round_id, &sender, new_view),
        };
        self.apply_effects(effects).await;
        Ok(())
    }

    async fn await_consensus(
        &self,
        round_id: RoundId,
        timeout_ms: u64,
    ) -> ConsensusResult<ConsensusDecision> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        let notify = self.waiter(round_id);
        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let rounds = self.rounds.read();
                let round = rounds
                    .get(&round_id)
                    .ok_or(ConsensusError::UnknownRound(round_id))?;
                match round.phase {
                    RoundPhase::Committed => {
                        if let Some(decision) = round.decision() {
                            return Ok(decision);
                        }
                    }
                    RoundPhase::Failed => return Err(ConsensusError::ConsensusTimeout(round_id)),
                    _ => {}
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let rounds = self.rounds.read();
                if let Some(decision) = rounds.get(&round_id).and_then(ConsensusRound::decision) {
                    return Ok(decision);
                }
                return Err(ConsensusError::ConsensusTimeout(round_id));
            }
        }
    }

    async fn round_phase(&self, round_id: RoundId) -> ConsensusResult<RoundPhase> {
        self.rounds
            .read()
            .get(&round_id)
            .map(|round| round.phase)
            .ok_or(ConsensusError::UnknownRound(round_id))
    }
}
