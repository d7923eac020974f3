use std::mem;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::RngCore;
use tokio::sync::watch;
use uuid::Uuid;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::election::LeaderAndEpoch;
use crate::error::QuorumError;
use crate::offset::LogOffset;
use crate::offset::LogOffsetMetadata;
use crate::offset::OffsetAndEpoch;
use crate::partition::PartitionStateView;
use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;
use crate::state::BatchAccumulator;
use crate::state::CandidateState;
use crate::state::FollowerState;
use crate::state::LeaderState;
use crate::state::ResignedState;
use crate::state::Role;
use crate::state::RoleState;
use crate::state::UnattachedState;
use crate::store::QuorumStateStore;
use crate::time::Clock;
use crate::version::KRaftVersion;

/// Static identity and timing configuration of the local replica.
#[derive(Clone, Debug)]
pub struct QuorumConfig {
    /// Absent for replicas that participate as observers only.
    pub local_id: Option<ReplicaId>,

    /// Distinguishes this storage incarnation from any prior one running
    /// under the same id.
    pub local_directory_id: Uuid,

    /// Endpoints advertised while leading.
    pub local_listeners: Endpoints,

    /// Protocol versions this replica can speak.
    pub supported_kraft_versions: RangeInclusive<KRaftVersion>,

    /// Base election timeout. Zero makes every drawn timeout zero, which
    /// tests use to force immediate elections.
    pub election_timeout: Duration,

    /// How long a follower waits on a silent leader before giving up on it.
    pub fetch_timeout: Duration,
}

impl QuorumConfig {
    pub fn local_key(&self) -> Option<ReplicaKey> {
        self.local_id.map(|id| ReplicaKey::new(id, self.local_directory_id))
    }
}

/// Immutable snapshot of the active role, published through a watch channel
/// on every transition for reporter threads.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct QuorumMetrics {
    pub role: Role,
    pub leader_and_epoch: LeaderAndEpoch,
    pub high_watermark: Option<LogOffsetMetadata>,
}

/// The quorum state manager: owns the replica's role in its epoch, enforces
/// the legal transitions between roles, and persists the election decisions
/// a replica must never forget.
///
/// Exactly one role state is active at any time and the manager is its only
/// writer; the single Raft event-loop thread drives all mutations. A role
/// change that must survive a crash (advancing the epoch, voting, learning
/// or becoming a leader) is written to the store before it becomes visible.
/// Entering Resigned is the one soft transition: the durable epoch record
/// plus the initialization rules reconstruct it after a restart.
pub struct QuorumState<S, P>
where
    S: QuorumStateStore,
    P: PartitionStateView,
{
    config: QuorumConfig,
    store: S,
    partition: Arc<P>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
    state: RoleState,
    metrics_tx: watch::Sender<QuorumMetrics>,
}

impl<S, P> std::fmt::Debug for QuorumState<S, P>
where
    S: QuorumStateStore,
    P: PartitionStateView,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumState")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("metrics", &*self.metrics_tx.borrow())
            .finish()
    }
}

impl<S, P> QuorumState<S, P>
where
    S: QuorumStateStore,
    P: PartitionStateView,
{
    /// Reads the stored election state, reconciles it against the end of the
    /// local log, and installs the initial role.
    ///
    /// The first matching rule wins:
    /// 1. a stored vote without a local id is unrecoverable;
    /// 2. a log epoch newer than the store means the quorum record missed a
    ///    flush before a crash; restart unattached at the log's epoch;
    /// 3. a stored leadership of our own resumes as Resigned, so the
    ///    restarted ex-leader neither votes in its old epoch nor re-emits
    ///    records an unflushed tail may already have assigned;
    /// 4. a stored vote for ourselves resumes the candidacy;
    /// 5. any other stored vote is remembered unattached;
    /// 6. a stored leader is followed if its endpoints are still known,
    ///    otherwise remembered unattached;
    /// 7. nothing stored: start unattached at the stored epoch.
    pub fn initialize(
        config: QuorumConfig,
        mut store: S,
        partition: Arc<P>,
        clock: Arc<dyn Clock>,
        mut rng: Box<dyn RngCore + Send>,
        log_end: OffsetAndEpoch,
    ) -> Result<Self, QuorumError> {
        let active_version = partition.last_kraft_version();
        if !config.supported_kraft_versions.contains(&active_version) {
            return Err(QuorumError::UnsupportedVersion {
                active: active_version,
                min: *config.supported_kraft_versions.start(),
                max: *config.supported_kraft_versions.end(),
            });
        }

        let voters = partition.last_voter_set();
        let election = match store.read()? {
            Some(election) => election,
            None => ElectionState::with_unknown_leader(0, voters.ids()),
        };

        if election.has_voted() && config.local_id.is_none() {
            return Err(QuorumError::InvalidPersistedState(format!(
                "found a vote in epoch {} but no local id is configured",
                election.epoch
            )));
        }

        let now = clock.now();
        let local_key = config.local_key();

        let initial = if election.epoch < log_end.epoch {
            // The log saw a higher epoch than the quorum store recorded.
            tracing::warn!(
                stored_epoch = election.epoch,
                log_end_epoch = log_end.epoch,
                store = %store.path().display(),
                "log end epoch is ahead of the stored election state; discarding the stale record"
            );
            RoleState::Unattached(UnattachedState::new(
                now,
                log_end.epoch,
                None,
                None,
                voters.ids(),
                None,
                random_election_timeout(rng.as_mut(), config.election_timeout),
            ))
        } else if let Some(local_id) = config.local_id.filter(|id| election.is_leader(*id)) {
            RoleState::Resigned(ResignedState::new(
                now,
                election.epoch,
                local_id,
                voters.ids(),
                Vec::new(),
                config.local_listeners.clone(),
                random_election_timeout(rng.as_mut(), config.election_timeout),
            ))
        } else if let Some(local_key) = local_key.filter(|key| election.is_voted_candidate(key)) {
            RoleState::Candidate(CandidateState::new(
                now,
                election.epoch,
                local_key,
                voters.clone(),
                1,
                None,
                random_election_timeout(rng.as_mut(), config.election_timeout),
            ))
        } else if election.has_voted() {
            RoleState::Unattached(UnattachedState::new(
                now,
                election.epoch,
                None,
                election.voted_key,
                voters.ids(),
                None,
                random_election_timeout(rng.as_mut(), config.election_timeout),
            ))
        } else if let Some(leader_id) = election.leader_id {
            let endpoints = voters.listeners(leader_id);
            if endpoints.is_empty() {
                tracing::info!(
                    leader = leader_id,
                    epoch = election.epoch,
                    "stored leader has no known endpoints; starting unattached"
                );
                RoleState::Unattached(UnattachedState::new(
                    now,
                    election.epoch,
                    Some(leader_id),
                    None,
                    voters.ids(),
                    None,
                    random_election_timeout(rng.as_mut(), config.election_timeout),
                ))
            } else {
                RoleState::Follower(FollowerState::new(
                    now,
                    election.epoch,
                    leader_id,
                    endpoints,
                    voters.ids(),
                    None,
                    config.fetch_timeout,
                ))
            }
        } else {
            RoleState::Unattached(UnattachedState::new(
                now,
                election.epoch,
                None,
                None,
                voters.ids(),
                None,
                random_election_timeout(rng.as_mut(), config.election_timeout),
            ))
        };

        store.write(&initial.election(), active_version)?;

        tracing::info!(state = %initial, "initialized quorum state");

        let metrics = QuorumMetrics {
            role: initial.role(),
            leader_and_epoch: LeaderAndEpoch::new(initial.leader_id(), initial.epoch()),
            high_watermark: initial.high_watermark(),
        };
        let (metrics_tx, _) = watch::channel(metrics);

        Ok(Self {
            config,
            store,
            partition,
            clock,
            rng,
            state: initial,
            metrics_tx,
        })
    }

    // --- transitions ---

    /// Steps an active leader down within its epoch. Soft: nothing new is
    /// persisted, the durable leader record of this epoch already implies
    /// everything recovery needs.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_resigned(
        &mut self,
        preferred_successors: Vec<ReplicaKey>,
    ) -> Result<(), QuorumError> {
        let (epoch, local_id, voter_ids) = match &self.state {
            RoleState::Leader(leader) => (leader.epoch(), leader.local_id(), leader.voters().ids()),
            other => {
                return Err(QuorumError::IllegalTransition {
                    from: other.role(),
                    to: Role::Resigned,
                    epoch: other.epoch(),
                    reason: "only an active leader can resign",
                });
            }
        };

        let timeout = self.random_election_timeout();
        let resigned = ResignedState::new(
            self.clock.now(),
            epoch,
            local_id,
            voter_ids,
            preferred_successors,
            self.config.local_listeners.clone(),
            timeout,
        );
        self.memory_transition(RoleState::Resigned(resigned));
        Ok(())
    }

    /// Abandons the current epoch for a strictly newer one without learning
    /// a leader or casting a vote.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_unattached(&mut self, new_epoch: Epoch) -> Result<(), QuorumError> {
        let current = self.state.epoch();
        if new_epoch <= current {
            return Err(QuorumError::StaleEpoch {
                to: Role::Unattached,
                requested: new_epoch,
                current,
            });
        }

        let now = self.clock.now();
        let inherited = match &self.state {
            // A same-replica epoch bump must not extend the running
            // election clock.
            RoleState::Candidate(s) => Some(s.remaining_election_time(now)),
            RoleState::Unattached(s) => Some(s.remaining_election_time(now)),
            _ => None,
        };
        let timeout = if self.is_observer() {
            // Observers never self-nominate.
            Duration::MAX
        } else {
            match inherited {
                Some(remaining) => remaining,
                None => self.random_election_timeout(),
            }
        };

        let state = UnattachedState::new(
            now,
            new_epoch,
            None,
            None,
            self.partition.last_voter_set().ids(),
            self.state.high_watermark(),
            timeout,
        );
        self.durable_transition(RoleState::Unattached(state))
    }

    /// Casts this replica's one vote of the epoch for the given candidate.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_unattached_voted(
        &mut self,
        epoch: Epoch,
        candidate_key: ReplicaKey,
    ) -> Result<(), QuorumError> {
        let local_id = self.config.local_id.ok_or(QuorumError::MissingLocalId {
            action: "vote for a candidate",
        })?;
        if candidate_key.id == local_id {
            return Err(QuorumError::IllegalTransition {
                from: self.state.role(),
                to: Role::Unattached,
                epoch,
                reason: "a replica votes for itself by becoming a candidate, not by granting a vote",
            });
        }

        let current = self.state.epoch();
        if epoch < current {
            return Err(QuorumError::StaleEpoch {
                to: Role::Unattached,
                requested: epoch,
                current,
            });
        }
        if epoch == current && !self.is_unattached_not_voted() {
            return Err(QuorumError::IllegalTransition {
                from: self.state.role(),
                to: Role::Unattached,
                epoch,
                reason: "only an unattached replica that has not voted may vote at its current epoch",
            });
        }

        let timeout = self.random_election_timeout();
        let state = UnattachedState::new(
            self.clock.now(),
            epoch,
            None,
            Some(candidate_key),
            self.partition.last_voter_set().ids(),
            self.state.high_watermark(),
            timeout,
        );
        self.durable_transition(RoleState::Unattached(state))
    }

    /// Starts following the given leader.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_follower(
        &mut self,
        epoch: Epoch,
        leader_id: ReplicaId,
        endpoints: Endpoints,
    ) -> Result<(), QuorumError> {
        if endpoints.is_empty() {
            return Err(QuorumError::IllegalTransition {
                from: self.state.role(),
                to: Role::Follower,
                epoch,
                reason: "leader endpoints must be non-empty",
            });
        }
        if Some(leader_id) == self.config.local_id {
            return Err(QuorumError::IllegalTransition {
                from: self.state.role(),
                to: Role::Follower,
                epoch,
                reason: "a replica cannot follow itself",
            });
        }

        let current = self.state.epoch();
        if epoch < current {
            return Err(QuorumError::StaleEpoch {
                to: Role::Follower,
                requested: epoch,
                current,
            });
        }
        if epoch == current {
            match &self.state {
                RoleState::Leader(_) => {
                    return Err(QuorumError::IllegalTransition {
                        from: Role::Leader,
                        to: Role::Follower,
                        epoch,
                        reason: "the leader of an epoch cannot follow within it",
                    });
                }
                // Endpoint sets may only grow within an epoch.
                RoleState::Follower(follower)
                    if follower.leader_endpoints().len() >= endpoints.len() =>
                {
                    return Err(QuorumError::IllegalTransition {
                        from: Role::Follower,
                        to: Role::Follower,
                        epoch,
                        reason: "a follower may only be replaced by a larger endpoint set",
                    });
                }
                _ => {}
            }
        }

        let state = FollowerState::new(
            self.clock.now(),
            epoch,
            leader_id,
            endpoints,
            self.partition.last_voter_set().ids(),
            self.state.high_watermark(),
            self.config.fetch_timeout,
        );
        self.durable_transition(RoleState::Follower(state))
    }

    /// Starts an election for the next epoch.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_candidate(&mut self) -> Result<(), QuorumError> {
        let local_key = self.local_replica_key().ok_or(QuorumError::MissingLocalId {
            action: "become a candidate",
        })?;
        if !self.is_voter() {
            return Err(QuorumError::NotVoter {
                action: "become a candidate",
            });
        }
        if self.is_leader() {
            return Err(QuorumError::IllegalTransition {
                from: Role::Leader,
                to: Role::Candidate,
                epoch: self.state.epoch(),
                reason: "an active leader cannot start a new election",
            });
        }

        let new_epoch = self.state.epoch() + 1;
        let retries = match &self.state {
            RoleState::Candidate(candidate) => candidate.retries() + 1,
            _ => 1,
        };

        let timeout = self.random_election_timeout();
        let state = CandidateState::new(
            self.clock.now(),
            new_epoch,
            local_key,
            self.partition.last_voter_set(),
            retries,
            self.state.high_watermark(),
            timeout,
        );
        self.durable_transition(RoleState::Candidate(state))
    }

    /// Completes a won election.
    ///
    /// The new leader starts with no high watermark: the previous one may
    /// only be re-advertised once a majority acknowledges an offset at or
    /// after `epoch_start_offset`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn transition_to_leader(
        &mut self,
        epoch_start_offset: LogOffset,
        accumulator: Box<dyn BatchAccumulator>,
    ) -> Result<(), QuorumError> {
        if !self.is_voter() {
            return Err(QuorumError::NotVoter {
                action: "become leader",
            });
        }

        let (epoch, local_key, granting_voters) = match &self.state {
            RoleState::Candidate(candidate) => {
                if !candidate.is_vote_granted() {
                    return Err(QuorumError::IllegalTransition {
                        from: Role::Candidate,
                        to: Role::Leader,
                        epoch: candidate.epoch(),
                        reason: "a majority of the voter set has not granted the election",
                    });
                }
                (
                    candidate.epoch(),
                    *candidate.local_key(),
                    candidate.granting_voters().clone(),
                )
            }
            other => {
                return Err(QuorumError::IllegalTransition {
                    from: other.role(),
                    to: Role::Leader,
                    epoch: other.epoch(),
                    reason: "only a candidate that won its election can become leader",
                });
            }
        };

        let state = LeaderState::new(
            epoch,
            local_key,
            epoch_start_offset,
            self.partition.last_voter_set(),
            self.partition.last_voter_set_offset(),
            self.partition.last_kraft_version(),
            granting_voters,
            self.config.local_listeners.clone(),
            accumulator,
        );
        self.durable_transition(RoleState::Leader(state))
    }

    // --- durability ---

    fn durable_transition(&mut self, new_state: RoleState) -> Result<(), QuorumError> {
        let election = new_state.election();
        let version = self.partition.last_kraft_version();

        // Must be durable before the new state becomes observable. On
        // failure the previous state is still fully intact.
        self.store.write(&election, version)?;

        self.memory_transition(new_state);
        Ok(())
    }

    fn memory_transition(&mut self, new_state: RoleState) {
        if let Err(err) = self.state.close() {
            // The durable record is already ahead of the in-memory view;
            // there is no state this replica can safely continue in.
            panic!("failed to close the {} state: {}", self.state.role(), err);
        }

        let prev = mem::replace(&mut self.state, new_state);
        tracing::info!(from = %prev, to = %self.state, "completed state transition");
        self.publish_metrics();
    }

    fn publish_metrics(&self) {
        self.metrics_tx.send_replace(QuorumMetrics {
            role: self.state.role(),
            leader_and_epoch: self.leader_and_epoch(),
            high_watermark: self.state.high_watermark(),
        });
    }

    fn random_election_timeout(&mut self) -> Duration {
        random_election_timeout(self.rng.as_mut(), self.config.election_timeout)
    }

    // --- accessors ---

    /// Subscribes to the per-transition snapshot of the active role.
    pub fn metrics(&self) -> watch::Receiver<QuorumMetrics> {
        self.metrics_tx.subscribe()
    }

    pub fn role(&self) -> Role {
        self.state.role()
    }

    pub fn epoch(&self) -> Epoch {
        self.state.epoch()
    }

    pub fn leader_id(&self) -> Option<ReplicaId> {
        self.state.leader_id()
    }

    pub fn leader_and_epoch(&self) -> LeaderAndEpoch {
        LeaderAndEpoch::new(self.state.leader_id(), self.state.epoch())
    }

    pub fn leader_endpoints(&self) -> Endpoints {
        self.state.leader_endpoints()
    }

    pub fn high_watermark(&self) -> Option<LogOffsetMetadata> {
        self.state.high_watermark()
    }

    pub fn can_grant_vote(&self, candidate_key: &ReplicaKey, log_is_up_to_date: bool) -> bool {
        self.state.can_grant_vote(candidate_key, log_is_up_to_date)
    }

    pub fn local_id(&self) -> Option<ReplicaId> {
        self.config.local_id
    }

    pub fn local_directory_id(&self) -> Uuid {
        self.config.local_directory_id
    }

    pub fn local_replica_key(&self) -> Option<ReplicaKey> {
        self.config.local_key()
    }

    // --- predicates ---

    pub fn is_voter(&self) -> bool {
        match self.local_replica_key() {
            Some(key) => self.partition.last_voter_set().is_voter(&key),
            None => false,
        }
    }

    pub fn is_observer(&self) -> bool {
        !self.is_voter()
    }

    pub fn is_only_voter(&self) -> bool {
        match self.local_replica_key() {
            Some(key) => self.partition.last_voter_set().is_only_voter(&key),
            None => false,
        }
    }

    pub fn has_leader(&self) -> bool {
        self.state.leader_id().is_some()
    }

    pub fn has_remote_leader(&self) -> bool {
        match self.state.leader_id() {
            Some(leader_id) => Some(leader_id) != self.config.local_id,
            None => false,
        }
    }

    pub fn is_unattached(&self) -> bool {
        matches!(self.state, RoleState::Unattached(_))
    }

    pub fn is_unattached_not_voted(&self) -> bool {
        matches!(&self.state, RoleState::Unattached(s) if !s.has_voted())
    }

    pub fn is_unattached_and_voted(&self) -> bool {
        matches!(&self.state, RoleState::Unattached(s) if s.has_voted())
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self.state, RoleState::Candidate(_))
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state, RoleState::Leader(_))
    }

    pub fn is_follower(&self) -> bool {
        matches!(self.state, RoleState::Follower(_))
    }

    pub fn is_resigned(&self) -> bool {
        matches!(self.state, RoleState::Resigned(_))
    }

    // --- checked casts and optional projections ---

    pub fn unattached_state(&self) -> Result<&UnattachedState, QuorumError> {
        match &self.state {
            RoleState::Unattached(s) => Ok(s),
            other => Err(unexpected_role(Role::Unattached, other)),
        }
    }

    pub fn maybe_unattached_state(&self) -> Option<&UnattachedState> {
        match &self.state {
            RoleState::Unattached(s) => Some(s),
            _ => None,
        }
    }

    pub fn candidate_state(&self) -> Result<&CandidateState, QuorumError> {
        match &self.state {
            RoleState::Candidate(s) => Ok(s),
            other => Err(unexpected_role(Role::Candidate, other)),
        }
    }

    pub fn candidate_state_mut(&mut self) -> Result<&mut CandidateState, QuorumError> {
        match &mut self.state {
            RoleState::Candidate(s) => Ok(s),
            other => Err(unexpected_role(Role::Candidate, other)),
        }
    }

    pub fn maybe_candidate_state(&self) -> Option<&CandidateState> {
        match &self.state {
            RoleState::Candidate(s) => Some(s),
            _ => None,
        }
    }

    pub fn leader_state(&self) -> Result<&LeaderState, QuorumError> {
        match &self.state {
            RoleState::Leader(s) => Ok(s),
            other => Err(unexpected_role(Role::Leader, other)),
        }
    }

    pub fn leader_state_mut(&mut self) -> Result<&mut LeaderState, QuorumError> {
        match &mut self.state {
            RoleState::Leader(s) => Ok(s),
            other => Err(unexpected_role(Role::Leader, other)),
        }
    }

    pub fn maybe_leader_state(&self) -> Option<&LeaderState> {
        match &self.state {
            RoleState::Leader(s) => Some(s),
            _ => None,
        }
    }

    pub fn follower_state(&self) -> Result<&FollowerState, QuorumError> {
        match &self.state {
            RoleState::Follower(s) => Ok(s),
            other => Err(unexpected_role(Role::Follower, other)),
        }
    }

    pub fn follower_state_mut(&mut self) -> Result<&mut FollowerState, QuorumError> {
        match &mut self.state {
            RoleState::Follower(s) => Ok(s),
            other => Err(unexpected_role(Role::Follower, other)),
        }
    }

    pub fn maybe_follower_state(&self) -> Option<&FollowerState> {
        match &self.state {
            RoleState::Follower(s) => Some(s),
            _ => None,
        }
    }

    pub fn resigned_state(&self) -> Result<&ResignedState, QuorumError> {
        match &self.state {
            RoleState::Resigned(s) => Ok(s),
            other => Err(unexpected_role(Role::Resigned, other)),
        }
    }

    pub fn maybe_resigned_state(&self) -> Option<&ResignedState> {
        match &self.state {
            RoleState::Resigned(s) => Some(s),
            _ => None,
        }
    }
}

fn unexpected_role(expected: Role, actual: &RoleState) -> QuorumError {
    QuorumError::UnexpectedRole {
        expected,
        actual: actual.role(),
    }
}

/// Draws an election timeout in `[base, 2 * base)`; a zero base yields zero,
/// the deterministic hook tests rely on.
pub(crate) fn random_election_timeout(
    rng: &mut (dyn RngCore + Send),
    base: Duration,
) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(base_ms + rng.gen_range(0..base_ms))
}
