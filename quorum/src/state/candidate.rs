use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::offset::LogOffsetMetadata;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;
use crate::time::Timer;
use crate::voters::VoterSet;

/// A replica campaigning for leadership of its epoch.
///
/// The tally counts at most one decision per voter. The local replica's own
/// vote is recorded at construction; the epoch's durable record is exactly
/// that self-vote.
#[derive(Debug)]
pub struct CandidateState {
    epoch: Epoch,
    local_key: ReplicaKey,
    voters: VoterSet,
    granting: BTreeSet<ReplicaId>,
    rejecting: BTreeSet<ReplicaId>,
    retries: u32,
    high_watermark: Option<LogOffsetMetadata>,
    timer: Timer,
}

impl CandidateState {
    pub fn new(
        now: Instant,
        epoch: Epoch,
        local_key: ReplicaKey,
        voters: VoterSet,
        retries: u32,
        high_watermark: Option<LogOffsetMetadata>,
        election_timeout: Duration,
    ) -> Self {
        let mut granting = BTreeSet::new();
        granting.insert(local_key.id);

        Self {
            epoch,
            local_key,
            voters,
            granting,
            rejecting: BTreeSet::new(),
            retries,
            high_watermark,
            timer: Timer::new(now, election_timeout),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn local_key(&self) -> &ReplicaKey {
        &self.local_key
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Records a granted vote. Returns whether the vote was newly counted.
    pub fn record_granted_vote(&mut self, id: ReplicaId) -> bool {
        if !self.voters.contains_id(id) {
            tracing::warn!(voter = id, epoch = self.epoch, "ignoring vote from a non-voter");
            return false;
        }
        if self.rejecting.contains(&id) {
            tracing::warn!(
                voter = id,
                epoch = self.epoch,
                "ignoring granted vote from a voter that already rejected"
            );
            return false;
        }
        self.granting.insert(id)
    }

    /// Records a rejection. Returns whether the rejection was newly counted.
    pub fn record_rejected_vote(&mut self, id: ReplicaId) -> bool {
        if !self.voters.contains_id(id) {
            tracing::warn!(voter = id, epoch = self.epoch, "ignoring rejection from a non-voter");
            return false;
        }
        if id == self.local_key.id || self.granting.contains(&id) {
            tracing::warn!(
                voter = id,
                epoch = self.epoch,
                "ignoring rejection from a voter that already granted"
            );
            return false;
        }
        self.rejecting.insert(id)
    }

    fn majority(&self) -> usize {
        self.voters.len() / 2 + 1
    }

    /// Whether a majority of the voter set has granted this candidacy.
    pub fn is_vote_granted(&self) -> bool {
        self.granting.len() >= self.majority()
    }

    /// Whether enough voters rejected that a majority can no longer form.
    pub fn is_vote_rejected(&self) -> bool {
        self.rejecting.len() > self.voters.len() - self.majority()
    }

    /// Voters that have not answered yet.
    pub fn unrecorded_voters(&self) -> BTreeSet<ReplicaId> {
        self.voters
            .ids()
            .into_iter()
            .filter(|id| !self.granting.contains(id) && !self.rejecting.contains(id))
            .collect()
    }

    pub fn granting_voters(&self) -> &BTreeSet<ReplicaId> {
        &self.granting
    }

    pub fn election(&self) -> ElectionState {
        ElectionState::with_voted_candidate(self.epoch, self.local_key, self.voters.ids())
    }

    pub fn can_grant_vote(&self, candidate_key: &ReplicaKey) -> bool {
        // The self-vote is the only vote this epoch allows.
        *candidate_key == self.local_key
    }

    pub fn has_election_timeout_expired(&self, now: Instant) -> bool {
        self.timer.expired(now)
    }

    pub fn remaining_election_time(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }

    pub fn high_watermark(&self) -> Option<LogOffsetMetadata> {
        self.high_watermark
    }
}
