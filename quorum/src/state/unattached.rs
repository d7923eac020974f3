use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::offset::LogOffsetMetadata;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;
use crate::time::Timer;

/// A replica that is not following anyone and not campaigning.
///
/// Unattached covers three situations that share mechanics: nothing known
/// about the epoch, a vote already cast in the epoch (`voted_key`), and a
/// leader known but unreachable (`leader_id` without endpoints). At most one
/// of `leader_id` and `voted_key` is set.
#[derive(Debug)]
pub struct UnattachedState {
    epoch: Epoch,
    leader_id: Option<ReplicaId>,
    voted_key: Option<ReplicaKey>,
    voters: BTreeSet<ReplicaId>,
    high_watermark: Option<LogOffsetMetadata>,
    timer: Timer,
}

impl UnattachedState {
    pub fn new(
        now: Instant,
        epoch: Epoch,
        leader_id: Option<ReplicaId>,
        voted_key: Option<ReplicaKey>,
        voters: BTreeSet<ReplicaId>,
        high_watermark: Option<LogOffsetMetadata>,
        election_timeout: Duration,
    ) -> Self {
        debug_assert!(
            leader_id.is_none() || voted_key.is_none(),
            "a leader and a vote cannot coexist within one epoch"
        );
        Self {
            epoch,
            leader_id,
            voted_key,
            voters,
            high_watermark,
            timer: Timer::new(now, election_timeout),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn leader_id(&self) -> Option<ReplicaId> {
        self.leader_id
    }

    pub fn voted_key(&self) -> Option<&ReplicaKey> {
        self.voted_key.as_ref()
    }

    pub fn has_voted(&self) -> bool {
        self.voted_key.is_some()
    }

    pub fn election(&self) -> ElectionState {
        if let Some(leader_id) = self.leader_id {
            ElectionState::with_elected_leader(self.epoch, leader_id, self.voters.clone())
        } else if let Some(voted_key) = self.voted_key {
            ElectionState::with_voted_candidate(self.epoch, voted_key, self.voters.clone())
        } else {
            ElectionState::with_unknown_leader(self.epoch, self.voters.clone())
        }
    }

    pub fn can_grant_vote(&self, candidate_key: &ReplicaKey, log_is_up_to_date: bool) -> bool {
        if let Some(voted) = &self.voted_key {
            // Re-grant only the vote already cast.
            return voted == candidate_key;
        }
        if self.leader_id.is_some() {
            return false;
        }
        log_is_up_to_date
    }

    pub fn election_timeout(&self) -> Duration {
        self.timer.timeout()
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
