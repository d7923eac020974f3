use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;
use crate::time::Timer;

/// An ex-leader standing down within its own epoch.
///
/// Still the leader of record for the epoch, so it must not vote for anyone
/// else in it, but it no longer accepts appends. Soft state: the preferred
/// successors live only in memory, and crash recovery reconstructs Resigned
/// from the durable leader record alone.
#[derive(Debug)]
pub struct ResignedState {
    epoch: Epoch,
    local_id: ReplicaId,
    voters: BTreeSet<ReplicaId>,
    preferred_successors: Vec<ReplicaKey>,
    local_listeners: Endpoints,
    timer: Timer,
}

impl ResignedState {
    pub fn new(
        now: Instant,
        epoch: Epoch,
        local_id: ReplicaId,
        voters: BTreeSet<ReplicaId>,
        preferred_successors: Vec<ReplicaKey>,
        local_listeners: Endpoints,
        election_timeout: Duration,
    ) -> Self {
        Self {
            epoch,
            local_id,
            voters,
            preferred_successors,
            local_listeners,
            timer: Timer::new(now, election_timeout),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn local_id(&self) -> ReplicaId {
        self.local_id
    }

    /// Successors to nudge first, in preference order.
    pub fn preferred_successors(&self) -> &[ReplicaKey] {
        &self.preferred_successors
    }

    pub fn local_listeners(&self) -> &Endpoints {
        &self.local_listeners
    }

    pub fn election(&self) -> ElectionState {
        ElectionState::with_elected_leader(self.epoch, self.local_id, self.voters.clone())
    }

    pub fn has_election_timeout_expired(&self, now: Instant) -> bool {
        self.timer.expired(now)
    }

    pub fn remaining_election_time(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }
}
