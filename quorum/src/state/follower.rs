use std::collections::BTreeSet;
use std::time::Duration;
use std::time::Instant;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::offset::LogOffsetMetadata;
use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::time::Timer;

/// A replica fetching from a known, reachable leader.
#[derive(Debug)]
pub struct FollowerState {
    epoch: Epoch,
    leader_id: ReplicaId,
    leader_endpoints: Endpoints,
    voters: BTreeSet<ReplicaId>,
    high_watermark: Option<LogOffsetMetadata>,
    fetch_timer: Timer,
}

impl FollowerState {
    pub fn new(
        now: Instant,
        epoch: Epoch,
        leader_id: ReplicaId,
        leader_endpoints: Endpoints,
        voters: BTreeSet<ReplicaId>,
        high_watermark: Option<LogOffsetMetadata>,
        fetch_timeout: Duration,
    ) -> Self {
        debug_assert!(!leader_endpoints.is_empty(), "a follower needs a reachable leader");
        Self {
            epoch,
            leader_id,
            leader_endpoints,
            voters,
            high_watermark,
            fetch_timer: Timer::new(now, fetch_timeout),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn leader_id(&self) -> ReplicaId {
        self.leader_id
    }

    pub fn leader_endpoints(&self) -> &Endpoints {
        &self.leader_endpoints
    }

    pub fn election(&self) -> ElectionState {
        ElectionState::with_elected_leader(self.epoch, self.leader_id, self.voters.clone())
    }

    /// Whether the leader has been silent for longer than the fetch timeout.
    pub fn has_fetch_timeout_expired(&self, now: Instant) -> bool {
        self.fetch_timer.expired(now)
    }

    /// Restarts the fetch timeout after a successful fetch.
    pub fn reset_fetch_timeout(&mut self, now: Instant) {
        self.fetch_timer.reset(now);
    }

    /// Adopts the high watermark learned from the leader. Regressions are
    /// ignored; returns whether the watermark moved.
    pub fn update_high_watermark(&mut self, high_watermark: LogOffsetMetadata) -> bool {
        match self.high_watermark {
            Some(current) if high_watermark <= current => false,
            _ => {
                self.high_watermark = Some(high_watermark);
                true
            }
        }
    }

    pub fn high_watermark(&self) -> Option<LogOffsetMetadata> {
        self.high_watermark
    }
}
