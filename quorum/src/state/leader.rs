use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::offset::LogOffset;
use crate::offset::LogOffsetMetadata;
use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;
use crate::version::KRaftVersion;
use crate::voters::VoterSet;

/// Sink for the records a leader appends during its epoch. Owned by the
/// leader state and closed exactly once when the leadership ends.
pub trait BatchAccumulator: Send + std::fmt::Debug {
    /// Flush and release buffered batches.
    fn close(&mut self) -> io::Result<()>;
}

/// The elected leader of the current epoch.
///
/// The high watermark starts out unknown: it is published only once a
/// majority of voters have acknowledged an offset at or after
/// `epoch_start_offset`, and from then on never retreats. Until that point
/// the previous leader's watermark must not be re-advertised, which is what
/// keeps the published watermark monotonic across leader changes.
#[derive(Debug)]
pub struct LeaderState {
    epoch: Epoch,
    local_key: ReplicaKey,
    epoch_start_offset: LogOffset,
    voters: VoterSet,
    voters_offset: Option<LogOffset>,
    kraft_version: KRaftVersion,
    granting_voters: BTreeSet<ReplicaId>,
    local_listeners: Endpoints,
    accumulator: Option<Box<dyn BatchAccumulator>>,
    acked: BTreeMap<ReplicaId, LogOffset>,
    high_watermark: Option<LogOffsetMetadata>,
}

impl LeaderState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        epoch: Epoch,
        local_key: ReplicaKey,
        epoch_start_offset: LogOffset,
        voters: VoterSet,
        voters_offset: Option<LogOffset>,
        kraft_version: KRaftVersion,
        granting_voters: BTreeSet<ReplicaId>,
        local_listeners: Endpoints,
        accumulator: Box<dyn BatchAccumulator>,
    ) -> Self {
        Self {
            epoch,
            local_key,
            epoch_start_offset,
            voters,
            voters_offset,
            kraft_version,
            granting_voters,
            local_listeners,
            accumulator: Some(accumulator),
            acked: BTreeMap::new(),
            high_watermark: None,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn local_id(&self) -> ReplicaId {
        self.local_key.id
    }

    pub fn local_key(&self) -> &ReplicaKey {
        &self.local_key
    }

    pub fn epoch_start_offset(&self) -> LogOffset {
        self.epoch_start_offset
    }

    pub fn voters(&self) -> &VoterSet {
        &self.voters
    }

    pub fn voters_offset(&self) -> Option<LogOffset> {
        self.voters_offset
    }

    pub fn kraft_version(&self) -> KRaftVersion {
        self.kraft_version
    }

    /// The voters that granted this leader its epoch.
    pub fn granting_voters(&self) -> &BTreeSet<ReplicaId> {
        &self.granting_voters
    }

    pub fn local_listeners(&self) -> &Endpoints {
        &self.local_listeners
    }

    pub fn accumulator_mut(&mut self) -> Option<&mut (dyn BatchAccumulator + 'static)> {
        self.accumulator.as_deref_mut()
    }

    pub fn election(&self) -> ElectionState {
        ElectionState::with_elected_leader(self.epoch, self.local_key.id, self.voters.ids())
    }

    /// Records the log end offset a voter (the local replica included) has
    /// acknowledged. Returns whether the high watermark advanced.
    pub fn update_replica_offset(&mut self, id: ReplicaId, offset: LogOffset) -> bool {
        if !self.voters.contains_id(id) {
            tracing::trace!(replica = id, offset, "ignoring acknowledgement from a non-voter");
            return false;
        }

        let acked = self.acked.entry(id).or_insert(offset);
        if offset > *acked {
            *acked = offset;
        }
        self.maybe_advance_high_watermark()
    }

    fn maybe_advance_high_watermark(&mut self) -> bool {
        let majority = self.voters.len() / 2 + 1;

        let mut acked: Vec<LogOffset> = self
            .voters
            .ids()
            .into_iter()
            .filter_map(|id| self.acked.get(&id).copied())
            .collect();
        if acked.len() < majority {
            return false;
        }
        acked.sort_unstable_by(|a, b| b.cmp(a));

        let replicated = acked[majority - 1];
        if replicated < self.epoch_start_offset {
            return false;
        }

        let candidate = LogOffsetMetadata::new(replicated);
        match self.high_watermark {
            Some(current) if candidate <= current => false,
            _ => {
                tracing::debug!(
                    epoch = self.epoch,
                    high_watermark = %candidate,
                    "leader high watermark advanced"
                );
                self.high_watermark = Some(candidate);
                true
            }
        }
    }

    pub fn high_watermark(&self) -> Option<LogOffsetMetadata> {
        self.high_watermark
    }

    /// Closes the accumulator. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        match self.accumulator.take() {
            Some(mut accumulator) => accumulator.close(),
            None => Ok(()),
        }
    }
}
