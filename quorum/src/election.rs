use std::collections::BTreeSet;
use std::fmt;

use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;

/// Leader term. Monotonically non-decreasing across the life of the
/// partition.
pub type Epoch = u32;

/// The election decision a replica must never forget across restarts.
///
/// Within one epoch `leader_id` and `voted_key` are mutually exclusive: a
/// replica either recorded a known leader or cast a vote, never both.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct ElectionState {
    pub epoch: Epoch,
    pub leader_id: Option<ReplicaId>,
    pub voted_key: Option<ReplicaKey>,

    /// Snapshot of the voter ids at the time the record was written. Kept
    /// for diagnostics only; the partition state is authoritative.
    pub voter_ids: BTreeSet<ReplicaId>,
}

impl ElectionState {
    pub fn with_elected_leader(
        epoch: Epoch,
        leader_id: ReplicaId,
        voter_ids: BTreeSet<ReplicaId>,
    ) -> Self {
        Self {
            epoch,
            leader_id: Some(leader_id),
            voted_key: None,
            voter_ids,
        }
    }

    pub fn with_voted_candidate(
        epoch: Epoch,
        voted_key: ReplicaKey,
        voter_ids: BTreeSet<ReplicaId>,
    ) -> Self {
        Self {
            epoch,
            leader_id: None,
            voted_key: Some(voted_key),
            voter_ids,
        }
    }

    pub fn with_unknown_leader(epoch: Epoch, voter_ids: BTreeSet<ReplicaId>) -> Self {
        Self {
            epoch,
            leader_id: None,
            voted_key: None,
            voter_ids,
        }
    }

    pub fn has_leader(&self) -> bool {
        self.leader_id.is_some()
    }

    pub fn is_leader(&self, id: ReplicaId) -> bool {
        self.leader_id == Some(id)
    }

    pub fn has_voted(&self) -> bool {
        self.voted_key.is_some()
    }

    /// Whether the stored vote went to exactly this replica incarnation.
    pub fn is_voted_candidate(&self, key: &ReplicaKey) -> bool {
        self.voted_key.as_ref() == Some(key)
    }
}

impl fmt::Display for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElectionState(epoch={}", self.epoch)?;
        if let Some(leader) = self.leader_id {
            write!(f, ", leader={}", leader)?;
        }
        if let Some(voted) = &self.voted_key {
            write!(f, ", voted={}", voted)?;
        }
        write!(f, ", voters={:?})", self.voter_ids)
    }
}

/// The `(leader, epoch)` pair the rest of the engine keys its behavior on.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub struct LeaderAndEpoch {
    pub leader_id: Option<ReplicaId>,
    pub epoch: Epoch,
}

impl LeaderAndEpoch {
    pub fn new(leader_id: Option<ReplicaId>, epoch: Epoch) -> Self {
        Self { leader_id, epoch }
    }
}

impl fmt::Display for LeaderAndEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.leader_id {
            Some(leader) => write!(f, "LeaderAndEpoch(leader={}, epoch={})", leader, self.epoch),
            None => write!(f, "LeaderAndEpoch(leader=none, epoch={})", self.epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreeset;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_constructors_keep_leader_and_vote_exclusive() {
        let leader = ElectionState::with_elected_leader(3, 1, btreeset! {1, 2});
        assert!(leader.has_leader());
        assert!(!leader.has_voted());

        let voted =
            ElectionState::with_voted_candidate(3, ReplicaKey::new(2, Uuid::nil()), btreeset! {1, 2});
        assert!(!voted.has_leader());
        assert!(voted.has_voted());

        let unknown = ElectionState::with_unknown_leader(3, btreeset! {1, 2});
        assert!(!unknown.has_leader());
        assert!(!unknown.has_voted());
    }

    #[test]
    fn test_voted_candidate_match_is_incarnation_exact() {
        let dir = Uuid::new_v4();
        let election =
            ElectionState::with_voted_candidate(3, ReplicaKey::new(2, dir), btreeset! {1, 2});

        assert!(election.is_voted_candidate(&ReplicaKey::new(2, dir)));
        assert!(!election.is_voted_candidate(&ReplicaKey::new(2, Uuid::new_v4())));
        assert!(!election.is_voted_candidate(&ReplicaKey::new(3, dir)));
    }
}
