use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;

/// One entry of the voter set.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct Voter {
    pub key: ReplicaKey,
    pub listeners: Endpoints,
}

impl Voter {
    pub fn new(key: ReplicaKey, listeners: Endpoints) -> Self {
        Self { key, listeners }
    }
}

/// The authoritative set of replicas eligible to vote, as established by the
/// latest voter-set control record in the log.
#[derive(Clone, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct VoterSet {
    voters: BTreeMap<ReplicaId, Voter>,
}

impl VoterSet {
    pub fn new(voters: impl IntoIterator<Item = Voter>) -> Self {
        Self {
            voters: voters.into_iter().map(|v| (v.key.id, v)).collect(),
        }
    }

    /// Whether the given replica incarnation is a voter.
    ///
    /// A voter entry recorded before directory ids existed carries a nil
    /// directory id and matches any incarnation of that replica id.
    pub fn is_voter(&self, key: &ReplicaKey) -> bool {
        match self.voters.get(&key.id) {
            None => false,
            Some(voter) => {
                voter.key.directory_id.is_nil() || voter.key.directory_id == key.directory_id
            }
        }
    }

    pub fn contains_id(&self, id: ReplicaId) -> bool {
        self.voters.contains_key(&id)
    }

    /// Endpoints advertised by the given voter; empty if the id is unknown.
    pub fn listeners(&self, id: ReplicaId) -> Endpoints {
        self.voters.get(&id).map(|v| v.listeners.clone()).unwrap_or_default()
    }

    pub fn is_only_voter(&self, key: &ReplicaKey) -> bool {
        self.voters.len() == 1 && self.is_voter(key)
    }

    pub fn ids(&self) -> BTreeSet<ReplicaId> {
        self.voters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}
