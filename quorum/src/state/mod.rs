//! The per-role states and the closed variant set the manager dispatches
//! over.
//!
//! Every role is a self-contained struct carrying its own bookkeeping
//! (deadlines, tallies, progress). The manager owns exactly one of them at a
//! time and is the only writer; the structs expose what the outer engine
//! needs and nothing else.

use std::fmt;
use std::io;

use crate::election::ElectionState;
use crate::election::Epoch;
use crate::offset::LogOffsetMetadata;
use crate::replica::Endpoints;
use crate::replica::ReplicaId;
use crate::replica::ReplicaKey;

mod candidate;
mod follower;
mod leader;
mod resigned;
mod unattached;

pub use candidate::CandidateState;
pub use follower::FollowerState;
pub use leader::BatchAccumulator;
pub use leader::LeaderState;
pub use resigned::ResignedState;
pub use unattached::UnattachedState;

/// Role tag, used in errors, logs, and the published snapshot.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
#[derive(derive_more::Display)]
pub enum Role {
    Unattached,
    Candidate,
    Leader,
    Follower,
    Resigned,
}

/// The active role and its state. A closed set: the manager matches on it
/// instead of dispatching through a trait object.
#[derive(Debug)]
pub enum RoleState {
    Unattached(UnattachedState),
    Candidate(CandidateState),
    Leader(LeaderState),
    Follower(FollowerState),
    Resigned(ResignedState),
}

impl RoleState {
    pub fn role(&self) -> Role {
        match self {
            RoleState::Unattached(_) => Role::Unattached,
            RoleState::Candidate(_) => Role::Candidate,
            RoleState::Leader(_) => Role::Leader,
            RoleState::Follower(_) => Role::Follower,
            RoleState::Resigned(_) => Role::Resigned,
        }
    }

    pub fn epoch(&self) -> Epoch {
        match self {
            RoleState::Unattached(s) => s.epoch(),
            RoleState::Candidate(s) => s.epoch(),
            RoleState::Leader(s) => s.epoch(),
            RoleState::Follower(s) => s.epoch(),
            RoleState::Resigned(s) => s.epoch(),
        }
    }

    /// What this role persists. Resigned inherits the leader record of the
    /// epoch it is resigning from.
    pub fn election(&self) -> ElectionState {
        match self {
            RoleState::Unattached(s) => s.election(),
            RoleState::Candidate(s) => s.election(),
            RoleState::Leader(s) => s.election(),
            RoleState::Follower(s) => s.election(),
            RoleState::Resigned(s) => s.election(),
        }
    }

    pub fn leader_id(&self) -> Option<ReplicaId> {
        match self {
            RoleState::Unattached(s) => s.leader_id(),
            RoleState::Candidate(_) => None,
            RoleState::Leader(s) => Some(s.local_id()),
            RoleState::Follower(s) => Some(s.leader_id()),
            RoleState::Resigned(s) => Some(s.local_id()),
        }
    }

    /// Endpoints of the leader as known in this role; empty when no leader
    /// is known or reachable.
    pub fn leader_endpoints(&self) -> Endpoints {
        match self {
            RoleState::Unattached(_) | RoleState::Candidate(_) => Endpoints::empty(),
            RoleState::Leader(s) => s.local_listeners().clone(),
            RoleState::Follower(s) => s.leader_endpoints().clone(),
            RoleState::Resigned(s) => s.local_listeners().clone(),
        }
    }

    pub fn high_watermark(&self) -> Option<LogOffsetMetadata> {
        match self {
            RoleState::Unattached(s) => s.high_watermark(),
            RoleState::Candidate(s) => s.high_watermark(),
            RoleState::Leader(s) => s.high_watermark(),
            RoleState::Follower(s) => s.high_watermark(),
            RoleState::Resigned(_) => None,
        }
    }

    pub fn can_grant_vote(&self, candidate_key: &ReplicaKey, log_is_up_to_date: bool) -> bool {
        match self {
            RoleState::Unattached(s) => s.can_grant_vote(candidate_key, log_is_up_to_date),
            RoleState::Candidate(s) => s.can_grant_vote(candidate_key),
            RoleState::Leader(_) | RoleState::Follower(_) | RoleState::Resigned(_) => {
                // A leader is already elected for this epoch, and a follower
                // or resigned leader knows who it is.
                tracing::trace!(
                    candidate = %candidate_key,
                    state = %self,
                    "rejecting vote request: an elected leader is known for this epoch"
                );
                false
            }
        }
    }

    /// Releases role-local resources. Idempotent; only the leader owns
    /// anything that can fail to close.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            RoleState::Leader(s) => s.close(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for RoleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(epoch={})", self.role(), self.epoch())
    }
}
