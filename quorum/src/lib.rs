//! Quorum state management for a KRaft-style replicated log.
//!
//! This crate owns a replica's role in its epoch: which of Unattached,
//! Candidate, Leader, Follower, or Resigned it currently is, which
//! transitions between them are legal, and which election decisions must hit
//! stable storage before the rest of the consensus engine may act on them.
//! Voting twice in an epoch, following two leaders, or forgetting a vote
//! across a crash each break safety for the whole cluster, so every vote,
//! heartbeat timeout, and leader discovery passes through [`QuorumState`]
//! before anything else happens.
//!
//! The crate deliberately stops at the role boundary. It does not drive
//! timers (role states expose poll-style deadlines), does not decide when to
//! elect (it is told), does not count replication progress beyond what the
//! high watermark needs, and does not own a wire format. Storage and the
//! partition's control-record state are reached only through the
//! [`QuorumStateStore`] and [`PartitionStateView`] traits.

mod election;
mod error;
mod offset;
mod partition;
mod quorum_state;
mod replica;
mod state;
mod store;
mod time;
mod version;
mod voters;


pub use crate::election::ElectionState;
pub use crate::election::Epoch;
pub use crate::election::LeaderAndEpoch;
pub use crate::error::QuorumError;
pub use crate::offset::LogOffset;
pub use crate::offset::LogOffsetMetadata;
pub use crate::offset::OffsetAndEpoch;
pub use crate::partition::MemoryPartitionView;
pub use crate::partition::PartitionStateView;
pub use crate::quorum_state::QuorumConfig;
pub use crate::quorum_state::QuorumMetrics;
pub use crate::quorum_state::QuorumState;
pub use crate::replica::Endpoints;
pub use crate::replica::ReplicaId;
pub use crate::replica::ReplicaKey;
pub use crate::state::BatchAccumulator;
pub use crate::state::CandidateState;
pub use crate::state::FollowerState;
pub use crate::state::LeaderState;
pub use crate::state::ResignedState;
pub use crate::state::Role;
pub use crate::state::RoleState;
pub use crate::state::UnattachedState;
pub use crate::store::FileQuorumStateStore;
pub use crate::store::MemoryQuorumStateStore;
pub use crate::store::QuorumStateStore;
pub use crate::store::StoreError;
pub use crate::time::Clock;
pub use crate::time::ManualClock;
pub use crate::time::SystemClock;
pub use crate::time::Timer;
pub use crate::version::KRaftVersion;
pub use crate::voters::Voter;
pub use crate::voters::VoterSet;
