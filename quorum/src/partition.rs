use std::sync::Mutex;

use crate::offset::LogOffset;
use crate::version::KRaftVersion;
use crate::voters::VoterSet;

/// Read-only view of the partition control-record state machine: the latest
/// voter set, the log offset at which it was established, and the protocol
/// version currently active.
///
/// The manager queries this at every transition; implementations are
/// expected to answer from memory.
pub trait PartitionStateView: Send + Sync {
    fn last_voter_set(&self) -> VoterSet;

    /// `None` until the first voter-set control record has been read from
    /// the log.
    fn last_voter_set_offset(&self) -> Option<LogOffset>;

    fn last_kraft_version(&self) -> KRaftVersion;
}

/// An in-memory view for tests and standalone tooling. Interior mutability
/// lets a test install a new voter set mid-scenario.
#[derive(Debug)]
pub struct MemoryPartitionView {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    voters: VoterSet,
    offset: Option<LogOffset>,
    version: KRaftVersion,
}

impl MemoryPartitionView {
    pub fn new(voters: VoterSet, offset: Option<LogOffset>, version: KRaftVersion) -> Self {
        Self {
            inner: Mutex::new(Inner {
                voters,
                offset,
                version,
            }),
        }
    }

    pub fn set_voter_set(&self, voters: VoterSet, offset: LogOffset) {
        let mut inner = self.inner.lock().unwrap();
        inner.voters = voters;
        inner.offset = Some(offset);
    }

    pub fn set_kraft_version(&self, version: KRaftVersion) {
        self.inner.lock().unwrap().version = version;
    }
}

impl PartitionStateView for MemoryPartitionView {
    fn last_voter_set(&self) -> VoterSet {
        self.inner.lock().unwrap().voters.clone()
    }

    fn last_voter_set_offset(&self) -> Option<LogOffset> {
        self.inner.lock().unwrap().offset
    }

    fn last_kraft_version(&self) -> KRaftVersion {
        self.inner.lock().unwrap().version
    }
}
