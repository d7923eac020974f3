use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::election::ElectionState;
use crate::replica::ReplicaKey;
use crate::version::KRaftVersion;

#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("quorum state store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed quorum state record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("inconsistent quorum state record: {0}")]
    Inconsistent(String),
}

/// Durable single-record store for the election state.
///
/// `write` must be atomic and synchronously durable before it returns: a
/// record handed back by a later `read` is exactly the last successfully
/// written one, crash or not.
pub trait QuorumStateStore: Send {
    /// Returns `None` when no record has ever been written.
    fn read(&self) -> Result<Option<ElectionState>, StoreError>;

    fn write(&mut self, election: &ElectionState, version: KRaftVersion) -> Result<(), StoreError>;

    /// Diagnostic identifier of the backing location.
    fn path(&self) -> PathBuf;
}

/// On-disk shape of the election record.
///
/// `version` 0 predates directory ids and never carries
/// `voted_directory_id`; version 1 always does.
#[derive(Serialize, Deserialize)]
struct QuorumStateData {
    version: u8,
    epoch: u32,
    leader_id: Option<i32>,
    voted_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voted_directory_id: Option<Uuid>,
    voter_ids: Vec<i32>,
}

impl QuorumStateData {
    fn from_election(election: &ElectionState, version: KRaftVersion) -> Self {
        Self {
            version: version.feature_level(),
            epoch: election.epoch,
            leader_id: election.leader_id,
            voted_id: election.voted_key.as_ref().map(|k| k.id),
            voted_directory_id: if version.persists_directory_ids() {
                election.voted_key.as_ref().map(|k| k.directory_id)
            } else {
                None
            },
            voter_ids: election.voter_ids.iter().copied().collect(),
        }
    }

    fn into_election(self) -> Result<ElectionState, StoreError> {
        if self.leader_id.is_some() && self.voted_id.is_some() {
            return Err(StoreError::Inconsistent(format!(
                "record at epoch {} carries both a leader ({:?}) and a vote ({:?})",
                self.epoch, self.leader_id, self.voted_id
            )));
        }

        let voted_key = self.voted_id.map(|id| match self.voted_directory_id {
            Some(directory_id) => ReplicaKey::new(id, directory_id),
            None => ReplicaKey::without_directory(id),
        });

        Ok(ElectionState {
            epoch: self.epoch,
            leader_id: self.leader_id,
            voted_key,
            voter_ids: self.voter_ids.into_iter().collect(),
        })
    }
}

/// File-backed store holding the election record as one JSON document.
///
/// Writes go through a temp file, fsync, rename, and a directory fsync, so a
/// crash leaves either the previous record or the new one, never a torn mix.
#[derive(Debug)]
pub struct FileQuorumStateStore {
    path: PathBuf,
}

impl FileQuorumStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn sync_parent(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::File::open(parent)?.sync_all()?;
        }
        Ok(())
    }
}

impl QuorumStateStore for FileQuorumStateStore {
    fn read(&self) -> Result<Option<ElectionState>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let data: QuorumStateData = serde_json::from_str(&raw)?;
        data.into_election().map(Some)
    }

    fn write(&mut self, election: &ElectionState, version: KRaftVersion) -> Result<(), StoreError> {
        let data = QuorumStateData::from_election(election, version);
        let raw = serde_json::to_vec_pretty(&data)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&raw)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Self::sync_parent(&self.path)?;

        tracing::trace!(path = %self.path.display(), election = %election, "wrote quorum state");
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-memory store. Clones share the backing record, so a restarted manager
/// built over a clone observes what the previous one wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryQuorumStateStore {
    record: Arc<Mutex<Option<ElectionState>>>,
}

impl MemoryQuorumStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuorumStateStore for MemoryQuorumStateStore {
    fn read(&self) -> Result<Option<ElectionState>, StoreError> {
        Ok(self.record.lock().unwrap().clone())
    }

    fn write(&mut self, election: &ElectionState, _version: KRaftVersion) -> Result<(), StoreError> {
        *self.record.lock().unwrap() = Some(election.clone());
        Ok(())
    }

    fn path(&self) -> PathBuf {
        PathBuf::from(":memory:")
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    use super::*;

    fn election_with_vote() -> ElectionState {
        ElectionState::with_voted_candidate(
            7,
            ReplicaKey::new(2, Uuid::new_v4()),
            btreeset! {1, 2, 3},
        )
    }

    #[test]
    fn test_file_store_round_trip_v1() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = FileQuorumStateStore::new(dir.path().join("quorum-state"));

        let election = election_with_vote();
        store.write(&election, KRaftVersion::V1)?;

        assert_eq!(Some(election), store.read()?);
        Ok(())
    }

    #[test]
    fn test_file_store_v0_drops_directory_id() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = FileQuorumStateStore::new(dir.path().join("quorum-state"));

        let election = election_with_vote();
        store.write(&election, KRaftVersion::V0)?;

        let read = store.read()?.unwrap();
        assert_eq!(election.epoch, read.epoch);
        assert_eq!(
            Some(ReplicaKey::without_directory(2)),
            read.voted_key,
            "a v0 record must not remember the voted directory id"
        );
        Ok(())
    }

    #[test]
    fn test_absent_and_empty_files_read_as_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quorum-state");

        let store = FileQuorumStateStore::new(&path);
        assert_eq!(None, store.read()?);

        fs::write(&path, "  \n")?;
        assert_eq!(None, store.read()?);
        Ok(())
    }

    #[test]
    fn test_leader_and_vote_together_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quorum-state");
        fs::write(
            &path,
            r#"{"version":1,"epoch":3,"leader_id":1,"voted_id":2,"voter_ids":[1,2]}"#,
        )?;

        let store = FileQuorumStateStore::new(&path);
        let err = store.read().unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)), "got {err:?}");
        Ok(())
    }

    #[test]
    fn test_memory_store_clones_share_the_record() -> anyhow::Result<()> {
        let mut store = MemoryQuorumStateStore::new();
        let restarted_view = store.clone();

        let election = election_with_vote();
        store.write(&election, KRaftVersion::V1)?;

        assert_eq!(Some(election), restarted_view.read()?);
        Ok(())
    }
}
