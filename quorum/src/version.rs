use serde::Deserialize;
use serde::Serialize;

/// Version of the quorum protocol active for the partition.
///
/// Version 1 introduced replica directory ids: the persisted election record
/// carries the voted directory id, and voter-set entries identify storage
/// incarnations rather than bare ids.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub enum KRaftVersion {
    V0,
    V1,
}

impl KRaftVersion {
    pub fn feature_level(&self) -> u8 {
        match self {
            KRaftVersion::V0 => 0,
            KRaftVersion::V1 => 1,
        }
    }

    /// Whether the persisted election record carries directory ids.
    pub fn persists_directory_ids(&self) -> bool {
        *self >= KRaftVersion::V1
    }
}

impl std::fmt::Display for KRaftVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.feature_level())
    }
}
