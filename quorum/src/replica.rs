use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

/// Id of a replica within the cluster. A replica that has no id participates
/// as an observer only.
pub type ReplicaId = i32;

/// Identity of one storage incarnation of a replica.
///
/// The directory id distinguishes a replica from an earlier incarnation that
/// ran with the same id on a different (e.g. reformatted) disk. Two keys with
/// equal ids but different directory ids are different replicas.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, PartialOrd, Ord)]
#[derive(derive_more::Display)]
#[display(fmt = "{}-{}", id, directory_id)]
pub struct ReplicaKey {
    pub id: ReplicaId,
    pub directory_id: Uuid,
}

impl ReplicaKey {
    pub fn new(id: ReplicaId, directory_id: Uuid) -> Self {
        Self { id, directory_id }
    }

    /// Key of a replica that predates directory ids.
    pub fn without_directory(id: ReplicaId) -> Self {
        Self {
            id,
            directory_id: Uuid::nil(),
        }
    }
}

/// Advertised endpoints of one replica, keyed by listener name.
#[derive(Clone, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct Endpoints {
    listeners: BTreeMap<String, SocketAddr>,
}

impl Endpoints {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(listeners: impl IntoIterator<Item = (String, SocketAddr)>) -> Self {
        Self {
            listeners: listeners.into_iter().collect(),
        }
    }

    pub fn address(&self, listener: &str) -> Option<SocketAddr> {
        self.listeners.get(listener).copied()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SocketAddr)> {
        self.listeners.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

impl fmt::Display for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, addr)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, addr)?;
        }
        write!(f, "}}")
    }
}
