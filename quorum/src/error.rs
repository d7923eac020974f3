use crate::election::Epoch;
use crate::state::Role;
use crate::store::StoreError;
use crate::version::KRaftVersion;

/// Errors surfaced by the quorum state manager.
///
/// Transition and role errors indicate a caller bug: the active state is
/// left untouched and nothing is retried here.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum QuorumError {
    #[error("cannot transition to {to} at epoch {requested}: current epoch is {current}")]
    StaleEpoch {
        to: Role,
        requested: Epoch,
        current: Epoch,
    },

    #[error("cannot transition from {from} to {to} at epoch {epoch}: {reason}")]
    IllegalTransition {
        from: Role,
        to: Role,
        epoch: Epoch,
        reason: &'static str,
    },

    #[error("cannot {action} without a local replica id")]
    MissingLocalId { action: &'static str },

    #[error("cannot {action}: the local replica is not a voter")]
    NotVoter { action: &'static str },

    #[error("expected the {expected} role but the current role is {actual}")]
    UnexpectedRole { expected: Role, actual: Role },

    #[error("inconsistent persisted quorum state: {0}")]
    InvalidPersistedState(String),

    #[error("active protocol version {active} is outside the supported range {min}..={max}")]
    UnsupportedVersion {
        active: KRaftVersion,
        min: KRaftVersion,
        max: KRaftVersion,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
