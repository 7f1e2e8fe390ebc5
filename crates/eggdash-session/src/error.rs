use eggdash_core::session::SessionStatus;
use eggdash_core::store::StoreError;

use crate::readiness::StartReadiness;

/// Failures surfaced by session operations. None of them are fatal; callers
/// report them and carry on.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    SessionNotFound(String),
    /// The session is mid-round and cannot be joined or restarted.
    SessionInProgress(String),
    StoreUnavailable(String),
    /// The operation needs a session and this client is not in one.
    NotInSession,
    NotHost,
    NotReady(StartReadiness),
    /// The session is in a status that does not allow the operation.
    WrongStatus(SessionStatus),
    /// A record at a known path did not decode.
    Corrupt(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session {id} not found"),
            Self::SessionInProgress(id) => write!(f, "session {id} already in progress"),
            Self::StoreUnavailable(m) => write!(f, "store unavailable: {m}"),
            Self::NotInSession => write!(f, "not in a session"),
            Self::NotHost => write!(f, "only the host can do that"),
            Self::NotReady(r) => write!(f, "cannot start yet: {r}"),
            Self::WrongStatus(s) => write!(f, "not allowed while session is {s:?}"),
            Self::Corrupt(m) => write!(f, "corrupt session data: {m}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(m) => Self::StoreUnavailable(m),
            StoreError::InvalidPath(p) => Self::Corrupt(format!("invalid path {p:?}")),
            StoreError::Serialize(m) => Self::Corrupt(m),
        }
    }
}
