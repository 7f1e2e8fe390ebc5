//! The real-time shared store that multiplayer coordination runs on.
//!
//! A store is a tree of JSON values addressed by slash-separated paths. Writes
//! are last-write-wins; subscribers are pushed the value at their path every
//! time it changes, starting with the value current at subscription time.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

/// A JSON value held in the store.
pub type StoreValue = serde_json::Value;

/// A set of relative-path writes applied atomically by [`Store::update`].
pub type StoreChanges = serde_json::Map<String, StoreValue>;

/// Handle identifying a live subscription.
pub type SubscriptionId = u64;

/// Characters a path segment may not contain.
const FORBIDDEN_SEGMENT_CHARS: &[char] = &['.', '#', '$', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    Unavailable(String),
    InvalidPath(String),
    /// A value could not be converted to or from its record type.
    Serialize(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "store unavailable: {m}"),
            Self::InvalidPath(p) => write!(f, "invalid store path: {p:?}"),
            Self::Serialize(m) => write!(f, "store value conversion failed: {m}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A push subscription to one path.
///
/// `None` on the channel means the path holds no value.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub path: String,
    pub changes: mpsc::UnboundedReceiver<Option<StoreValue>>,
}

/// What a transaction closure wants done with the value it was shown.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionDecision {
    /// Write the value (`None` deletes the path).
    Commit(Option<StoreValue>),
    /// Write each relative path below the transacted path, leaving its other
    /// children alone. `null` values delete.
    Update(StoreChanges),
    /// Leave the path untouched.
    Abort,
}

/// Result of [`Store::transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub committed: bool,
    /// The value at the path after the transaction.
    pub value: Option<StoreValue>,
}

/// Read-modify-write closure. May be invoked more than once by stores that
/// retry on contention, so it must not have side effects.
pub type TransactionFn = Box<dyn FnMut(Option<&StoreValue>) -> TransactionDecision + Send>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Replace the value at `path`. Writing `null` removes it.
    async fn set(&self, path: &str, value: StoreValue) -> Result<(), StoreError>;

    /// Apply several writes below `path` as one atomic change. Keys are
    /// relative paths (`"players/abc/ready"`); `null` values delete.
    async fn update(&self, path: &str, changes: StoreChanges) -> Result<(), StoreError>;

    /// One-shot read.
    async fn get(&self, path: &str) -> Result<Option<StoreValue>, StoreError>;

    /// Append `value` under `path` with a generated key that sorts after
    /// every key previously pushed. Returns the key.
    async fn push(&self, path: &str, value: StoreValue) -> Result<String, StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Stop delivering changes to a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, id: SubscriptionId);

    /// Atomically read the value at `path`, hand it to `apply`, and write the
    /// decision back with no interleaving writes.
    async fn transaction(
        &self,
        path: &str,
        apply: TransactionFn,
    ) -> Result<TransactionOutcome, StoreError>;

    /// Server clock in milliseconds. Strictly increasing across calls.
    async fn server_timestamp(&self) -> Result<u64, StoreError>;
}

/// Split and validate a store path into its segments.
pub fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    let bad = segments
        .iter()
        .any(|s| s.is_empty() || s.contains(FORBIDDEN_SEGMENT_CHARS));
    if bad {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Join a relative path onto a base path.
pub fn join_path(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{child}")
    }
}

/// Convert a record into a store value.
pub fn to_value<T: Serialize>(record: &T) -> Result<StoreValue, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialize(e.to_string()))
}

/// Convert a store value into a record.
pub fn from_value<T: DeserializeOwned>(value: StoreValue) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialize(e.to_string()))
}

/// Typed one-shot read.
pub async fn read<T: DeserializeOwned>(
    store: &dyn Store,
    path: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(path).await? {
        Some(value) => from_value(value).map(Some),
        None => Ok(None),
    }
}

/// Typed write.
pub async fn write<T: Serialize>(
    store: &dyn Store,
    path: &str,
    record: &T,
) -> Result<(), StoreError> {
    store.set(path, to_value(record)?).await
}
