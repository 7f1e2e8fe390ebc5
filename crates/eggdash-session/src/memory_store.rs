use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use eggdash_core::store::{
    Store, StoreChanges, StoreError, StoreValue, Subscription, SubscriptionId, TransactionDecision,
    TransactionFn, TransactionOutcome, join_path, split_path,
};
use eggdash_core::time::now_ms;

/// In-process store with push subscriptions.
///
/// The whole tree sits behind one lock, so every write (including
/// [`Store::update`] batches and transactions) is atomic and subscribers see
/// changes in commit order. `null` values and empty objects are pruned on
/// write, so a path either holds data or does not exist.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    root: StoreValue,
    available: bool,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_subscription: SubscriptionId,
    next_push: u64,
    last_timestamp: u64,
}

struct Subscriber {
    segments: Vec<String>,
    tx: mpsc::UnboundedSender<Option<StoreValue>>,
    last: Option<StoreValue>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: StoreValue::Null,
                available: true,
                subscribers: BTreeMap::new(),
                next_subscription: 1,
                next_push: 0,
                last_timestamp: 0,
            }),
        }
    }

    /// Simulate losing (or regaining) the connection. While unavailable every
    /// operation fails with [`StoreError::Unavailable`].
    pub async fn set_available(&self, available: bool) {
        self.inner.lock().await.available = available;
    }

    /// Number of live subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }
}

impl Inner {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn read(&self, segments: &[&str]) -> Option<StoreValue> {
        read_from(&self.root, segments)
    }

    fn write(&mut self, segments: &[&str], value: StoreValue) {
        write_at(&mut self.root, segments, normalize(value));
    }

    /// Push the current value to every subscriber whose path changed. Closed
    /// receivers are dropped.
    fn notify(&mut self) {
        let root = &self.root;
        self.subscribers.retain(|id, sub| {
            let segments: Vec<&str> = sub.segments.iter().map(String::as_str).collect();
            let current = read_from(root, &segments);
            if current == sub.last {
                return true;
            }
            sub.last = current.clone();
            let alive = sub.tx.send(current).is_ok();
            if !alive {
                tracing::debug!(subscription = id, "Dropping closed subscription");
            }
            alive
        });
    }
}

fn read_from(root: &StoreValue, segments: &[&str]) -> Option<StoreValue> {
    let mut node = root;
    for segment in segments {
        node = node.as_object()?.get(*segment)?;
    }
    (!node.is_null()).then(|| node.clone())
}

/// Strip `null` members and empty objects. Returns `Null` when nothing is left.
fn normalize(value: StoreValue) -> StoreValue {
    match value {
        StoreValue::Object(map) => {
            let cleaned: serde_json::Map<String, StoreValue> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if cleaned.is_empty() {
                StoreValue::Null
            } else {
                StoreValue::Object(cleaned)
            }
        },
        other => other,
    }
}

fn write_at(node: &mut StoreValue, segments: &[&str], value: StoreValue) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = StoreValue::Object(serde_json::Map::new());
    }
    let StoreValue::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(*first);
        } else {
            map.insert((*first).to_string(), value);
        }
    } else {
        let child = map
            .entry((*first).to_string())
            .or_insert(StoreValue::Null);
        write_at(child, rest, value);
        if child.is_null() {
            map.remove(*first);
        }
    }

    if map.is_empty() {
        *node = StoreValue::Null;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(&self, path: &str, value: StoreValue) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        inner.write(&segments, value);
        inner.notify();
        Ok(())
    }

    async fn update(&self, path: &str, changes: StoreChanges) -> Result<(), StoreError> {
        let full_paths: Vec<(String, StoreValue)> = changes
            .into_iter()
            .map(|(key, value)| (join_path(path, &key), value))
            .collect();
        // Validate everything before touching the tree.
        for (full, _) in &full_paths {
            split_path(full)?;
        }

        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        for (full, value) in full_paths {
            let segments = split_path(&full)?;
            inner.write(&segments, value);
        }
        inner.notify();
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<StoreValue>, StoreError> {
        let segments = split_path(path)?;
        let inner = self.inner.lock().await;
        inner.check_available()?;
        Ok(inner.read(&segments))
    }

    async fn push(&self, path: &str, value: StoreValue) -> Result<String, StoreError> {
        split_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        let key = format!("{:012}", inner.next_push);
        inner.next_push += 1;
        let full = join_path(path, &key);
        let segments = split_path(&full)?;
        inner.write(&segments, value);
        inner.notify();
        Ok(key)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, StoreValue::Null).await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.check_available()?;

        let id = inner.next_subscription;
        inner.next_subscription += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let current = inner.read(&segments);
        // The receiver is still held locally, so this cannot fail.
        let _ = tx.send(current.clone());
        inner.subscribers.insert(
            id,
            Subscriber {
                segments: segments.iter().map(|s| s.to_string()).collect(),
                tx,
                last: current,
            },
        );
        tracing::debug!(subscription = id, path, "Subscribed");

        Ok(Subscription {
            id,
            path: path.to_string(),
            changes: rx,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().await.subscribers.remove(&id);
    }

    async fn transaction(
        &self,
        path: &str,
        mut apply: TransactionFn,
    ) -> Result<TransactionOutcome, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.check_available()?;

        let current = inner.read(&segments);
        match apply(current.as_ref()) {
            TransactionDecision::Commit(next) => {
                inner.write(&segments, next.unwrap_or(StoreValue::Null));
                inner.notify();
                Ok(TransactionOutcome {
                    committed: true,
                    value: inner.read(&segments),
                })
            },
            TransactionDecision::Update(changes) => {
                let writes = changes
                    .into_iter()
                    .map(|(key, value)| {
                        let full = join_path(path, &key);
                        split_path(&full)?;
                        Ok((full, value))
                    })
                    .collect::<Result<Vec<_>, StoreError>>()?;
                for (full, value) in writes {
                    let segments = split_path(&full)?;
                    inner.write(&segments, value);
                }
                inner.notify();
                Ok(TransactionOutcome {
                    committed: true,
                    value: inner.read(&segments),
                })
            },
            TransactionDecision::Abort => Ok(TransactionOutcome {
                committed: false,
                value: current,
            }),
        }
    }

    async fn server_timestamp(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.check_available()?;
        let ts = now_ms().max(inner.last_timestamp + 1);
        inner.last_timestamp = ts;
        Ok(ts)
    }
}
