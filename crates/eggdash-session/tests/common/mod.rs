#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use eggdash_core::store::Store;
use eggdash_hunt::HuntConfig;
use eggdash_session::{MemoryStore, SessionConfig, SessionCoordinator, SessionEvent};

/// A coordinator with its event stream.
pub struct TestClient {
    pub coordinator: SessionCoordinator,
    pub events: mpsc::Receiver<SessionEvent>,
}

impl TestClient {
    pub fn new(store: &Arc<MemoryStore>, id: &str, name: &str) -> Self {
        Self::with_config(store, id, name, SessionConfig::default())
    }

    pub fn with_config(
        store: &Arc<MemoryStore>,
        id: &str,
        name: &str,
        config: SessionConfig,
    ) -> Self {
        let store: Arc<dyn Store> = Arc::clone(store) as Arc<dyn Store>;
        let (coordinator, events) = SessionCoordinator::new(store, config, id.to_string(), name);
        Self {
            coordinator,
            events,
        }
    }

    /// Next event matching `pred`, skipping the rest. Panics after a second.
    pub async fn next_matching<F>(&mut self, mut pred: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Drop everything currently buffered.
    pub fn drain(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}

pub fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Host `h` with a session created and guest `g` joined.
pub async fn hosted_pair(store: &Arc<MemoryStore>) -> (TestClient, TestClient, String) {
    let mut host = TestClient::new(store, "h", "Hoppy");
    let mut guest = TestClient::new(store, "g", "Clover");
    let id = host.coordinator.create_session().await.unwrap();
    guest.coordinator.join_session(&id).await.unwrap();
    (host, guest, id)
}

/// Config with a three-second round and a one-step countdown.
pub fn quick_config() -> SessionConfig {
    SessionConfig {
        frame_rate: 20.0,
        hunt: HuntConfig {
            round_secs: 3,
            countdown_labels: vec!["GO!".into()],
            countdown_step_secs: 0.1,
            ..HuntConfig::default()
        },
        ..SessionConfig::default()
    }
}
