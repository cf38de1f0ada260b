//! Persistence seam for the embedding application.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Storage key for the verified caller-line-identity list, a JSON array of
/// `{cc, phone}` objects written by the contact-registration response.
pub const VERIFIED_CLI_KEY: &str = "verified_cli_list";

/// Storage key for the active call id, persisted so a relaunched process
/// can reconcile a call that was in flight.
pub const ACTIVE_CALL_ID_KEY: &str = "active_call_id";

/// Narrow string-keyed persistence sink provided by the host application.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_string(&self, key: &str) -> Option<String>;
    async fn put_string(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// In-memory persistence, used in tests and as a default for hosts that do
/// not care about surviving restarts.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn get_string(&self, key: &str) -> Option<String> {
        self.map.lock().await.get(key).cloned()
    }

    async fn put_string(&self, key: &str, value: &str) {
        self.map
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.map.lock().await.remove(key);
    }
}
