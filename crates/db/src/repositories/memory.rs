use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use deskbot_core::errors::StoreError;
use deskbot_core::ports::StateStore;

#[derive(Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use deskbot_core::ports::StateStore;

    use super::InMemoryStateStore;

    #[tokio::test]
    async fn in_memory_store_keeps_latest_value_per_key() {
        let store = InMemoryStateStore::default();
        assert!(store.is_empty().await);

        store.set("user_message_U1", json!("2026-03-02T20:00:00Z")).await.expect("set");
        store.set("user_message_U1", json!("2026-03-02T21:00:00Z")).await.expect("set");

        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get("user_message_U1").await.expect("get"),
            Some(json!("2026-03-02T21:00:00Z"))
        );
        assert_eq!(store.get("user_message_U2").await.expect("get"), None);
    }
}
