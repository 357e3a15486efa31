use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fluffer_core::KeyValueStore;
use fluffer_domain::Result as DomainResult;
use serde_json::Value;

/// `BTreeMap`-backed key/value store.
#[derive(Default, Clone)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl InMemoryKeyValueStore {
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> DomainResult<Option<Value>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> DomainResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> DomainResult<Vec<(String, Value)>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
