//! Typed access to records, settings and the sync checkpoint on top of the
//! raw key/value port.

use std::sync::Arc;

use fluffer_domain::constants::{CHECKPOINT_KEY, RSVP_KEY_PREFIX, SETTINGS_KEY};
use fluffer_domain::{BotSettings, FlufferError, Result, RsvpRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::ports::KeyValueStore;

#[derive(Clone)]
pub struct RsvpStore {
    kv: Arc<dyn KeyValueStore>,
}

impl RsvpStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self, event_id: &str) -> Result<Option<RsvpRecord>> {
        self.get_typed(&RsvpRecord::key_for(event_id)).await
    }

    pub async fn save(&self, record: &RsvpRecord) -> Result<()> {
        self.set_typed(&record.key(), record).await
    }

    pub async fn delete(&self, event_id: &str) -> Result<()> {
        self.kv.delete(&RsvpRecord::key_for(event_id)).await
    }

    /// Every stored record. Entries that fail to decode are skipped.
    pub async fn all(&self) -> Result<Vec<RsvpRecord>> {
        let entries = self.kv.scan(RSVP_KEY_PREFIX).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value::<RsvpRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = %key, error = %e, "Skipping undecodable record"),
            }
        }
        Ok(records)
    }

    pub async fn find_by_message(&self, message_id: &str) -> Result<Option<RsvpRecord>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|r| r.message_id.as_deref() == Some(message_id)))
    }

    pub async fn find_by_scheduled_event(&self, id: &str) -> Result<Option<RsvpRecord>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|r| r.scheduled_event_id.as_deref() == Some(id)))
    }

    pub async fn load_settings(&self) -> Result<BotSettings> {
        Ok(self.get_typed(SETTINGS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &BotSettings) -> Result<()> {
        self.set_typed(SETTINGS_KEY, settings).await
    }

    pub async fn checkpoint(&self) -> Result<Option<String>> {
        self.get_typed(CHECKPOINT_KEY).await
    }

    pub async fn set_checkpoint(&self, checkpoint: &str) -> Result<()> {
        self.kv.set(CHECKPOINT_KEY, Value::String(checkpoint.to_string())).await
    }

    pub async fn clear_checkpoint(&self) -> Result<()> {
        self.kv.delete(CHECKPOINT_KEY).await
    }

    async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| FlufferError::Database(format!("Corrupt value at {key}: {e}"))),
            None => Ok(None),
        }
    }

    async fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| FlufferError::Internal(format!("Failed to encode {key}: {e}")))?;
        self.kv.set(key, value).await
    }
}
