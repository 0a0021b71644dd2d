use crate::domain::operation::OperationRecord;
use crate::domain::ports::OperationStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

struct StoredRecord {
    record: OperationRecord,
    expires_at: Instant,
}

impl StoredRecord {
    fn new(mut record: OperationRecord, ttl_seconds: u64) -> Self {
        record.timestamp = Utc::now().timestamp();
        record.ttl_seconds = ttl_seconds;
        Self {
            record,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A thread-safe in-memory operation store.
///
/// Uses `Arc<RwLock<HashMap<String, _>>>` so clones share the same records.
/// Expiry follows the tokio clock, which tests can pause and advance.
#[derive(Default, Clone)]
pub struct InMemoryOperationStore {
    records: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

impl InMemoryOperationStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Keys of every live record, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let records = self.records.read().await;
        let mut keys: Vec<String> = records
            .iter()
            .filter(|(_, stored)| stored.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn save(&self, key: &str, record: OperationRecord, ttl_seconds: u64) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(key.to_string(), StoredRecord::new(record, ttl_seconds));
        debug!(operation_key = key, ttl_seconds, "Operation saved");
        Ok(())
    }

    async fn save_if_absent(
        &self,
        key: &str,
        record: OperationRecord,
        ttl_seconds: u64,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        match records.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().is_live(now) => {
                debug!(operation_key = key, "Operation already present");
                Ok(false)
            }
            Entry::Occupied(mut entry) => {
                entry.insert(StoredRecord::new(record, ttl_seconds));
                debug!(operation_key = key, ttl_seconds, "Operation saved");
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredRecord::new(record, ttl_seconds));
                debug!(operation_key = key, ttl_seconds, "Operation saved");
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<OperationRecord>> {
        let now = Instant::now();
        let records = self.records.read().await;
        let found = records
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.record.clone());
        if found.is_none() {
            trace!(operation_key = key, "Operation not found");
        }
        Ok(found)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        Ok(records
            .remove(key)
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let current = records
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.record.counter_value())
            .unwrap_or(0);
        let counter = OperationRecord::counter(key, current + 1);
        records.insert(key.to_string(), StoredRecord::new(counter, ttl_seconds));
        Ok(current)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, stored| stored.is_live(now));
        Ok(before - records.len())
    }
}
