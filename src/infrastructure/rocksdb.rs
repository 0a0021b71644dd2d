use crate::domain::operation::OperationRecord;
use crate::domain::ports::OperationStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for phase, error and alias records.
pub const CF_OPERATIONS: &str = "operations";
/// Column Family for hot counters.
pub const CF_COUNTERS: &str = "counters";

/// What is written to disk: the record plus its absolute expiry.
#[derive(Serialize, Deserialize)]
struct Envelope {
    record: OperationRecord,
    /// Seconds since epoch after which the record is gone.
    expires_at: i64,
}

impl Envelope {
    fn new(mut record: OperationRecord, ttl_seconds: u64) -> Self {
        let now = Utc::now().timestamp();
        record.timestamp = now;
        record.ttl_seconds = ttl_seconds;
        Self {
            record,
            expires_at: now.saturating_add(i64::try_from(ttl_seconds).unwrap_or(i64::MAX)),
        }
    }

    fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// A persistent store implementation using RocksDB.
///
/// Counters live in their own Column Family so they can be tuned separately
/// from the long-lived operation records. Expired records are invisible to reads
/// and only removed by `delete` or `purge_expired`, both under the write lock.
///
/// `Clone` shares the underlying `Arc<DB>` and the write lock that serialises
/// the read-modify-write primitives within this process.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("operations" and "counters") exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_operations = ColumnFamilyDescriptor::new(CF_OPERATIONS, Options::default());
        let cf_counters = ColumnFamilyDescriptor::new(CF_COUNTERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_operations, cf_counters])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::StorageUnavailable(format!("column family {} not found", name))
        })
    }

    fn read(&self, cf: &ColumnFamily, key: &str) -> Result<Option<Envelope>> {
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let envelope = serde_json::from_slice(&bytes).map_err(|e| {
                    PaymentError::StorageUnavailable(format!("Deserialization error: {}", e))
                })?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    /// Reads never delete; expired envelopes stay until `purge_expired`.
    fn read_live(&self, cf: &ColumnFamily, key: &str) -> Result<Option<OperationRecord>> {
        let now = Utc::now().timestamp();
        Ok(self
            .read(cf, key)?
            .filter(|envelope| envelope.is_live(now))
            .map(|envelope| envelope.record))
    }

    fn write(&self, cf: &ColumnFamily, key: &str, envelope: &Envelope) -> Result<()> {
        let value = serde_json::to_vec(envelope).map_err(|e| {
            PaymentError::StorageUnavailable(format!("Serialization error: {}", e))
        })?;
        self.db.put_cf(cf, key.as_bytes(), value)?;
        Ok(())
    }

    fn purge_family(&self, name: &str, now: i64) -> Result<usize> {
        let cf = self.handle(name)?;
        let mut expired = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let live = serde_json::from_slice::<Envelope>(&value)
                .map(|envelope| envelope.is_live(now))
                .unwrap_or(false);
            if !live {
                expired.push(key);
            }
        }
        for key in &expired {
            self.db.delete_cf(cf, key)?;
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl OperationStore for RocksDBStore {
    async fn save(&self, key: &str, record: OperationRecord, ttl_seconds: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.handle(CF_OPERATIONS)?;
        self.write(cf, key, &Envelope::new(record, ttl_seconds))?;
        debug!(operation_key = key, ttl_seconds, "Operation saved");
        Ok(())
    }

    async fn save_if_absent(
        &self,
        key: &str,
        record: OperationRecord,
        ttl_seconds: u64,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.handle(CF_OPERATIONS)?;
        if self.read_live(cf, key)?.is_some() {
            debug!(operation_key = key, "Operation already present");
            return Ok(false);
        }
        self.write(cf, key, &Envelope::new(record, ttl_seconds))?;
        debug!(operation_key = key, ttl_seconds, "Operation saved");
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<OperationRecord>> {
        let operations = self.handle(CF_OPERATIONS)?;
        if let Some(record) = self.read_live(operations, key)? {
            return Ok(Some(record));
        }
        let counters = self.handle(CF_COUNTERS)?;
        self.read_live(counters, key)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut removed = false;
        for name in [CF_OPERATIONS, CF_COUNTERS] {
            let cf = self.handle(name)?;
            removed |= self.read_live(cf, key)?.is_some();
            self.db.delete_cf(cf, key.as_bytes())?;
        }
        Ok(removed)
    }

    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let cf = self.handle(CF_COUNTERS)?;
        let current = self
            .read_live(cf, key)?
            .map(|record| record.counter_value())
            .unwrap_or(0);
        let counter = OperationRecord::counter(key, current + 1);
        self.write(cf, key, &Envelope::new(counter, ttl_seconds))?;
        Ok(current)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().timestamp();
        Ok(self.purge_family(CF_OPERATIONS, now)? + self.purge_family(CF_COUNTERS, now)?)
    }
}
