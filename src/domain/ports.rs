use super::operation::OperationRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A TTL-bounded key-value store for operation records.
///
/// Every operation is atomic for its single key. Backend faults surface as
/// `PaymentError::StorageUnavailable`; a missing or expired key is `None`,
/// never an error.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Upserts `record` under `key`, stamping its timestamp and TTL.
    async fn save(&self, key: &str, record: OperationRecord, ttl_seconds: u64) -> Result<()>;

    /// Writes `record` only if no live record exists under `key`.
    ///
    /// Returns `false` and leaves the existing record untouched otherwise.
    async fn save_if_absent(
        &self,
        key: &str,
        record: OperationRecord,
        ttl_seconds: u64,
    ) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<OperationRecord>>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Removes the record under `key`, returning whether a live one existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically increments the counter under `key` and refreshes its TTL.
    ///
    /// Returns the value before the increment, `0` for a missing counter.
    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64>;

    /// Drops every expired record, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

pub type SharedOperationStore = Arc<dyn OperationStore>;
