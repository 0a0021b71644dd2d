//! Adapters for the domain ports: operation stores and simulated providers.

pub mod in_memory;
pub mod providers;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
