//! Ledger store adapters.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
