//! Key-value storage seam for the faucet ledgers.
//!
//! Limit bookkeeping goes through the [`Store`] trait so the same service
//! logic runs against an in-memory map in tests and a durable sled database
//! in production.

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod sled;

pub use self::memory::MemoryStore;
pub use self::sled::SledStore;

/// Minimal async key-value interface: point reads/writes plus prefix scans.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    async fn remove(&self, key: &[u8]) -> Result<()>;

    /// All `(key, value)` pairs whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}
