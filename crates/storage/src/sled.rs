use anyhow::{Context, Result};
use async_trait::async_trait;
use sled::Tree;
use std::path::Path;
use std::sync::Arc;

use crate::Store;

/// Sled-backed store. Sled calls are synchronous, so every operation is moved
/// off the async runtime with `spawn_blocking`.
pub struct SledStore {
    tree: Arc<Tree>,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).context("Failed to open sled database")?;
        let tree = db
            .open_tree("faucet")
            .context("Failed to open faucet tree")?;

        Ok(Self {
            tree: Arc::new(tree),
        })
    }
}

#[async_trait]
impl Store for SledStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tree = self.tree.clone();
        let key = key.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.get(&key)
                .map(|v| v.map(|ivec| ivec.to_vec()))
                .context("Failed to read from sled")
        })
        .await?
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let tree = self.tree.clone();
        let key = key.to_vec();
        let value = value.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.insert(key.as_slice(), value.as_slice())
                .map(|_| ())
                .context("Failed to write to sled")
        })
        .await?
    }

    async fn remove(&self, key: &[u8]) -> Result<()> {
        let tree = self.tree.clone();
        let key = key.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.remove(key.as_slice())
                .map(|_| ())
                .context("Failed to remove from sled")
        })
        .await?
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let tree = self.tree.clone();
        let prefix = prefix.to_vec();

        tokio::task::spawn_blocking(move || {
            tree.scan_prefix(&prefix)
                .map(|res| {
                    res.map(|(k, v)| (k.to_vec(), v.to_vec()))
                        .context("Sled iteration error")
                })
                .collect()
        })
        .await?
    }
}
