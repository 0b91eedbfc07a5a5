use async_trait::async_trait;
use dogpile::ports::KvStore;
use serde::{Deserialize, Serialize};
use shared::{Error, Result, TtlSecs};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    value: String,
    expires_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Sled-backed store that survives restarts; one tree per namespace.
///
/// Expired records are treated as absent and deleted on the read that
/// notices them.
#[derive(Clone)]
pub struct SledKvStore {
    db: sled::Db,
}

impl SledKvStore {
    /// Open (or create) the database, creating the parent directory if needed
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;

        Ok(Self { db })
    }

    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn tree(&self, namespace: &str) -> Result<sled::Tree> {
        self.db
            .open_tree(namespace)
            .map_err(|e| Error::Storage(format!("Failed to open tree '{}': {}", namespace, e)))
    }

    /// Like [`tree`](Self::tree) but never creates one, so lookups in
    /// groups that were never written leave no trace on disk.
    fn existing_tree(&self, namespace: &str) -> Result<Option<sled::Tree>> {
        let exists = self
            .db
            .tree_names()
            .iter()
            .any(|name| &name[..] == namespace.as_bytes());
        if !exists {
            return Ok(None);
        }
        self.tree(namespace).map(Some)
    }

    fn put_record(&self, namespace: &str, key: &str, record: &StoredRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| Error::Storage(format!("Failed to serialize record: {}", e)))?;
        self.tree(namespace)?
            .insert(key.as_bytes(), bytes)
            .map_err(|e| Error::Storage(format!("Failed to write record: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for SledKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let Some(tree) = self.existing_tree(namespace)? else {
            return Ok(None);
        };
        let Some(bytes) = tree
            .get(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to read record: {}", e)))?
        else {
            return Ok(None);
        };

        let record: StoredRecord = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Storage(format!("Failed to deserialize record: {}", e)))?;

        if record.expires_at_ms <= now_ms() {
            // Only drop the record if nobody rewrote it meanwhile
            let _ = tree
                .compare_and_swap(key.as_bytes(), Some(bytes), None as Option<&[u8]>)
                .map_err(|e| Error::Storage(format!("Failed to expire record: {}", e)))?;
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: TtlSecs) -> Result<()> {
        let record = StoredRecord {
            value,
            expires_at_ms: now_ms().saturating_add(ttl.as_millis()),
        };
        self.put_record(namespace, key, &record)
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let Some(tree) = self.existing_tree(namespace)? else {
            return Ok(());
        };
        tree.remove(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to delete record: {}", e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for SledKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledKvStore")
            .field("trees", &self.db.tree_names().len())
            .finish()
    }
}
