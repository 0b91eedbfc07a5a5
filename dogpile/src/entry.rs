use crate::domain::CacheKey;
use crate::ports::KvStore;
use shared::{Result, TtlSecs};
use std::sync::Arc;
use tracing::debug;

/// The (lifetime, payload) pair of a cache key, kept as two records.
///
/// The lifetime record is written with [`TtlSecs::LONG`] and survives the
/// payload; the payload is written with the lifetime itself, so its presence
/// is what makes an entry fresh.
#[derive(Clone)]
pub struct EntryStore {
    store: Arc<dyn KvStore>,
}

impl EntryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Lifetime chosen at the last write. Missing, unparsable and zero
    /// lifetimes all read as `None`.
    pub async fn lifetime(&self, key: &CacheKey) -> Result<Option<TtlSecs>> {
        let raw = self.store.get(&key.lifetime_namespace(), &key.id).await?;
        Ok(raw
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs >= 1)
            .map(TtlSecs))
    }

    /// Payload if the entry is fresh.
    pub async fn payload(&self, key: &CacheKey) -> Result<Option<String>> {
        if self.lifetime(key).await?.is_none() {
            return Ok(None);
        }

        let namespace = key.payload_namespace();
        if !self.store.contains(namespace, &key.id).await? {
            return Ok(None);
        }
        // May still come back empty if the payload expired since the probe
        self.store.get(namespace, &key.id).await
    }

    pub async fn write(&self, key: &CacheKey, data: String, lifetime: TtlSecs) -> Result<()> {
        debug!("Writing entry {} ({} bytes, lifetime {}s)", key, data.len(), lifetime.0);
        self.store
            .set(
                &key.lifetime_namespace(),
                &key.id,
                lifetime.0.to_string(),
                TtlSecs::LONG,
            )
            .await?;
        self.store
            .set(key.payload_namespace(), &key.id, data, lifetime)
            .await
    }

    pub async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.store.remove(key.payload_namespace(), &key.id).await?;
        self.store.remove(&key.lifetime_namespace(), &key.id).await
    }
}
