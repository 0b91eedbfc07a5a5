use async_trait::async_trait;
use dogpile::ports::KvStore;
use moka::future::Cache;
use shared::{Result, TtlSecs};
use std::time::{Duration, Instant};

type NamespacedKey = (String, String);

#[derive(Clone, Debug)]
struct StoredValue {
    value: String,
    deadline: Instant,
}

/// Expires every entry at the deadline carried in its value, which gives
/// moka per-entry TTLs.
struct DeadlineExpiry;

fn saturating_duration_since(current_time: Instant, target_time: Instant) -> Option<Duration> {
    Some(
        target_time
            .checked_duration_since(current_time)
            .unwrap_or_default(),
    )
}

impl moka::Expiry<NamespacedKey, StoredValue> for DeadlineExpiry {
    fn expire_after_create(
        &self,
        _key: &NamespacedKey,
        value: &StoredValue,
        current_time: Instant,
    ) -> Option<Duration> {
        saturating_duration_since(current_time, value.deadline)
    }

    fn expire_after_update(
        &self,
        _key: &NamespacedKey,
        value: &StoredValue,
        current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        saturating_duration_since(current_time, value.deadline)
    }
}

/// Moka-based in-memory store with per-entry TTL and optional size bound
pub struct MokaKvStore {
    cache: Cache<NamespacedKey, StoredValue>,
}

impl MokaKvStore {
    pub fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(DeadlineExpiry);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub fn new_unbounded() -> Self {
        Self::new("dogpile", None)
    }

    async fn insert_until(&self, namespace: &str, key: &str, value: String, deadline: Instant) {
        self.cache
            .insert(
                (namespace.to_string(), key.to_string()),
                StoredValue { value, deadline },
            )
            .await;
    }
}

#[async_trait]
impl KvStore for MokaKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let entry = self
            .cache
            .get(&(namespace.to_string(), key.to_string()))
            .await;
        // Moka checks expiry on read as well; this guards the sub-tick window
        Ok(entry
            .filter(|stored| stored.deadline > Instant::now())
            .map(|stored| stored.value))
    }

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: TtlSecs) -> Result<()> {
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl.as_duration())
            .unwrap_or_else(|| now + TtlSecs::LONG.as_duration());
        self.insert_until(namespace, key, value, deadline).await;
        Ok(())
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.cache
            .invalidate(&(namespace.to_string(), key.to_string()))
            .await;
        Ok(())
    }
}

impl std::fmt::Debug for MokaKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaKvStore")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
