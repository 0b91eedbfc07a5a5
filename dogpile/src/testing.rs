use crate::ports::KvStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{Error, Result, TtlSecs};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

struct Record {
    value: String,
    ttl: TtlSecs,
    deadline: Instant,
}

/// In-memory [`KvStore`] with real expiry and failure injection.
#[derive(Default)]
pub struct MemoryKvStore {
    records: Mutex<HashMap<(String, String), Record>>,
    failing: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails with `Error::Storage` while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn ttl_of(&self, namespace: &str, key: &str) -> Option<TtlSecs> {
        self.records
            .lock()
            .get(&(namespace.to_string(), key.to_string()))
            .map(|r| r.ttl)
    }

    /// Write a record that expires after `ttl`, bypassing whole-second TTLs.
    pub fn insert_with_duration(&self, namespace: &str, key: &str, value: &str, ttl: Duration) {
        self.records.lock().insert(
            (namespace.to_string(), key.to_string()),
            Record {
                value: value.to_string(),
                ttl: TtlSecs(ttl.as_secs()),
                deadline: Instant::now() + ttl,
            },
        );
    }

    pub fn live_records(&self) -> usize {
        let now = Instant::now();
        self.records
            .lock()
            .values()
            .filter(|r| r.deadline > now)
            .count()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.check()?;
        let records = self.records.lock();
        Ok(records
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|r| r.deadline > Instant::now())
            .map(|r| r.value.clone()))
    }

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: TtlSecs) -> Result<()> {
        self.check()?;
        self.records.lock().insert(
            (namespace.to_string(), key.to_string()),
            Record {
                value,
                ttl,
                deadline: Instant::now() + ttl.as_duration(),
            },
        );
        Ok(())
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.check()?;
        self.records
            .lock()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
