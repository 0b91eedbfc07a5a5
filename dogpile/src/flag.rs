use crate::domain::CacheKey;
use crate::ports::KvStore;
use shared::{Result, TtlSecs};
use std::sync::Arc;
use tracing::warn;

const FLAG_SET: &str = "true";
const FLAG_CLEAR: &str = "false";

/// Per-key marker saying a computation is believed to be in flight.
///
/// Stored with [`TtlSecs::LONG`] so that it never lapses on its own; the
/// protocol is responsible for clearing it.
#[derive(Clone)]
pub struct UpdatingFlag {
    store: Arc<dyn KvStore>,
}

impl UpdatingFlag {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn set(&self, key: &CacheKey, flag: bool) -> Result<()> {
        let value = if flag { FLAG_SET } else { FLAG_CLEAR };
        self.store
            .set(&key.flag_namespace(), &key.id, value.to_string(), TtlSecs::LONG)
            .await
    }

    /// Anything other than an explicit set reads as false.
    pub async fn get(&self, key: &CacheKey) -> Result<bool> {
        let value = self.store.get(&key.flag_namespace(), &key.id).await?;
        Ok(value.as_deref() == Some(FLAG_SET))
    }

    pub async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.store.remove(&key.flag_namespace(), &key.id).await
    }

    /// Set the flag and return a guard that clears it again if dropped
    /// before [`RaisedFlag::disarm`] is called.
    pub async fn raise(&self, key: &CacheKey) -> Result<RaisedFlag> {
        self.set(key, true).await?;
        Ok(RaisedFlag {
            flag: self.clone(),
            key: key.clone(),
            armed: true,
        })
    }
}

/// An updating flag owned by the current producer.
///
/// Dropping it while armed (the producer's future was cancelled) schedules
/// a clear on the current tokio runtime.
pub struct RaisedFlag {
    flag: UpdatingFlag,
    key: CacheKey,
    armed: bool,
}

impl RaisedFlag {
    /// The flag has been cleared through the normal path.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RaisedFlag {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to clear updating flag of {}", self.key);
            return;
        };

        let flag = self.flag.clone();
        let key = self.key.clone();
        handle.spawn(async move {
            match flag.set(&key, false).await {
                Ok(()) => warn!("Producer of {} was cancelled, cleared its updating flag", key),
                Err(e) => warn!("Could not clear updating flag of cancelled {}: {}", key, e),
            }
        });
    }
}
