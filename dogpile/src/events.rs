use crate::domain::CacheKey;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    Stored(EntryStoredEvent),
    Removed(EntryRemovedEvent),
    FlagRecovered(FlagRecoveredEvent),
}

impl CoordinatorEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            CoordinatorEvent::Stored(e) => &e.key,
            CoordinatorEvent::Removed(e) => &e.key,
            CoordinatorEvent::FlagRecovered(e) => &e.key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorEvent::Stored(_) => "stored",
            CoordinatorEvent::Removed(_) => "removed",
            CoordinatorEvent::FlagRecovered(_) => "flag_recovered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryStoredEvent {
    pub key: CacheKey,
    pub value_size: usize,
    pub lifetime_secs: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRemovedEvent {
    pub key: CacheKey,
    pub timestamp: u64,
}

/// A waiter gave up on an in-flight producer and cleared its flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRecoveredEvent {
    pub key: CacheKey,
    pub waited_ms: u64,
    pub timestamp: u64,
}

/// Seconds since UNIX epoch, zero if the clock is before it
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
