use crate::domain::CacheKey;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = Arc<DashMap<CacheKey, Arc<Mutex<()>>>>;

/// In-process per-key mutex table used to coalesce producers that share an
/// address space. Cross-process callers still go through the updating flag.
#[derive(Clone, Default)]
pub struct LocalFlights {
    slots: Slots,
}

/// Held by the single in-process producer of a key.
pub struct FlightGuard {
    key: CacheKey,
    slots: Slots,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LocalFlights {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.slots.entry(key.clone()).or_default().clone()
    }

    /// Claim the key without waiting.
    pub fn try_acquire(&self, key: &CacheKey) -> Option<FlightGuard> {
        let guard = self.slot(key).try_lock_owned().ok()?;
        Some(self.guard(key, guard))
    }

    /// Claim the key, giving up after `deadline`.
    pub async fn acquire(&self, key: &CacheKey, deadline: Duration) -> Option<FlightGuard> {
        let slot = self.slot(key);
        match tokio::time::timeout(deadline, slot.lock_owned()).await {
            Ok(guard) => Some(self.guard(key, guard)),
            Err(_) => {
                self.slots
                    .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
                None
            }
        }
    }

    /// Keys with a producer or waiters in this process.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    fn guard(&self, key: &CacheKey, guard: OwnedMutexGuard<()>) -> FlightGuard {
        FlightGuard {
            key: key.clone(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references an idle slot
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl std::fmt::Debug for LocalFlights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFlights")
            .field("in_flight", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_claim_fails_while_held() {
        let flights = LocalFlights::new();
        let key = CacheKey::new("g", "1");

        let first = flights.try_acquire(&key).unwrap();
        assert!(flights.try_acquire(&key).is_none());
        assert!(flights.try_acquire(&CacheKey::new("g", "2")).is_some());

        drop(first);
        assert!(flights.try_acquire(&key).is_some());
    }

    #[tokio::test]
    async fn test_acquire_respects_deadline() {
        let flights = LocalFlights::new();
        let key = CacheKey::new("g", "1");
        let _held = flights.try_acquire(&key).unwrap();

        assert!(flights.acquire(&key, Duration::from_millis(30)).await.is_none());
    }

    #[tokio::test]
    async fn test_waiter_gets_slot_after_release() {
        let flights = LocalFlights::new();
        let key = CacheKey::new("g", "1");
        let held = flights.try_acquire(&key).unwrap();

        let waiter = {
            let flights = flights.clone();
            let key = key.clone();
            tokio::spawn(async move { flights.acquire(&key, Duration::from_secs(2)).await.is_some() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_idle_slots_are_released() {
        let flights = LocalFlights::new();
        let guard = flights.try_acquire(&CacheKey::new("g", "1")).unwrap();
        assert_eq!(flights.in_flight(), 1);
        drop(guard);
        assert_eq!(flights.in_flight(), 0);
    }
}
