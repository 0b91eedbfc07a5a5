use crate::domain::{CacheItemResult, CacheKey};
use crate::entry::EntryStore;
use crate::events::{
    CoordinatorEvent, EntryRemovedEvent, EntryStoredEvent, FlagRecoveredEvent, now_timestamp,
};
use crate::flag::UpdatingFlag;
use crate::flight::{FlightGuard, LocalFlights};
use crate::ports::{ConfigProvider, KvStore};
use crate::wait::{DEFAULT_POLL_INTERVAL, WaitLoop};
use shared::{Error, Result, TtlSecs};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Stampede-protected access to a [`KvStore`].
///
/// All coordination state lives in the store, so several processes sharing
/// one store cooperate through the updating flag. Callers inside one process
/// are additionally coalesced through [`LocalFlights`] unless disabled.
#[derive(Clone)]
pub struct CacheCoordinator {
    entries: EntryStore,
    flag: UpdatingFlag,
    waiter: WaitLoop,
    config: Arc<dyn ConfigProvider>,
    flights: Option<LocalFlights>,
    event_broadcaster: Option<broadcast::Sender<CoordinatorEvent>>,
}

pub struct CoordinatorBuilder {
    store: Arc<dyn KvStore>,
    config: Arc<dyn ConfigProvider>,
    poll_interval: Duration,
    local_coalescing: bool,
    event_broadcaster: Option<broadcast::Sender<CoordinatorEvent>>,
}

impl CoordinatorBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Coalesce producers of the same key within this process (on by default).
    pub fn local_coalescing(mut self, enabled: bool) -> Self {
        self.local_coalescing = enabled;
        self
    }

    pub fn event_broadcaster(mut self, broadcaster: broadcast::Sender<CoordinatorEvent>) -> Self {
        self.event_broadcaster = Some(broadcaster);
        self
    }

    pub fn build(self) -> CacheCoordinator {
        let flag = UpdatingFlag::new(self.store.clone());
        CacheCoordinator {
            entries: EntryStore::new(self.store),
            waiter: WaitLoop::new(flag.clone(), self.poll_interval),
            flag,
            config: self.config,
            flights: self.local_coalescing.then(LocalFlights::new),
            event_broadcaster: self.event_broadcaster,
        }
    }
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn KvStore>, config: Arc<dyn ConfigProvider>) -> Self {
        Self::builder(store, config).build()
    }

    pub fn builder(store: Arc<dyn KvStore>, config: Arc<dyn ConfigProvider>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            store,
            config,
            poll_interval: DEFAULT_POLL_INTERVAL,
            local_coalescing: true,
            event_broadcaster: None,
        }
    }

    /// Read an entry, waiting up to `wait` for an in-flight producer.
    ///
    /// When the wait budget runs out the flag is force-cleared and a
    /// timed-out result is returned without reading the payload.
    pub async fn get(&self, key: &CacheKey, wait: Duration) -> Result<CacheItemResult> {
        if !wait.is_zero() {
            let outcome = self.waiter.wait(key, wait).await?;
            if outcome.timed_out {
                self.recover_flag(key, outcome.waited).await?;
                return Ok(CacheItemResult::timed_out());
            }
        }

        let payload = self.entries.payload(key).await?;
        let is_updating = self.flag.get(key).await?;
        Ok(CacheItemResult::new(payload, is_updating, false))
    }

    /// Store `data` for `lifetime` seconds (or the configured default) and
    /// clear the updating flag.
    pub async fn set(
        &self,
        key: &CacheKey,
        data: impl Into<String>,
        lifetime: Option<TtlSecs>,
    ) -> Result<()> {
        let lifetime = self.resolve_lifetime(lifetime)?;
        self.store_entry(key, data.into(), lifetime).await
    }

    /// Like [`set`](Self::set) for payloads that arrive as raw bytes.
    pub async fn set_raw(&self, key: &CacheKey, data: &[u8], lifetime: Option<TtlSecs>) -> Result<()> {
        let data = std::str::from_utf8(data).map_err(|e| {
            Error::InvalidPayloadType(format!("payload for '{}' is not a UTF-8 string: {}", key, e))
        })?;
        self.set(key, data, lifetime).await
    }

    pub async fn set_updating_flag(&self, key: &CacheKey, flag: bool) -> Result<()> {
        self.flag.set(key, flag).await
    }

    pub async fn get_updating_flag(&self, key: &CacheKey) -> Result<bool> {
        self.flag.get(key).await
    }

    /// Drop payload, lifetime and flag of a key.
    pub async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.entries.remove(key).await?;
        self.flag.remove(key).await?;
        self.broadcast(CoordinatorEvent::Removed(EntryRemovedEvent {
            key: key.clone(),
            timestamp: now_timestamp(),
        }));
        Ok(())
    }

    /// Return the cached value, computing it at most once across concurrent
    /// callers when it is missing or stale.
    pub async fn proxy<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
        lifetime: Option<TtlSecs>,
        wait: Duration,
    ) -> Result<CacheItemResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        self.try_proxy(key, || async move { Ok(compute().await) }, lifetime, wait)
            .await
    }

    /// [`proxy`](Self::proxy) with a fallible computation. A failed
    /// computation stores nothing and releases the updating flag.
    pub async fn try_proxy<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
        lifetime: Option<TtlSecs>,
        wait: Duration,
    ) -> Result<CacheItemResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let lifetime = self.resolve_lifetime(lifetime)?;

        let result = self.get(key, wait).await?;
        if result.is_valid || result.is_timeout {
            return Ok(result);
        }
        if wait.is_zero() && result.is_updating {
            debug!("{} is being updated elsewhere, returning stale result", key);
            return Ok(result);
        }

        let flight = match self.claim_flight(key, wait, result).await? {
            FlightClaim::Claimed(guard) => guard,
            FlightClaim::Settled(result) => return Ok(result),
        };

        // Clears the flag even if this future is dropped mid-computation
        let raised = self.flag.raise(key).await?;
        debug!("Computing {}", key);

        let stored = match compute().await {
            Ok(data) => self.store_entry(key, data, lifetime).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            warn!("Update of {} failed: {}", key, e);
            match self.flag.set(key, false).await {
                Ok(()) => raised.disarm(),
                Err(clear_err) => warn!("Could not clear updating flag of {}: {}", key, clear_err),
            }
            return Err(e);
        }
        raised.disarm();
        drop(flight);

        self.get(key, wait).await
    }

    /// Serialize in-process producers of `key`. Returns a settled result when
    /// this caller must not compute.
    async fn claim_flight(
        &self,
        key: &CacheKey,
        wait: Duration,
        stale: CacheItemResult,
    ) -> Result<FlightClaim> {
        let Some(flights) = &self.flights else {
            return Ok(FlightClaim::Claimed(None));
        };

        if let Some(guard) = flights.try_acquire(key) {
            return Ok(FlightClaim::Claimed(Some(guard)));
        }
        if wait.is_zero() {
            debug!("{} is being computed in this process, returning stale result", key);
            return Ok(FlightClaim::Settled(stale));
        }

        match flights.acquire(key, wait).await {
            Some(guard) => {
                // The previous producer has most likely stored a fresh value
                let result = self.get(key, wait).await?;
                if result.is_valid || result.is_timeout {
                    Ok(FlightClaim::Settled(result))
                } else {
                    Ok(FlightClaim::Claimed(Some(guard)))
                }
            }
            None => {
                self.recover_flag(key, wait).await?;
                Ok(FlightClaim::Settled(CacheItemResult::timed_out()))
            }
        }
    }

    fn resolve_lifetime(&self, lifetime: Option<TtlSecs>) -> Result<TtlSecs> {
        let lifetime = lifetime.unwrap_or_else(|| self.config.default_ttl_secs());
        if lifetime.0 < 1 || lifetime > TtlSecs::LONG {
            return Err(Error::InvalidLifetime(lifetime.0));
        }
        Ok(lifetime)
    }

    async fn store_entry(&self, key: &CacheKey, data: String, lifetime: TtlSecs) -> Result<()> {
        let value_size = data.len();
        self.entries.write(key, data, lifetime).await?;
        self.flag.set(key, false).await?;

        self.broadcast(CoordinatorEvent::Stored(EntryStoredEvent {
            key: key.clone(),
            value_size,
            lifetime_secs: lifetime.0,
            timestamp: now_timestamp(),
        }));
        Ok(())
    }

    async fn recover_flag(&self, key: &CacheKey, waited: Duration) -> Result<()> {
        warn!(
            "Gave up waiting on {} after {:?}, clearing its updating flag",
            key, waited
        );
        self.flag.set(key, false).await?;

        self.broadcast(CoordinatorEvent::FlagRecovered(FlagRecoveredEvent {
            key: key.clone(),
            waited_ms: waited.as_millis() as u64,
            timestamp: now_timestamp(),
        }));
        Ok(())
    }

    fn broadcast(&self, event: CoordinatorEvent) {
        let Some(ref broadcaster) = self.event_broadcaster else {
            return;
        };
        let kind = event.kind();
        let key = event.key().clone();

        match broadcaster.send(event) {
            Ok(subscriber_count) => {
                debug!(
                    "Broadcasted {} event for {} to {} subscriber(s)",
                    kind, key, subscriber_count
                );
            }
            Err(_) => {
                debug!("No subscribers for {} event on {}", kind, key);
            }
        }
    }
}

enum FlightClaim {
    Claimed(Option<FlightGuard>),
    Settled(CacheItemResult),
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("poll_interval", &self.waiter.interval())
            .field("flights", &self.flights)
            .field("events", &self.event_broadcaster.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedTtl;
    use crate::testing::MemoryKvStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const WAIT: Duration = Duration::from_secs(2);

    async fn never_called() -> String {
        panic!("compute must not run")
    }

    fn coordinator(store: Arc<MemoryKvStore>) -> CacheCoordinator {
        CacheCoordinator::builder(store, Arc::new(FixedTtl(TtlSecs(60))))
            .poll_interval(Duration::from_millis(10))
            .build()
    }

    #[tokio::test]
    async fn test_get_never_written_key() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let result = cache.get(&CacheKey::new("g", "missing"), Duration::ZERO).await.unwrap();
        assert!(!result.is_valid);
        assert!(!result.is_updating);
        assert!(!result.is_timeout);
        assert_eq!(result.data, "");
    }

    #[tokio::test]
    async fn test_set_then_get_until_expiry() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");

        cache.set(&key, "v", Some(TtlSecs(10))).await.unwrap();
        let result = cache.get(&key, Duration::ZERO).await.unwrap();
        assert!(result.is_valid);
        assert_eq!(result.data, "v");

        // Shorten the payload record to simulate the lifetime lapsing
        store.insert_with_duration("g", "1", "v", Duration::from_millis(20));
        sleep(Duration::from_millis(40)).await;
        let result = cache.get(&key, Duration::ZERO).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.data, "");
    }

    #[tokio::test]
    async fn test_round_trip_across_lifetime_range() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let cases = [
            ("min", "", TtlSecs(1)),
            ("unicode", "héllo wörld ✓", TtlSecs(3600)),
            ("max", "five years", TtlSecs::LONG),
        ];

        for (id, data, ttl) in cases {
            let key = CacheKey::new("rt", id);
            cache.set(&key, data, Some(ttl)).await.unwrap();
            let result = cache.get(&key, Duration::ZERO).await.unwrap();
            assert!(result.is_valid, "{} should be valid", id);
            assert_eq!(result.data, data);
        }
    }

    #[tokio::test]
    async fn test_set_uses_default_lifetime_and_clears_flag() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");

        cache.set_updating_flag(&key, true).await.unwrap();
        cache.set(&key, "v", None).await.unwrap();

        assert_eq!(store.ttl_of("g", "1"), Some(TtlSecs(60)));
        assert!(!cache.get_updating_flag(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_input() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");

        let err = cache.set_raw(&key, &[0xff, 0xfe], Some(TtlSecs(10))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPayloadType(_)));

        let err = cache.set(&key, "v", Some(TtlSecs(0))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidLifetime(0)));

        let err = cache
            .set(&key, "v", Some(TtlSecs(TtlSecs::LONG.0 + 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLifetime(_)));

        assert_eq!(store.live_records(), 0);

        cache.set_raw(&key, "ok".as_bytes(), Some(TtlSecs(10))).await.unwrap();
        assert_eq!(cache.get(&key, Duration::ZERO).await.unwrap().data, "ok");
    }

    #[tokio::test]
    async fn test_zero_default_lifetime_in_env_is_ignored() {
        let store = Arc::new(MemoryKvStore::new());
        let config = shared::config::Config::from_lookup(|name| {
            (name == "DOGPILE_DEFAULT_TTL_SECS").then(|| "0".to_string())
        });
        let cache = CacheCoordinator::new(store.clone(), Arc::new(config));
        let key = CacheKey::new("g", "1");

        cache.set(&key, "v", None).await.unwrap();
        assert_eq!(store.ttl_of("g", "1"), Some(TtlSecs(900)));
    }

    #[tokio::test]
    async fn test_remove_then_get() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");

        cache.set(&key, "v", Some(TtlSecs(10))).await.unwrap();
        cache.remove(&key).await.unwrap();

        let result = cache.get(&key, Duration::ZERO).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.data, "");
        assert_eq!(store.live_records(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_proxy_computes_once() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("g", "hot");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .proxy(
                        &key,
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(100)).await;
                            "expensive".to_string()
                        },
                        Some(TtlSecs(60)),
                        WAIT,
                    )
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert!(result.is_valid);
            assert_eq!(result.data, "expensive");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_proxy_without_wait_skips_inflight_key() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store);
        let key = CacheKey::new("g", "1");
        let calls = AtomicUsize::new(0);

        cache.set(&key, "old", Some(TtlSecs(60))).await.unwrap();
        cache.set_updating_flag(&key, true).await.unwrap();

        let result = cache
            .proxy(
                &key,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "new".to_string()
                },
                None,
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!result.is_valid);
        assert!(result.is_updating);
        assert_eq!(result.data, "old");
    }

    #[tokio::test]
    async fn test_stuck_flag_times_out_and_recovers() {
        let (tx, mut rx) = broadcast::channel(16);
        let cache = CacheCoordinator::builder(
            Arc::new(MemoryKvStore::new()),
            Arc::new(FixedTtl(TtlSecs(60))),
        )
        .poll_interval(Duration::from_millis(10))
        .event_broadcaster(tx)
        .build();
        let key = CacheKey::new("g", "crashed");

        // A producer that set the flag and never called set
        cache.set_updating_flag(&key, true).await.unwrap();

        let result = cache.get(&key, Duration::from_millis(100)).await.unwrap();
        assert!(result.is_timeout);
        assert!(!result.is_valid);
        assert_eq!(result.data, "");

        assert!(!cache.get_updating_flag(&key).await.unwrap());
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, CoordinatorEvent::FlagRecovered(ref e) if e.waited_ms >= 100));
    }

    #[tokio::test]
    async fn test_proxy_timeout_does_not_compute() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let key = CacheKey::new("g", "1");
        cache.set_updating_flag(&key, true).await.unwrap();

        let result = cache
            .proxy(
                &key,
                never_called,
                None,
                Duration::from_millis(50),
            )
            .await
            .unwrap();

        assert!(result.is_timeout);
        assert!(!cache.get_updating_flag(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_proxy_releases_flag() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let key = CacheKey::new("g", "slow");
        let calls = AtomicUsize::new(0);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            cache.proxy(
                &key,
                || async {
                    sleep(Duration::from_secs(10)).await;
                    "too late".to_string()
                },
                None,
                WAIT,
            ),
        )
        .await;
        assert!(cancelled.is_err());

        // The clear is scheduled on the runtime when the producer is dropped
        sleep(Duration::from_millis(20)).await;
        assert!(!cache.get_updating_flag(&key).await.unwrap());

        let result = cache
            .proxy(
                &key,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "fresh".to_string()
                },
                None,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_valid);
        assert_eq!(result.data, "fresh");
    }

    #[tokio::test]
    async fn test_zero_wait_skips_key_computed_in_process() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let key = CacheKey::new("g", "1");
        // Another task of this process owns the key; the store flag is untouched
        let _producer = cache.flights.as_ref().unwrap().try_acquire(&key).unwrap();

        let result = cache
            .proxy(&key, never_called, None, Duration::ZERO)
            .await
            .unwrap();

        assert!(!result.is_valid);
        assert!(!result.is_updating);
        assert!(!result.is_timeout);
        assert_eq!(result.data, "");
        assert!(!cache.get_updating_flag(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_lock_deadline_times_out_and_recovers() {
        let (tx, mut rx) = broadcast::channel(16);
        let cache = CacheCoordinator::builder(
            Arc::new(MemoryKvStore::new()),
            Arc::new(FixedTtl(TtlSecs(60))),
        )
        .poll_interval(Duration::from_millis(10))
        .event_broadcaster(tx)
        .build();
        let key = CacheKey::new("g", "1");
        let _producer = cache.flights.as_ref().unwrap().try_acquire(&key).unwrap();

        let result = cache
            .proxy(&key, never_called, None, Duration::from_millis(50))
            .await
            .unwrap();

        assert!(result.is_timeout);
        assert!(!result.is_valid);
        assert_eq!(result.data, "");
        assert!(!cache.get_updating_flag(&key).await.unwrap());

        match rx.recv().await.unwrap() {
            CoordinatorEvent::FlagRecovered(e) => {
                assert_eq!(e.key, key);
                assert_eq!(e.waited_ms, 50);
            }
            other => panic!("expected flag recovered event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_proxy_waits_for_remote_producer() {
        let cache = coordinator(Arc::new(MemoryKvStore::new()));
        let key = CacheKey::new("g", "1");
        cache.set_updating_flag(&key, true).await.unwrap();

        let producer = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                cache.set(&key, "from-producer", None).await.unwrap();
            })
        };

        let result = cache
            .proxy(&key, never_called, None, WAIT)
            .await
            .unwrap();
        producer.await.unwrap();

        assert!(result.is_valid);
        assert_eq!(result.data, "from-producer");
    }

    #[tokio::test]
    async fn test_flag_protocol_without_local_coalescing() {
        let cache = CacheCoordinator::builder(
            Arc::new(MemoryKvStore::new()),
            Arc::new(FixedTtl(TtlSecs(60))),
        )
        .poll_interval(Duration::from_millis(10))
        .local_coalescing(false)
        .build();
        let key = CacheKey::new("g", "1");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache
                .proxy(
                    &key,
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "v".to_string()
                    },
                    None,
                    WAIT,
                )
                .await
                .unwrap();
            assert!(result.is_valid);
            assert_eq!(result.data, "v");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_releases_flag() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");

        let err = cache
            .try_proxy(
                &key,
                || async { Err(Error::Internal("backend down".to_string())) },
                None,
                WAIT,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert!(!cache.get_updating_flag(&key).await.unwrap());
        assert!(!cache.get(&key, Duration::ZERO).await.unwrap().is_valid);
    }

    #[tokio::test]
    async fn test_storage_errors_are_propagated() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = coordinator(store.clone());
        let key = CacheKey::new("g", "1");
        store.set_failing(true);

        assert!(matches!(
            cache.get(&key, Duration::ZERO).await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            cache.set(&key, "v", None).await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            cache.proxy(&key, || async { "v".to_string() }, None, WAIT).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_store_and_remove_events() {
        let (tx, mut rx) = broadcast::channel(16);
        let cache = CacheCoordinator::builder(
            Arc::new(MemoryKvStore::new()),
            Arc::new(FixedTtl(TtlSecs(60))),
        )
        .event_broadcaster(tx)
        .build();
        let key = CacheKey::new("g", "1");

        cache.set(&key, "four", None).await.unwrap();
        cache.remove(&key).await.unwrap();

        match rx.recv().await.unwrap() {
            CoordinatorEvent::Stored(e) => {
                assert_eq!(e.key, key);
                assert_eq!(e.value_size, 4);
                assert_eq!(e.lifetime_secs, 60);
            }
            other => panic!("expected stored event, got {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), CoordinatorEvent::Removed(_)));
    }
}
