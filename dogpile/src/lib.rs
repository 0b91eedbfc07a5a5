//! Stampede-protected cache coordination over a pluggable key/value store.
//!
//! At most one caller recomputes a stale or missing entry; concurrent callers
//! either wait a bounded time, accept the previous value, or get an
//! "updating" result. See [`CacheCoordinator`] for the protocol.

pub mod coordinator;
pub mod domain;
pub mod entry;
pub mod events;
pub mod flag;
pub mod flight;
pub mod ports;
pub mod wait;

#[cfg(test)]
mod testing;

pub use coordinator::{CacheCoordinator, CoordinatorBuilder};
pub use domain::{CacheItemResult, CacheKey};
pub use events::CoordinatorEvent;
pub use ports::{ConfigProvider, FixedTtl, KvStore};
