#![deny(clippy::all)]

use async_trait::async_trait;
use shared::config::Config;
use shared::{Result, TtlSecs};

// Ports are the pluggable extension points the coordinator is built on

/// Port for the key/value backend holding payloads, lifetimes and flags.
///
/// Implementations own the conversion from seconds to their native TTL unit.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    async fn set(&self, namespace: &str, key: &str, value: String, ttl: TtlSecs) -> Result<()>;
    async fn contains(&self, namespace: &str, key: &str) -> Result<bool>;
    async fn remove(&self, namespace: &str, key: &str) -> Result<()>;
}

/// Port for the process-wide default lifetime.
pub trait ConfigProvider: Send + Sync + 'static {
    fn default_ttl_secs(&self) -> TtlSecs;
}

impl ConfigProvider for Config {
    fn default_ttl_secs(&self) -> TtlSecs {
        self.default_ttl
    }
}

/// Constant default lifetime, for callers without an env config.
#[derive(Clone, Copy, Debug)]
pub struct FixedTtl(pub TtlSecs);

impl ConfigProvider for FixedTtl {
    fn default_ttl_secs(&self) -> TtlSecs {
        self.0
    }
}
