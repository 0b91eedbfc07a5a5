use crate::{Error, TtlSecs};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Backing store used by the server binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sled,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "moka" => Ok(StoreBackend::Memory),
            "sled" => Ok(StoreBackend::Sled),
            other => Err(Error::Config(format!("unknown store backend '{}'", other))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub tcp_port: u16,
    pub store: StoreBackend,
    pub data_dir: String,
    pub max_entries: Option<u64>,
    pub default_ttl: TtlSecs,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            tcp_port: Self::DEFAULT_TCP_PORT,
            store: StoreBackend::Memory,
            data_dir: Self::DEFAULT_DATA_DIR.to_string(),
            max_entries: None,
            default_ttl: TtlSecs(Self::DEFAULT_TTL_SECS),
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl Config {
    const DEFAULT_HOST: &str = "127.0.0.1";
    const DEFAULT_TCP_PORT: u16 = 5600;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_TTL_SECS: u64 = 900;
    const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Unparsable values
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let store = match lookup("DOGPILE_STORE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, using in-memory store", e);
                defaults.store
            }),
            None => defaults.store,
        };

        Self {
            host: lookup("DOGPILE_HOST").unwrap_or(defaults.host),
            tcp_port: parse_or(&lookup, "DOGPILE_TCP_PORT", defaults.tcp_port),
            store,
            data_dir: lookup("DOGPILE_DATA_DIR").unwrap_or(defaults.data_dir),
            max_entries: lookup("DOGPILE_MAX_ENTRIES").and_then(|raw| match raw.parse() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("DOGPILE_MAX_ENTRIES='{}' is not a number, leaving store unbounded", raw);
                    None
                }
            }),
            default_ttl: default_ttl(&lookup, defaults.default_ttl),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "DOGPILE_POLL_INTERVAL_MS",
                Self::DEFAULT_POLL_INTERVAL_MS,
            )),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }
}

/// Lifetimes outside `1..=LONG` would make every defaulted write fail.
fn default_ttl(lookup: &impl Fn(&str) -> Option<String>, default: TtlSecs) -> TtlSecs {
    let ttl = TtlSecs(parse_or(lookup, "DOGPILE_DEFAULT_TTL_SECS", default.0));
    if ttl.0 < 1 || ttl > TtlSecs::LONG {
        warn!(
            "DOGPILE_DEFAULT_TTL_SECS={} is outside 1..={}, using default {}",
            ttl.0,
            TtlSecs::LONG.0,
            default.0
        );
        return default;
    }
    ttl
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}='{}' is invalid, using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}
