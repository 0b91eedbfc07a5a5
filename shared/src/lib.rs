// shared/src/lib.rs

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid payload type: {0}")]
    InvalidPayloadType(String),
    #[error("invalid lifetime: {0}s")]
    InvalidLifetime(u64),
    #[error("storage: {0}")]
    Storage(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("config: {0}")]
    Config(String),
    /// Failure reported by a computation passed to `try_proxy`.
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live expressed in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TtlSecs(pub u64);

impl TtlSecs {
    /// Five years, used for records that must outlive any payload.
    pub const LONG: TtlSecs = TtlSecs(157_680_000);

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }

    /// Milliseconds, saturating instead of overflowing.
    pub fn as_millis(self) -> u64 {
        self.0.saturating_mul(1000)
    }
}

pub mod config;
