use crate::domain::CacheKey;
use crate::flag::UpdatingFlag;
use shared::Result;
use std::time::Duration;
use tokio::time::{Instant, sleep};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOutcome {
    pub timed_out: bool,
    pub waited: Duration,
}

/// Bounded polling of an [`UpdatingFlag`].
///
/// Cooperative rather than notification based, so it works the same when the
/// producer lives in another process sharing the store.
#[derive(Clone)]
pub struct WaitLoop {
    flag: UpdatingFlag,
    interval: Duration,
}

impl WaitLoop {
    pub fn new(flag: UpdatingFlag, interval: Duration) -> Self {
        Self {
            flag,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the flag clears or `max_wait` elapses. A zero budget returns
    /// immediately without touching the store.
    pub async fn wait(&self, key: &CacheKey, max_wait: Duration) -> Result<WaitOutcome> {
        let started = Instant::now();
        if max_wait.is_zero() {
            return Ok(WaitOutcome {
                timed_out: false,
                waited: Duration::ZERO,
            });
        }

        loop {
            if !self.flag.get(key).await? {
                return Ok(WaitOutcome {
                    timed_out: false,
                    waited: started.elapsed(),
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return Ok(WaitOutcome {
                    timed_out: true,
                    waited: elapsed,
                });
            }

            sleep(self.interval.min(max_wait - elapsed)).await;
        }
    }
}
