//! Fixed-window rate limiting keyed by caller identity. The window length
//! comes from the request's resolved token class, so limits self-adjust with
//! cache freshness.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Counters idle for this many of their own windows get swept.
const IDLE_WINDOWS: u32 = 3;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { retry_after_secs: u64 },
}

struct WindowCounter {
    count: u32,
    window_start: Instant,
    window: Duration,
    last_access: Instant,
}

pub struct RateLimiter {
    counters: Arc<DashMap<String, WindowCounter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
        }
    }

    /// Count one request against `identity`. The counter resets whenever a
    /// full window has elapsed since it started; within a window the count
    /// is capped at quota + 1 so rejected callers cannot grow it unboundedly.
    pub fn check(&self, identity: &str, window_secs: u64, quota: u32) -> Decision {
        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let mut counter = self
            .counters
            .entry(identity.to_string())
            .or_insert_with(|| WindowCounter {
                count: 0,
                window_start: now,
                window,
                last_access: now,
            });

        counter.last_access = now;
        counter.window = window;

        if now.duration_since(counter.window_start) >= window {
            counter.count = 0;
            counter.window_start = now;
        }

        if counter.count < quota + 1 {
            counter.count += 1;
        }

        if counter.count <= quota {
            Decision::Allow
        } else {
            Decision::Reject {
                retry_after_secs: window_secs,
            }
        }
    }

    /// Periodically drop counters nobody has touched for a few windows.
    pub fn start_cleanup_task(&self) {
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                interval.tick().await;

                let now = Instant::now();
                counters.retain(|_, counter| {
                    now.duration_since(counter.last_access) < counter.window * IDLE_WINDOWS
                });
            }
        });
    }

    #[cfg(test)]
    fn counter_count(&self) -> usize {
        self.counters.len()
    }
}
