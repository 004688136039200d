//! Rate Limiter
//!
//! Fixed-budget windows per key. A window opens on the first request for a key
//! and admits `max_requests` until `window` has elapsed.

use dashmap::DashMap;
use ingest_core::RateLimitConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Buckets beyond this count trigger a sweep of expired windows
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct RateLimiter {
    limits: Arc<DashMap<String, RateBucket>>,
    max_requests: u64,
    window: Duration,
}

struct RateBucket {
    count: u64,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            limits: Arc::new(DashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window_secs)
    }

    /// Count a request against `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        if self.limits.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.limits.entry(key.to_string()).or_insert(RateBucket {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        // Rejected requests do not consume budget
        if entry.count >= self.max_requests {
            return RateLimitResult::Exceeded {
                retry_after: self.window.as_secs(),
            };
        }

        entry.count += 1;
        RateLimitResult::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop buckets whose window has closed
    pub fn prune(&self, now: Instant) {
        let window = self.window;
        self.limits
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < window);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u64 },
    Exceeded { retry_after: u64 },
}
