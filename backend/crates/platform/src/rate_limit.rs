//! Rate Limiting Infrastructure
//!
//! Per-key sliding-window limiter. Each key keeps the timestamps of its
//! accepted actions inside the trailing window; anything at or before
//! `now - window` no longer counts and is pruned on the next touch or by the
//! background sweep.
//!
//! State is process-local. Several processes each enforce their own limit,
//! which makes the limit best-effort per process.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::sweep::Sweepable;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// Zero when allowed
    pub retry_after: Duration,
}

/// Sliding-window limiter keyed by an arbitrary string
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check `key` and record the action if it is allowed.
    pub fn is_allowed(&self, key: &str) -> RateLimitResult {
        self.is_allowed_at(key, Instant::now())
    }

    pub fn is_allowed_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let limit = self.config.max_requests as usize;
        let window_start = now.checked_sub(self.config.window);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let timestamps = entries.entry(key.to_owned()).or_default();
        prune(timestamps, window_start);

        if timestamps.len() < limit {
            timestamps.push_back(now);
            return RateLimitResult {
                allowed: true,
                remaining: (limit - timestamps.len()) as u32,
                retry_after: Duration::ZERO,
            };
        }

        // limit == 0 leaves the deque empty; wait a full window
        let retry_after = match timestamps.front() {
            Some(oldest) => (*oldest + self.config.window).saturating_duration_since(now),
            None => self.config.window,
        };

        RateLimitResult {
            allowed: false,
            remaining: 0,
            retry_after,
        }
    }

    /// Forget everything recorded for `key`.
    pub fn reset(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Prune expired timestamps everywhere and drop keys left empty.
    /// Returns the number of keys dropped.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let window_start = now.checked_sub(self.config.window);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, timestamps| {
            prune(timestamps, window_start);
            !timestamps.is_empty()
        });
        before - entries.len()
    }

    /// Number of keys currently holding state
    pub fn tracked_keys(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Sweepable for SlidingWindowLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, window_start: Option<Instant>) {
    let Some(window_start) = window_start else {
        return;
    };
    while timestamps.front().is_some_and(|t| *t <= window_start) {
        timestamps.pop_front();
    }
}
