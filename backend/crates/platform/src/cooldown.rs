//! Resend Cooldown
//!
//! Minimum spacing between two actions for the same key. Unlike the
//! sliding-window limiter this keeps a single timestamp per key and ignores
//! how many actions happened before it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::sweep::Sweepable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownResult {
    pub allowed: bool,
    /// Whole seconds until the next action is allowed, rounded up
    pub seconds_until: u64,
}

#[derive(Debug)]
pub struct CooldownGate {
    duration: Duration,
    entries: RwLock<HashMap<String, Instant>>,
}

impl CooldownGate {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn can_resend(&self, key: &str) -> CooldownResult {
        self.can_resend_at(key, Instant::now())
    }

    /// Allowed when nothing is recorded or `now > last + duration`.
    pub fn can_resend_at(&self, key: &str, now: Instant) -> CooldownResult {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        self.check(entries.get(key).copied(), now)
    }

    pub fn try_acquire(&self, key: &str) -> CooldownResult {
        self.try_acquire_at(key, Instant::now())
    }

    /// Check and, when allowed, record `now` under one write lock.
    ///
    /// Of several concurrent callers for the same key exactly one is
    /// allowed. A caller whose action then fails should [`Self::reset`] the
    /// key.
    pub fn try_acquire_at(&self, key: &str, now: Instant) -> CooldownResult {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let result = self.check(entries.get(key).copied(), now);
        if result.allowed {
            entries.insert(key.to_owned(), now);
        }
        result
    }

    fn check(&self, last: Option<Instant>, now: Instant) -> CooldownResult {
        let Some(last) = last else {
            return CooldownResult {
                allowed: true,
                seconds_until: 0,
            };
        };

        let ready_at = last + self.duration;
        if now > ready_at {
            return CooldownResult {
                allowed: true,
                seconds_until: 0,
            };
        }

        CooldownResult {
            allowed: false,
            // At `now == ready_at` the action is still one tick early
            seconds_until: ceil_secs(ready_at - now).max(1),
        }
    }

    pub fn set_cooldown(&self, key: &str) {
        self.set_cooldown_at(key, Instant::now());
    }

    pub fn set_cooldown_at(&self, key: &str, now: Instant) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), now);
    }

    pub fn reset(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop keys whose cooldown has elapsed. Returns the number dropped.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, last| now <= *last + self.duration);
        before - entries.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Sweepable for CooldownGate {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_key_is_allowed() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let result = gate.can_resend("user@example.com");
        assert!(result.allowed);
        assert_eq!(result.seconds_until, 0);
    }

    #[test]
    fn test_second_call_thirty_seconds_later_waits_ninety() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let start = Instant::now();

        assert!(gate.can_resend_at("k", start).allowed);
        gate.set_cooldown_at("k", start);

        let result = gate.can_resend_at("k", start + Duration::from_secs(30));
        assert!(!result.allowed);
        assert_eq!(result.seconds_until, 90);
    }

    #[test]
    fn test_seconds_round_up() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let start = Instant::now();
        gate.set_cooldown_at("k", start);

        let result = gate.can_resend_at("k", start + Duration::from_millis(30_500));
        assert_eq!(result.seconds_until, 90);
    }

    #[test]
    fn test_allowed_strictly_after_duration() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let start = Instant::now();
        gate.set_cooldown_at("k", start);

        let at_boundary = gate.can_resend_at("k", start + Duration::from_secs(120));
        assert!(!at_boundary.allowed);
        assert_eq!(at_boundary.seconds_until, 1);

        let after = gate.can_resend_at("k", start + Duration::from_millis(120_001));
        assert!(after.allowed);
    }

    #[test]
    fn test_reset() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let start = Instant::now();
        gate.set_cooldown_at("k", start);
        assert!(!gate.can_resend_at("k", start).allowed);

        gate.reset("k");
        assert!(gate.can_resend_at("k", start).allowed);
    }

    #[test]
    fn test_try_acquire_records_only_when_allowed() {
        let gate = CooldownGate::new(Duration::from_secs(120));
        let start = Instant::now();

        assert!(gate.try_acquire_at("k", start).allowed);
        let second = gate.try_acquire_at("k", start + Duration::from_secs(30));
        assert!(!second.allowed);
        assert_eq!(second.seconds_until, 90);

        // The rejected attempt did not move the window
        let later = gate.try_acquire_at("k", start + Duration::from_millis(120_001));
        assert!(later.allowed);
    }

    #[test]
    fn test_try_acquire_single_winner_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let gate = Arc::new(CooldownGate::new(Duration::from_secs(120)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.try_acquire("+250788000001").allowed)
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_sweep_drops_elapsed_entries() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        let start = Instant::now();
        gate.set_cooldown_at("old", start);
        gate.set_cooldown_at("fresh", start + Duration::from_secs(50));

        assert_eq!(gate.sweep_at(start + Duration::from_secs(61)), 1);
        assert_eq!(gate.tracked_keys(), 1);
        assert!(!gate.can_resend_at("fresh", start + Duration::from_secs(61)).allowed);
    }
}
