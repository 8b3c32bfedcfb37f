//! Per-agent sliding-window rate limiting.
//!
//! Sharded by `dashmap::DashMap` so agents don't contend with each other's
//! counters.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window over one agent's recent event timestamps.
#[derive(Default)]
struct Window(VecDeque<Instant>);

/// Parameters: `per_agent` (max events per window), `window` (seconds).
/// `per_agent == 0` makes the limiter a no-op.
pub struct RateLimiter {
    per_agent: usize,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(per_agent: usize, window_secs: u64) -> Self {
        Self {
            per_agent,
            window: Duration::from_secs(window_secs),
            windows: DashMap::new(),
        }
    }

    /// Checks and records in one operation — there is no check-then-record
    /// race because this is the sole authority on the counter. Returns
    /// `true` if the event is admitted.
    pub fn check_and_record(&self, agent: &str) -> bool {
        if self.per_agent == 0 {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.windows.entry(agent.to_string()).or_default();
        while let Some(&oldest) = entry.0.front() {
            if now.duration_since(oldest) > self.window {
                entry.0.pop_front();
            } else {
                break;
            }
        }
        if entry.0.len() < self.per_agent {
            entry.0.push_back(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn admits_up_to_per_agent_then_rejects() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check_and_record("a"));
        assert!(limiter.check_and_record("a"));
        assert!(!limiter.check_and_record("a"));
    }

    #[test]
    fn agents_have_independent_windows() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_and_record("a"));
        assert!(limiter.check_and_record("b"));
        assert!(!limiter.check_and_record("a"));
    }

    #[test]
    fn zero_per_agent_is_a_no_op() {
        let limiter = RateLimiter::new(0, 60);
        for _ in 0..100 {
            assert!(limiter.check_and_record("a"));
        }
    }

    #[test]
    fn window_expires_old_events() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check_and_record("a"));
        assert!(!limiter.check_and_record("a"));
        sleep(Duration::from_millis(1100));
        assert!(limiter.check_and_record("a"));
    }
}
