//! Fixed-window rate limiting for agent-to-agent dispatches.
//!
//! Mirrors the UTC-rollover pattern used for daily quotas, but with a
//! short, per-agent sliding window instead of a calendar day: once
//! `max_per_window` dispatches have been recorded inside the current
//! window, further dispatches are rejected until the window rolls over.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

struct WindowCounter {
    window_start: Instant,
    count: u32,
}

pub struct AgentRateLimiter {
    window: Duration,
    max_per_window: u32,
    counters: RwLock<HashMap<String, WindowCounter>>,
}

impl AgentRateLimiter {
    pub fn new(window_secs: u64, max_per_window: u32) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_per_window,
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` if `agent_id` may dispatch now, and records the
    /// attempt either way (rejected attempts still consume no budget but
    /// are tallied for observability by the caller via `TraceEvent`).
    pub fn try_acquire(&self, agent_id: &str) -> bool {
        let now = Instant::now();
        let mut counters = self.counters.write();
        let entry = counters.entry(agent_id.to_string()).or_insert_with(|| WindowCounter {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max_per_window {
            false
        } else {
            entry.count += 1;
            true
        }
    }

    pub fn current_count(&self, agent_id: &str) -> u32 {
        self.counters.read().get(agent_id).map(|c| c.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_n_within_window_pass_rest_rejected() {
        let limiter = AgentRateLimiter::new(60, 5);
        let mut outcomes = Vec::new();
        for _ in 0..8 {
            outcomes.push(limiter.try_acquire("agentA"));
        }
        assert_eq!(outcomes, vec![true, true, true, true, true, false, false, false]);
    }

    #[test]
    fn counters_are_independent_per_agent() {
        let limiter = AgentRateLimiter::new(60, 1);
        assert!(limiter.try_acquire("a"));
        assert!(limiter.try_acquire("b"));
        assert!(!limiter.try_acquire("a"));
    }

    #[test]
    fn window_rollover_resets_count() {
        let limiter = AgentRateLimiter::new(0, 1);
        assert!(limiter.try_acquire("a"));
        // window_secs=0 means every check is past the window boundary.
        assert!(limiter.try_acquire("a"));
    }
}
