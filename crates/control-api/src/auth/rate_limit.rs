//! Fixed-window signup rate limiting.

use std::{
    collections::HashMap,
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

const WINDOW: Duration = Duration::from_secs(60);

/// In-memory sliding-window limiter keyed by client address.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    limit_per_minute: usize,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub(crate) fn new(limit_per_minute: usize) -> Self {
        Self {
            limit_per_minute,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `key`; returns false when the budget is exhausted.
    pub(crate) fn check(&self, key: &str) -> bool {
        let now = Instant::now();

        let mut hits = self.hits.lock().expect("limiter mutex is never poisoned");
        let queue = hits.entry(key.to_string()).or_default();

        while queue
            .front()
            .is_some_and(|hit| now.duration_since(*hit) > WINDOW)
        {
            queue.pop_front();
        }

        if queue.len() >= self.limit_per_minute {
            return false;
        }

        queue.push_back(now);

        true
    }
}
