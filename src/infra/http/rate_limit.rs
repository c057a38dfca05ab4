use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window request limiter keyed by client and route.
#[derive(Debug, Clone)]
pub struct RequestRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RequestRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record a request and report whether it fits in the window.
    pub fn allow(&self, client: &str, route: &str) -> bool {
        self.allow_at(client, route, Instant::now())
    }

    fn allow_at(&self, client: &str, route: &str, now: Instant) -> bool {
        let window = self.window;
        let mut entry = self.buckets.entry(format!("{client}:{route}")).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        if entry.len() >= self.max_requests as usize {
            return false;
        }

        entry.push(now);
        true
    }

    /// Drop buckets with no requests inside the window.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.last()
                .is_some_and(|latest| now.duration_since(*latest) < window)
        });
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
