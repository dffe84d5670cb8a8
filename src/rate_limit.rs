//! Sliding-window request limiter keyed by client address
//!
//! Each client keeps the timestamps of its requests inside the current
//! window. Clients whose window has fully drained are forgotten, so the
//! table only holds clients seen during the last window.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Buckets {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<Buckets>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(Buckets {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            window,
            max_requests,
        }
    }

    /// Count a request for `client`; false once its window is full
    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    /// Clients currently holding at least one request in their window
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().hits.len()
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();

        // At most once per window, drop every client whose requests have all expired
        if now.saturating_duration_since(buckets.last_sweep) >= self.window {
            let window = self.window;
            buckets.hits.retain(|_, hits| {
                expire(hits, now, window);
                !hits.is_empty()
            });
            buckets.last_sweep = now;
        }

        let hits = buckets.hits.entry(client.to_string()).or_default();
        expire(hits, now, self.window);

        if hits.len() >= self.max_requests {
            if hits.is_empty() {
                buckets.hits.remove(client);
            }
            return false;
        }

        hits.push_back(now);
        true
    }
}

fn expire(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while hits
        .front()
        .is_some_and(|oldest| now.saturating_duration_since(*oldest) > window)
    {
        hits.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_client() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn test_window_expiry() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 1);
        let start = Instant::now();
        assert!(limiter.allow_at("k", start));
        assert!(!limiter.allow_at("k", start + Duration::from_millis(500)));
        assert!(limiter.allow_at("k", start + Duration::from_secs(2)));
    }

    #[test]
    fn test_drained_clients_are_forgotten() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 5);
        let start = Instant::now();

        for i in 0..100 {
            assert!(limiter.allow_at(&format!("10.0.{}.{}", i / 256, i % 256), start));
        }
        assert_eq!(limiter.tracked_clients(), 100);

        // One request after the window sweeps out everyone else
        assert!(limiter.allow_at("10.1.0.1", start + Duration::from_secs(3)));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_zero_limit_keeps_no_entry() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0);
        assert!(!limiter.allow("10.0.0.1"));
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
