//! Sliding-window admission control per client IP.
//!
//! Process-local and non-persistent: one mutex-guarded map of admission
//! timestamps per IP. The critical section is bounded by a small per-IP
//! eviction scan; no cluster coordination is implied.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    request_log: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_seconds),
            request_log: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.max_requests
    }

    /// Admit or deny a request from `client_ip`.
    ///
    /// Returns `(allowed, remaining)`. Denials are not recorded, so a client
    /// hammering past the limit does not push its own window forward.
    pub fn is_allowed(&self, client_ip: IpAddr) -> (bool, usize) {
        let mut log = self.request_log.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let stamps = log.entry(client_ip).or_default();
        stamps.retain(|ts| now.duration_since(*ts) < self.window);

        if stamps.len() >= self.max_requests {
            return (false, 0);
        }

        stamps.push(now);
        (true, self.max_requests - stamps.len())
    }

    /// Whole seconds until the oldest recorded admission leaves the window.
    pub fn retry_after(&self, client_ip: IpAddr) -> u64 {
        let log = self.request_log.lock().unwrap_or_else(|e| e.into_inner());
        let Some(stamps) = log.get(&client_ip) else {
            return 0;
        };
        let Some(oldest) = stamps.iter().min() else {
            return 0;
        };
        let elapsed = Instant::now().duration_since(*oldest);
        self.window.saturating_sub(elapsed).as_secs()
    }

    /// Drop tracking for one IP (or everything) — operator/test maintenance.
    pub fn reset(&self, client_ip: Option<IpAddr>) {
        let mut log = self.request_log.lock().unwrap_or_else(|e| e.into_inner());
        match client_ip {
            Some(ip) => {
                log.remove(&ip);
            }
            None => log.clear(),
        }
    }

    /// Evict IPs whose window emptied out, bounding memory. Intended to be
    /// called periodically from a maintenance task.
    pub fn cleanup(&self) {
        let mut log = self.request_log.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        log.retain(|_, stamps| {
            stamps.retain(|ts| now.duration_since(*ts) < self.window);
            !stamps.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([203, 0, 113, last])
    }

    #[test]
    fn test_admits_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(3, 60);
        let client = ip(1);

        assert_eq!(limiter.is_allowed(client), (true, 2));
        assert_eq!(limiter.is_allowed(client), (true, 1));
        assert_eq!(limiter.is_allowed(client), (true, 0));
        assert_eq!(limiter.is_allowed(client), (false, 0));
        // Still denied; denials are not recorded.
        assert_eq!(limiter.is_allowed(client), (false, 0));
    }

    #[test]
    fn test_ips_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.is_allowed(ip(1)).0);
        assert!(!limiter.is_allowed(ip(1)).0);
        assert!(limiter.is_allowed(ip(2)).0);
    }

    #[test]
    fn test_retry_after_bounded_by_window() {
        let limiter = RateLimiter::new(1, 60);
        let client = ip(3);
        assert_eq!(limiter.retry_after(client), 0);

        limiter.is_allowed(client);
        let retry = limiter.retry_after(client);
        assert!(retry <= 60, "retry_after {retry} exceeds window");
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = RateLimiter::new(1, 0);
        let client = ip(4);
        assert!(limiter.is_allowed(client).0);
        // Zero-second window: the previous stamp is already outside it.
        assert!(limiter.is_allowed(client).0);
    }

    #[test]
    fn test_reset_clears_ip() {
        let limiter = RateLimiter::new(1, 60);
        let client = ip(5);
        limiter.is_allowed(client);
        assert!(!limiter.is_allowed(client).0);
        limiter.reset(Some(client));
        assert!(limiter.is_allowed(client).0);
    }

    #[test]
    fn test_cleanup_drops_empty_rows() {
        let limiter = RateLimiter::new(5, 0);
        limiter.is_allowed(ip(6));
        limiter.cleanup();
        let log = limiter.request_log.lock().unwrap();
        assert!(log.is_empty());
    }
}
