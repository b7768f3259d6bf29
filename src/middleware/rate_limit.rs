//! Rate limiting
//!
//! This module provides per-key rate limiting to prevent abuse of endpoints
//! that trigger outbound mail.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RateLimitSettings;
use crate::utils::errors::{AppError, Result};

/// Keyed limiter for verification code requests
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    per_minute: u32,
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("per_minute", &self.per_minute)
            .field("tracked_keys", &self.limiter.len())
            .finish()
    }
}

impl RateLimitMiddleware {
    /// Create a limiter allowing `per_minute` requests per key
    pub fn new(per_minute: u32) -> Self {
        let burst = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(Quota::per_minute(burst), burst.get())
    }

    fn with_quota(quota: Quota, per_minute: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            per_minute,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.verification_code_per_minute)
    }

    /// Whether a request for `key` is allowed right now
    pub fn is_allowed(&self, key: &str) -> bool {
        let allowed = self.limiter.check_key(&key.to_lowercase()).is_ok();
        if allowed {
            debug!(key = %key, "Request allowed");
        } else {
            warn!(key = %key, per_minute = self.per_minute, "Rate limit exceeded");
        }
        allowed
    }

    /// Verification code guard
    pub fn check_verification_code(&self, email: &str) -> Result<()> {
        if self.is_allowed(email) {
            Ok(())
        } else {
            Err(AppError::operating_failed("too many verification code requests"))
        }
    }

    /// Drop state for keys whose quota has fully replenished, returning how many went
    pub fn cleanup(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }

    /// Run [`RateLimitMiddleware::cleanup`] every `every` until the task is aborted
    pub fn start_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        let handle = tokio::spawn(async move {
            let mut cleanup_interval = tokio::time::interval(every);
            loop {
                cleanup_interval.tick().await;
                let removed = limiter.cleanup();
                if removed > 0 {
                    debug!(removed, remaining = limiter.tracked_keys(), "Rate limiter keys cleaned up");
                }
            }
        });
        info!("Started rate limiter cleanup task with interval {:?}", every);
        handle
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_quota_is_per_key() {
        let limiter = RateLimitMiddleware::new(3);

        for _ in 0..3 {
            assert!(limiter.is_allowed("a@example.com"));
        }
        assert!(!limiter.is_allowed("a@example.com"));
        assert!(!limiter.is_allowed("A@Example.com"));
        assert!(limiter.is_allowed("b@example.com"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_verification_code_error() {
        let limiter = RateLimitMiddleware::new(1);
        assert!(limiter.check_verification_code("a@example.com").is_ok());
        assert_matches!(
            limiter.check_verification_code("a@example.com"),
            Err(AppError::OperatingFailed(_))
        );
    }

    fn fast_refill() -> RateLimitMiddleware {
        let quota = Quota::with_period(Duration::from_millis(10))
            .expect("non-zero period")
            .allow_burst(NonZeroU32::MIN);
        RateLimitMiddleware::with_quota(quota, 1)
    }

    #[test]
    fn test_cleanup_drops_replenished_keys() {
        let limiter = fast_refill();
        for n in 0..5 {
            assert!(limiter.is_allowed(&format!("user{}@example.com", n)));
        }
        assert_eq!(limiter.tracked_keys(), 5);

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(limiter.cleanup(), 5);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_cleanup_keeps_limited_keys() {
        let limiter = RateLimitMiddleware::new(1);
        assert!(limiter.is_allowed("a@example.com"));

        assert_eq!(limiter.cleanup(), 0);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(!limiter.is_allowed("a@example.com"));
    }

    #[tokio::test]
    async fn test_cleanup_task_runs_periodically() {
        let limiter = fast_refill();
        assert!(limiter.is_allowed("a@example.com"));
        assert!(limiter.is_allowed("b@example.com"));

        let handle = limiter.start_cleanup(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let limiter = RateLimitMiddleware::new(0);
        assert!(limiter.is_allowed("x"));
        assert!(!limiter.is_allowed("x"));
    }
}
