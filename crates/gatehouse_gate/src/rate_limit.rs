//! Per-caller dual-ceiling rate limiting.
//!
//! Each caller gets an independent bucket with two ceilings refilling on a
//! rolling one-minute window: a request-count ceiling (with a burst
//! allowance on top) and a resource-unit ceiling (e.g. LLM tokens). Buckets
//! are created lazily and guarded individually, so distinct callers never
//! contend on a shared lock.

use gatehouse_error::{GateError, GateErrorKind, GateResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Rate limit ceilings shared by every bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Extra requests admitted on top of the ceiling for spikes
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Resource units admitted per window
    #[serde(default = "default_units_per_minute")]
    pub units_per_minute: u64,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_burst() -> u32 {
    10
}

fn default_units_per_minute() -> u64 {
    100_000
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
            units_per_minute: default_units_per_minute(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    fn request_capacity(&self) -> u32 {
        self.requests_per_minute.saturating_add(self.burst)
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Why a check was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitRejection {
    /// The request-count ceiling (including burst) is exhausted
    RequestLimitExceeded,
    /// The estimated units would drive the unit counter negative
    UnitLimitExceeded,
}

/// Snapshot of a bucket after a check or status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Set when the request was rejected
    pub rejection: Option<RateLimitRejection>,
    /// Requests left in the window after the debit
    pub remaining_requests: u32,
    /// Units left in the window after the debit
    pub remaining_units: u64,
    /// Time until the window resets
    pub reset_after: Duration,
    /// Human-readable summary
    pub message: String,
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    requests_used: u32,
    units_used: u64,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            requests_used: 0,
            units_used: 0,
        }
    }

    /// Reset the counters when the window has elapsed.
    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        if now.duration_since(self.window_start) >= config.window() {
            self.window_start = now;
            self.requests_used = 0;
            self.units_used = 0;
        }
    }

    fn reset_after(&self, config: &RateLimitConfig, now: Instant) -> Duration {
        config
            .window()
            .saturating_sub(now.duration_since(self.window_start))
    }

    fn remaining_requests(&self, config: &RateLimitConfig) -> u32 {
        config.request_capacity().saturating_sub(self.requests_used)
    }

    fn remaining_units(&self, config: &RateLimitConfig) -> u64 {
        config.units_per_minute.saturating_sub(self.units_used)
    }
}

/// Concurrent per-caller rate limiter.
///
/// The bucket map is the one piece of long-lived shared state in the
/// pipeline. Every bucket mutation (refill check, debit, refund) happens in
/// a single critical section guarded per bucket, which totally orders
/// debits for one caller without serializing distinct callers.
///
/// # Examples
///
/// ```
/// use gatehouse_gate::{CallerRateLimiter, RateLimitConfig};
///
/// let limiter = CallerRateLimiter::new(RateLimitConfig::default());
/// let result = limiter.check("agent-1", 100).unwrap();
/// assert!(result.allowed);
/// ```
pub struct CallerRateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
    shut_down: AtomicBool,
}

impl CallerRateLimiter {
    /// Create a limiter with the given ceilings.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// The configured ceilings.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket_for(&self, caller_id: &str) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(caller_id)
        {
            return Arc::clone(bucket);
        }
        let mut buckets = self
            .buckets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            buckets
                .entry(caller_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(Instant::now())))),
        )
    }

    /// Atomically refill, admit or reject, and debit.
    ///
    /// Admission requires both ceilings to stay non-negative after the
    /// debit: one request, plus `estimated_units` units.
    ///
    /// # Errors
    ///
    /// Returns [`GateErrorKind::LimiterShutDown`] after [`Self::shutdown`].
    #[instrument(skip(self), fields(caller_id))]
    pub fn check(&self, caller_id: &str, estimated_units: u64) -> GateResult<RateLimitResult> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(GateError::new(GateErrorKind::LimiterShutDown));
        }

        let bucket = self.bucket_for(caller_id);
        let mut bucket = bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        bucket.refill(&self.config, now);

        if bucket.requests_used >= self.config.request_capacity() {
            let reset_after = bucket.reset_after(&self.config, now);
            debug!(reset_secs = reset_after.as_secs(), "Request ceiling exhausted");
            return Ok(RateLimitResult {
                allowed: false,
                rejection: Some(RateLimitRejection::RequestLimitExceeded),
                remaining_requests: 0,
                remaining_units: bucket.remaining_units(&self.config),
                reset_after,
                message: format!(
                    "request limit exceeded; window resets in {}s",
                    reset_after.as_secs()
                ),
            });
        }

        let remaining_units = bucket.remaining_units(&self.config);
        if estimated_units > remaining_units {
            let reset_after = bucket.reset_after(&self.config, now);
            debug!(estimated_units, remaining_units, "Unit ceiling exhausted");
            return Ok(RateLimitResult {
                allowed: false,
                rejection: Some(RateLimitRejection::UnitLimitExceeded),
                remaining_requests: bucket.remaining_requests(&self.config),
                remaining_units,
                reset_after,
                message: format!(
                    "unit limit exceeded; {remaining_units} units remain this window"
                ),
            });
        }

        bucket.requests_used += 1;
        bucket.units_used += estimated_units;
        let result = RateLimitResult {
            allowed: true,
            rejection: None,
            remaining_requests: bucket.remaining_requests(&self.config),
            remaining_units: bucket.remaining_units(&self.config),
            reset_after: bucket.reset_after(&self.config, now),
            message: "ok".to_string(),
        };
        debug!(
            remaining_requests = result.remaining_requests,
            remaining_units = result.remaining_units,
            "Rate limit check passed"
        );
        Ok(result)
    }

    /// Reconcile an optimistic debit against the true cost.
    ///
    /// If the actual cost was lower than estimated, the difference is
    /// refunded. If it was higher, no further debit is attempted: the caller
    /// already paid the estimate, and occasionally under-charging beats
    /// retroactively failing a completed action.
    #[instrument(skip(self), fields(caller_id))]
    pub fn record_usage(&self, caller_id: &str, estimated_units: u64, actual_units: u64) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        if actual_units >= estimated_units {
            if actual_units > estimated_units {
                warn!(
                    estimated_units,
                    actual_units, "Usage exceeded estimate; accepting under-charge"
                );
            }
            return;
        }

        let refund = estimated_units - actual_units;
        let bucket = self.bucket_for(caller_id);
        let mut bucket = bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.units_used = bucket.units_used.saturating_sub(refund);
        debug!(refund, "Refunded overestimated units");
    }

    /// Snapshot a caller's bucket without debiting.
    ///
    /// Read-only: a caller with no bucket reports full capacity and no
    /// bucket is created for it, so status probes cannot grow the map.
    pub fn status(&self, caller_id: &str) -> RateLimitResult {
        if self.shut_down.load(Ordering::Acquire) {
            return RateLimitResult {
                allowed: false,
                rejection: None,
                remaining_requests: 0,
                remaining_units: 0,
                reset_after: Duration::ZERO,
                message: "rate limiter has been shut down".to_string(),
            };
        }

        let existing = self
            .buckets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(caller_id)
            .map(Arc::clone);
        let Some(bucket) = existing else {
            return RateLimitResult {
                allowed: true,
                rejection: None,
                remaining_requests: self.config.request_capacity(),
                remaining_units: self.config.units_per_minute,
                reset_after: self.config.window(),
                message: "status".to_string(),
            };
        };

        let mut bucket = bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        bucket.refill(&self.config, now);
        RateLimitResult {
            allowed: true,
            rejection: None,
            remaining_requests: bucket.remaining_requests(&self.config),
            remaining_units: bucket.remaining_units(&self.config),
            reset_after: bucket.reset_after(&self.config, now),
            message: "status".to_string(),
        }
    }

    /// Release the bucket map and reject further checks.
    ///
    /// Refill is computed lazily on access, so there is no background timer
    /// to join. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.buckets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        debug!("Rate limiter shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests_per_minute: u32, burst: u32, units_per_minute: u64) -> CallerRateLimiter {
        CallerRateLimiter::new(RateLimitConfig {
            requests_per_minute,
            burst,
            units_per_minute,
            window_secs: 60,
        })
    }

    #[test]
    fn test_admits_within_ceilings() {
        let limiter = limiter(5, 0, 1_000);
        let result = limiter.check("caller", 100).unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining_requests, 4);
        assert_eq!(result.remaining_units, 900);
    }

    #[test]
    fn test_burst_extends_request_ceiling() {
        // Scenario D: 10/min with burst 2 admits 12, rejects the 13th with
        // a reset time within the window.
        let limiter = limiter(10, 2, 1_000_000);
        for i in 0..12 {
            assert!(limiter.check("caller", 1).unwrap().allowed, "request {i}");
        }
        let rejected = limiter.check("caller", 1).unwrap();
        assert!(!rejected.allowed);
        assert_eq!(
            rejected.rejection,
            Some(RateLimitRejection::RequestLimitExceeded)
        );
        assert!(rejected.reset_after <= Duration::from_secs(60));
    }

    #[test]
    fn test_unit_ceiling_rejects_with_remaining_in_message() {
        let limiter = limiter(100, 0, 500);
        assert!(limiter.check("caller", 400).unwrap().allowed);
        let rejected = limiter.check("caller", 200).unwrap();
        assert!(!rejected.allowed);
        assert_eq!(
            rejected.rejection,
            Some(RateLimitRejection::UnitLimitExceeded)
        );
        assert!(rejected.message.contains("100 units remain"));
    }

    #[test]
    fn test_refund_on_overestimate() {
        // Estimate 500, actual 300: the bucket regains exactly 200.
        let limiter = limiter(100, 0, 1_000);
        limiter.check("caller", 500).unwrap();
        limiter.record_usage("caller", 500, 300);
        assert_eq!(limiter.status("caller").remaining_units, 700);
    }

    #[test]
    fn test_no_retroactive_debit_on_underestimate() {
        let limiter = limiter(100, 0, 1_000);
        limiter.check("caller", 100).unwrap();
        limiter.record_usage("caller", 100, 400);
        assert_eq!(limiter.status("caller").remaining_units, 900);
    }

    #[test]
    fn test_refund_never_exceeds_ceiling() {
        let limiter = limiter(100, 0, 1_000);
        limiter.check("caller", 50).unwrap();
        // A bogus reconcile larger than everything debited so far.
        limiter.record_usage("caller", 5_000, 0);
        assert_eq!(limiter.status("caller").remaining_units, 1_000);
    }

    #[test]
    fn test_distinct_callers_have_independent_buckets() {
        let limiter = limiter(1, 0, 1_000);
        assert!(limiter.check("alice", 1).unwrap().allowed);
        assert!(!limiter.check("alice", 1).unwrap().allowed);
        assert!(limiter.check("bob", 1).unwrap().allowed);
    }

    #[test]
    fn test_window_refills() {
        let limiter = CallerRateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            burst: 0,
            units_per_minute: 10,
            window_secs: 1,
        });
        assert!(limiter.check("caller", 1).unwrap().allowed);
        assert!(!limiter.check("caller", 1).unwrap().allowed);
        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.check("caller", 1).unwrap().allowed);
    }

    #[test]
    fn test_shutdown_rejects_checks_and_is_idempotent() {
        let limiter = limiter(10, 0, 1_000);
        limiter.shutdown();
        limiter.shutdown();
        assert!(limiter.check("caller", 1).is_err());
    }

    #[test]
    fn test_status_does_not_create_buckets() {
        let limiter = limiter(5, 2, 1_000);
        let status = limiter.status("never-seen");
        assert!(status.allowed);
        assert_eq!(status.remaining_requests, 7);
        assert_eq!(status.remaining_units, 1_000);
        assert!(limiter.buckets.read().unwrap().is_empty());
    }

    #[test]
    fn test_status_after_shutdown_reports_shut_down() {
        let limiter = limiter(5, 0, 1_000);
        limiter.check("caller", 1).unwrap();
        limiter.shutdown();
        let status = limiter.status("caller");
        assert!(!status.allowed);
        assert_eq!(status.remaining_requests, 0);
        assert!(status.message.contains("shut down"));
        assert!(limiter.buckets.read().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_debits_never_oversubscribe() {
        // N concurrent debits of size S against a bucket of capacity C*S
        // leave the bucket at exactly 0, never negative.
        let capacity = 64;
        let limiter = std::sync::Arc::new(limiter(capacity, 0, u64::from(capacity) * 10));
        let mut handles = Vec::new();
        for _ in 0..capacity {
            let limiter = std::sync::Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                limiter.check("caller", 10).unwrap().allowed
            }));
        }
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, capacity as usize);
        let status = limiter.status("caller");
        assert_eq!(status.remaining_requests, 0);
        assert_eq!(status.remaining_units, 0);
    }
}
