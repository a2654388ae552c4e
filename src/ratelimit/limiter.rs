//! Core rate limiter implementation.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::{Quota, RateLimitDecision, RateRecord};

/// In-memory fixed-window rate limiter keyed by client identifier.
///
/// Each key owns at most one [`RateRecord`]. A record is replaced, not
/// merged, when a request arrives after its window has closed. Every
/// operation runs under a single lock acquisition, so the
/// read-check-increment for a key is never observed half done.
///
/// Counts live in process memory only. Separate processes keep separate
/// counts.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Window records indexed by client key
    records: Mutex<HashMap<String, RateRecord>>,
    /// Time source
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(clock: C) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The limiter's time source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Count one request for `key` against `quota`.
    ///
    /// A denied request leaves the record untouched, so rejections do not
    /// eat into the next window.
    pub fn check_and_consume(&self, key: &str, quota: &Quota) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let limit = quota.limit();

        trace!(key = %key, limit = limit, window_ms = quota.window_ms(), "Checking rate limit");

        let mut records = self.records.lock();

        match records.get_mut(key) {
            Some(record) if !record.has_lapsed(now) => {
                if record.count >= limit {
                    debug!(key = %key, count = record.count, limit = limit, "Rate limit exceeded");
                    return RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at: record.reset_at,
                    };
                }

                record.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit - record.count,
                    reset_at: record.reset_at,
                }
            }
            _ => {
                let record = RateRecord::open(now, quota);
                debug!(key = %key, reset_at = record.reset_at, "Opening new rate limit window");
                records.insert(key.to_string(), record);
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit - 1,
                    reset_at: record.reset_at,
                }
            }
        }
    }

    /// Report the state `key` would see without counting a request.
    pub fn peek(&self, key: &str, quota: &Quota) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let limit = quota.limit();
        let records = self.records.lock();

        match records.get(key) {
            Some(record) if !record.has_lapsed(now) => RateLimitDecision {
                allowed: record.count < limit,
                limit,
                remaining: limit.saturating_sub(record.count),
                reset_at: record.reset_at,
            },
            _ => RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_at: now.saturating_add(quota.window_ms()),
            },
        }
    }

    /// Remove every record whose window closed at or before `now`.
    ///
    /// Returns the number of records removed.
    pub fn sweep_expired(&self, now: u64) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        before - records.len()
    }

    /// Current request count for `key`, if a record exists.
    pub fn count_for(&self, key: &str) -> Option<u32> {
        self.records.lock().get(key).map(|r| r.count)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}
