//! Quota, per-key window record, and the decision returned for a request.

use crate::error::{GatewayError, Result};

/// How many requests a key may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    limit: u32,
    window_ms: u64,
}

impl Quota {
    /// Create a quota of `limit` requests every `window_ms` milliseconds.
    ///
    /// Both values must be non-zero. A zero quota would either let every
    /// request through or reject all of them, so it is refused here.
    pub fn new(limit: u32, window_ms: u64) -> Result<Self> {
        if limit == 0 {
            return Err(GatewayError::InvalidQuota(
                "limit must be greater than zero".to_string(),
            ));
        }
        if window_ms == 0 {
            return Err(GatewayError::InvalidQuota(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(Self { limit, window_ms })
    }

    /// Maximum requests allowed in one window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

/// The counting state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    /// Requests admitted in the current window
    pub count: u32,
    /// Epoch milliseconds at which the window closes
    pub reset_at: u64,
}

impl RateRecord {
    /// Open a new window at `now` with the first request already counted.
    pub fn open(now: u64, quota: &Quota) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(quota.window_ms),
        }
    }

    /// Whether a request at `now` starts a new window.
    ///
    /// The window still applies at the reset instant itself.
    pub fn has_lapsed(&self, now: u64) -> bool {
        self.reset_at < now
    }

    /// Whether the sweep may drop this record at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.reset_at <= now
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The quota limit the decision was made against
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Epoch milliseconds at which the window closes
    pub reset_at: u64,
}
