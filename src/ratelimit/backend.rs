//! Rate limiter trait for abstracting over where counts are kept.

use async_trait::async_trait;

use super::clock::Clock;
use super::counter::{Quota, RateLimitDecision};
use super::limiter::RateLimiter;

/// Trait for rate limiter implementations.
///
/// The HTTP layer only talks to this trait, so a store shared between
/// gateway replicas can replace the in-process [`RateLimiter`].
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Count one request for `key` and decide whether it may proceed.
    async fn check_and_consume(&self, key: &str, quota: &Quota) -> RateLimitDecision;

    /// Report the current state for `key` without counting a request.
    async fn peek(&self, key: &str, quota: &Quota) -> RateLimitDecision;
}

#[async_trait]
impl<C: Clock + 'static> RateLimitBackend for RateLimiter<C> {
    async fn check_and_consume(&self, key: &str, quota: &Quota) -> RateLimitDecision {
        RateLimiter::check_and_consume(self, key, quota)
    }

    async fn peek(&self, key: &str, quota: &Quota) -> RateLimitDecision {
        RateLimiter::peek(self, key, quota)
    }
}
