use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Verdict for one request against an identity's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitOutcome {
    pub success: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch milliseconds at which the current window ends.
    pub reset: i64,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn limit(&self, identity: &str) -> Result<RateLimitOutcome>;
}

/// Shared counters backing a limiter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key` and returns the new count. A freshly created
    /// key expires after `ttl`.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64>;
}
