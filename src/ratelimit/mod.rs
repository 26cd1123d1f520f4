pub mod memory;
pub mod traits;
#[cfg(feature = "upstash")]
pub mod upstash;

use crate::{config::Config, error::Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryCounterStore;
pub use traits::{CounterStore, RateLimitOutcome, RateLimiter};
#[cfg(feature = "upstash")]
pub use upstash::UpstashCounterStore;

pub const DEFAULT_MAX_REQUESTS: u64 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1440 * 60);
pub const DEFAULT_PREFIX: &str = "keystrokeimagen";

/// Fixed-window quota: every identity gets `max_requests` per window, and all
/// windows start on multiples of the window length since the epoch.
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u64,
    window: Duration,
    prefix: String,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_limit(mut self, max_requests: u64, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builds the limiter the config asks for, or `None` when rate limiting is off.
    #[cfg(feature = "upstash")]
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match &config.upstash {
            Some(upstash) if config.rate_limiting_enabled() => {
                let store = UpstashCounterStore::new(upstash.clone())?;
                Ok(Some(Self::new(Arc::new(store))))
            }
            _ => Ok(None),
        }
    }

    #[cfg(not(feature = "upstash"))]
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        if config.rate_limiting_enabled() {
            log::warn!("⚠️  Upstash is configured but the `upstash` feature is off; using in-process counters");
            return Ok(Some(Self::new(Arc::new(MemoryCounterStore::new()))));
        }
        Ok(None)
    }

    fn window_ms(&self) -> i64 {
        (self.window.as_millis() as i64).max(1)
    }

    /// Checks `identity` as if the current time were `now_ms` (epoch millis).
    pub async fn limit_at(&self, identity: &str, now_ms: i64) -> Result<RateLimitOutcome> {
        let window_ms = self.window_ms();
        let bucket = now_ms.div_euclid(window_ms);
        let key = format!("{}:{}:{}", self.prefix, identity, bucket);

        let used = self.store.increment(&key, self.window).await?;

        Ok(RateLimitOutcome {
            success: used <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(used),
            reset: (bucket + 1) * window_ms,
        })
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn limit(&self, identity: &str) -> Result<RateLimitOutcome> {
        self.limit_at(identity, Utc::now().timestamp_millis()).await
    }
}
