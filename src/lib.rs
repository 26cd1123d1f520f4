pub mod coalescer;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod models;
pub mod provider;
pub mod ratelimit;
#[cfg(feature = "server")]
pub mod server;
#[cfg(test)]
mod test_support;

pub use coalescer::{
    Coalescer, CoalescerSettings, GatewayClient, GenerationRecord, GenerationSource,
    Notification, Phase, SessionSnapshot,
};
pub use config::{Config, HeliconeConfig, TogetherConfig, UpstashConfig};
pub use error::{PaintError, Result};
pub use gateway::{client_identity, resolve_credential, Gateway};
pub use models::{ErrorBody, GeneratedImage, GenerationRequest, ProviderImageRequest, Timings};
pub use provider::{Credential, ImageProvider, TogetherClient};
pub use ratelimit::{
    CounterStore, FixedWindowLimiter, MemoryCounterStore, RateLimitOutcome, RateLimiter,
};
