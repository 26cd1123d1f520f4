pub mod together;

use crate::{
    error::Result,
    models::{GeneratedImage, ProviderImageRequest},
};
use async_trait::async_trait;

pub use together::TogetherClient;

/// The API key a provider call is made with, tagged by where it came from.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Supplied by the caller in the request body.
    Caller(String),
    /// The server's own configured key.
    ServerDefault(String),
}

impl Credential {
    pub fn key(&self) -> &str {
        match self {
            Credential::Caller(key) | Credential::ServerDefault(key) => key,
        }
    }

    pub fn is_caller_supplied(&self) -> bool {
        matches!(self, Credential::Caller(_))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Caller(_) => f.write_str("Credential::Caller(***)"),
            Credential::ServerDefault(_) => f.write_str("Credential::ServerDefault(***)"),
        }
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates images and returns the first one.
    async fn generate(
        &self,
        request: &ProviderImageRequest,
        credential: &Credential,
    ) -> Result<GeneratedImage>;
}
