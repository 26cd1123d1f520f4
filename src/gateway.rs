use crate::{
    config::Config,
    error::{PaintError, Result},
    logger,
    models::{GeneratedImage, GenerationRequest, ProviderImageRequest, MISSING_KEY_MESSAGE},
    provider::{Credential, ImageProvider, TogetherClient},
    ratelimit::{FixedWindowLimiter, RateLimiter},
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const FALLBACK_IP_ADDRESS: &str = "0.0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    ResolvingCredential,
    RateLimiting,
    CallingProvider,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::ResolvingCredential => "resolving-credential",
            Stage::RateLimiting => "rate-limiting",
            Stage::CallingProvider => "calling-provider",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub fn validate(body: &[u8]) -> Result<GenerationRequest> {
    let request: GenerationRequest =
        serde_json::from_slice(body).map_err(|e| PaintError::Validation(e.to_string()))?;

    if request.prompt.trim().is_empty() {
        return Err(PaintError::Validation("prompt must not be empty".into()));
    }
    Ok(request)
}

/// Caller key wins over the server default; with neither the request is refused.
pub fn resolve_credential(caller_key: Option<&str>, default_key: Option<&str>) -> Result<Credential> {
    match (caller_key, default_key) {
        (Some(key), _) => Ok(Credential::Caller(key.to_string())),
        (None, Some(key)) => Ok(Credential::ServerDefault(key.to_string())),
        (None, None) => Err(PaintError::Auth(MISSING_KEY_MESSAGE.to_string())),
    }
}

/// Rate-limit identity: first forwarded-for hop, then real-ip, then a sentinel.
pub fn client_identity(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| real_ip.map(str::trim).filter(|ip| !ip.is_empty()))
        .unwrap_or(FALLBACK_IP_ADDRESS)
        .to_string()
}

#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn ImageProvider>,
    limiter: Option<Arc<dyn RateLimiter>>,
    default_api_key: Option<String>,
}

impl Gateway {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self {
            provider,
            limiter: None,
            default_api_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut gateway = Self::new(Arc::new(TogetherClient::from_config(config)));
        if let Some(key) = &config.together.api_key {
            gateway = gateway.with_default_api_key(key.clone());
        }
        if let Some(limiter) = FixedWindowLimiter::from_config(config)? {
            gateway = gateway.with_rate_limiter(Arc::new(limiter));
        }
        Ok(gateway)
    }

    pub fn with_default_api_key(mut self, key: impl Into<String>) -> Self {
        self.default_api_key = Some(key.into()).filter(|k: &String| !k.trim().is_empty());
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn rate_limited(&self) -> bool {
        self.limiter.is_some()
    }

    pub async fn handle(&self, body: &[u8], identity: &str) -> Result<GeneratedImage> {
        let request_id = Uuid::new_v4().to_string();
        let mut stage = Stage::Validating;

        let result = self.run(body, identity, &request_id, &mut stage).await;
        match &result {
            Ok(_) => log::info!("✅ [req:{}] {}", request_id, Stage::Succeeded),
            Err(e) => log::warn!(
                "⚠️  [req:{}] {} during {}: {}",
                request_id,
                Stage::Failed,
                stage,
                e
            ),
        }
        result
    }

    async fn run(
        &self,
        body: &[u8],
        identity: &str,
        request_id: &str,
        stage: &mut Stage,
    ) -> Result<GeneratedImage> {
        let request = validate(body)?;

        *stage = Stage::ResolvingCredential;
        let credential =
            resolve_credential(request.caller_key(), self.default_api_key.as_deref())?;
        log::debug!("[req:{}] credential: {:?}", request_id, credential);

        if let (Some(limiter), false) = (&self.limiter, credential.is_caller_supplied()) {
            *stage = Stage::RateLimiting;
            let outcome = limiter.limit(identity).await?;
            log::debug!(
                "[req:{}] {} has {} of {} requests left",
                request_id,
                identity,
                outcome.remaining,
                outcome.limit
            );
            if !outcome.success {
                return Err(PaintError::RateLimited {
                    reset_at: outcome.reset,
                });
            }
        }

        *stage = Stage::CallingProvider;
        let provider_request =
            ProviderImageRequest::for_prompt(request.prompt, request.iterative_mode);
        let timer = logger::timer("provider call");
        let result = self.provider.generate(&provider_request, &credential).await;
        match &result {
            Ok(_) => timer.stop(),
            Err(_) => timer.fail(),
        };
        result
    }
}
