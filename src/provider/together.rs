use crate::{
    config::{Config, DEFAULT_TOGETHER_BASE_URL},
    error::{PaintError, Result},
    models::{GeneratedImage, ProviderImageRequest, TogetherImageResponse},
    provider::{Credential, ImageProvider},
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::Value;

#[derive(Clone)]
pub struct TogetherClient {
    client: Client,
    base_url: String,
    helicone_key: Option<String>,
}

impl TogetherClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            helicone_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(config.provider_base_url());
        client.helicone_key = config.helicone_key().map(String::from);
        client
    }

    /// Routes calls through the Helicone proxy, tagging each one for usage analytics.
    pub fn with_helicone(mut self, api_key: impl Into<String>) -> Self {
        self.helicone_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self, credential: &Credential) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", credential.key()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(helicone_key) = &self.helicone_key {
            headers.insert(
                "Helicone-Auth",
                header_value(&format!("Bearer {}", helicone_key))?,
            );
            let byok = if credential.is_caller_supplied() {
                "true"
            } else {
                "false"
            };
            headers.insert("Helicone-Property-BYOK", HeaderValue::from_static(byok));
        }

        Ok(headers)
    }
}

impl Default for TogetherClient {
    fn default() -> Self {
        Self::new(DEFAULT_TOGETHER_BASE_URL)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| PaintError::Validation(format!("API key is not a valid header value: {}", e)))
}

/// Pulls a human-readable message out of a provider error body.
pub(crate) fn provider_error_message(body: &Value) -> Option<String> {
    let from_error = match &body["error"] {
        Value::String(message) => Some(message.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    };
    from_error.or_else(|| body["message"].as_str().map(String::from))
}

#[async_trait]
impl ImageProvider for TogetherClient {
    async fn generate(
        &self,
        request: &ProviderImageRequest,
        credential: &Credential,
    ) -> Result<GeneratedImage> {
        log::info!("🎨 Generating image with model: {}", request.model);
        log::debug!(
            "Image request: {}x{} steps={} seed={:?}",
            request.width,
            request.height,
            request.steps,
            request.seed
        );

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .headers(self.build_headers(credential)?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                log::error!("❌ Provider request failed: {}", e);
                PaintError::provider(e.status().map(|s| s.as_u16()), e.to_string(), None)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaintError::provider(Some(status.as_u16()), e.to_string(), None))?;

        if !status.is_success() {
            let details = serde_json::from_str::<Value>(&text).ok();
            let message = details
                .as_ref()
                .and_then(provider_error_message)
                .unwrap_or_else(|| {
                    if text.is_empty() {
                        status.to_string()
                    } else {
                        text.clone()
                    }
                });
            log::warn!("⚠️  Provider returned {}: {}", status, message);
            return Err(PaintError::provider(Some(status.as_u16()), message, details));
        }

        let parsed: TogetherImageResponse = serde_json::from_str(&text).map_err(|e| {
            PaintError::provider(None, format!("Failed to parse provider response: {}", e), None)
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PaintError::provider(None, "No images generated", None))
    }
}
