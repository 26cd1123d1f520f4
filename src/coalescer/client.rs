use crate::{
    error::{PaintError, Result},
    gateway::{Gateway, FALLBACK_IP_ADDRESS},
    models::{ErrorBody, GeneratedImage, GenerationRequest},
};
use async_trait::async_trait;
use reqwest::Client;

/// Anything that can turn a settled prompt into an image.
#[async_trait]
pub trait GenerationSource: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;
}

#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    endpoint: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/generate-image", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationSource for GatewayClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| PaintError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.display_message(),
                Err(_) => "An error occurred".to_string(),
            };
            return Err(PaintError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GeneratedImage>()
            .await
            .map_err(|e| PaintError::Network(format!("Unreadable gateway response: {}", e)))
    }
}

#[async_trait]
impl GenerationSource for Gateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let body = serde_json::to_vec(request)?;
        self.handle(&body, FALLBACK_IP_ADDRESS).await
    }
}
