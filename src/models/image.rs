use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FLUX_SCHNELL_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
pub const IMAGE_WIDTH: u32 = 1024;
pub const IMAGE_HEIGHT: u32 = 768;
pub const INFERENCE_STEPS: u32 = 3;
/// Seed reused by every consistency-mode generation.
pub const ITERATIVE_SEED: u64 = 123;

/// Body of `POST /generate-image`, as the client sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(rename = "iterativeMode")]
    pub iterative_mode: bool,
    #[serde(rename = "userAPIKey", default, skip_serializing_if = "Option::is_none")]
    pub user_api_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            iterative_mode: false,
            user_api_key: None,
        }
    }

    pub fn with_iterative_mode(mut self, enabled: bool) -> Self {
        self.iterative_mode = enabled;
        self
    }

    pub fn with_user_api_key(mut self, key: impl Into<String>) -> Self {
        self.user_api_key = Some(key.into());
        self
    }

    /// Caller key, ignoring the empty string browsers send for a blank field.
    pub fn caller_key(&self) -> Option<&str> {
        self.user_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub inference: f64,
}

/// One generated image. Extra provider fields ride along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub b64_json: String,
    pub timings: Timings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeneratedImage {
    pub fn new(b64_json: impl Into<String>, inference: f64) -> Self {
        Self {
            b64_json: b64_json.into(),
            timings: Timings { inference },
            extra: Map::new(),
        }
    }
}

/// Payload for Together's `images/generations` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderImageRequest {
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub response_format: String,
}

impl ProviderImageRequest {
    pub fn for_prompt(prompt: impl Into<String>, iterative_mode: bool) -> Self {
        Self {
            prompt: prompt.into(),
            model: FLUX_SCHNELL_MODEL.to_string(),
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            steps: INFERENCE_STEPS,
            seed: iterative_mode.then_some(ITERATIVE_SEED),
            response_format: "base64".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TogetherImageResponse {
    #[serde(default)]
    pub data: Vec<GeneratedImage>,
}
