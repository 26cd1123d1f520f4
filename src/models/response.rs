use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PaintError;

pub const MISSING_KEY_MESSAGE: &str = "API key is required. Please provide your Together API key.";
pub const RATE_LIMITED_MESSAGE: &str =
    "No requests left. Please add your own API Key or try again later.";

/// JSON body of every non-2xx gateway response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(rename = "resetAt", default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<i64>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            code: None,
            details: None,
            reset_at: None,
        }
    }

    /// Text shown to the user: `error`, else `message`, else a generic line.
    pub fn display_message(&self) -> String {
        if !self.error.is_empty() {
            return self.error.clone();
        }
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "An error occurred".to_string())
    }
}

impl From<&PaintError> for ErrorBody {
    fn from(err: &PaintError) -> Self {
        match err {
            PaintError::Validation(detail) => ErrorBody {
                message: Some(detail.clone()),
                ..ErrorBody::new("Invalid request body")
            },
            PaintError::Auth(message) => ErrorBody::new(message.clone()),
            PaintError::RateLimited { reset_at } => ErrorBody {
                message: Some(RATE_LIMITED_MESSAGE.to_string()),
                reset_at: Some(*reset_at),
                ..ErrorBody::new("Rate limit exceeded")
            },
            PaintError::Provider {
                status,
                message,
                details,
            } => ErrorBody {
                code: Some(*status),
                details: Some(details.clone().unwrap_or(Value::Null)),
                ..ErrorBody::new(message.clone())
            },
            other => ErrorBody {
                code: Some(other.status()),
                ..ErrorBody::new(other.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_body_carries_reset() {
        let body = ErrorBody::from(&PaintError::RateLimited { reset_at: 86_400_000 });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Rate limit exceeded");
        assert_eq!(json["resetAt"], 86_400_000);
        assert!(json.get("code").is_none());
    }

    #[test]
    fn provider_body_has_null_details_when_absent() {
        let body = ErrorBody::from(&PaintError::provider(Some(402), "Payment required", None));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            json!({ "error": "Payment required", "code": 402, "details": null })
        );
    }

    #[test]
    fn display_message_falls_back() {
        let mut body = ErrorBody::new("");
        assert_eq!(body.display_message(), "An error occurred");
        body.message = Some("slow down".into());
        assert_eq!(body.display_message(), "slow down");
    }

    #[test]
    fn message_only_body_still_parses() {
        let body: ErrorBody = serde_json::from_value(json!({ "message": "slow down" })).unwrap();
        assert_eq!(body.display_message(), "slow down");

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.display_message(), "An error occurred");
    }
}
