use crate::{
    config::UpstashConfig,
    error::{PaintError, Result},
    ratelimit::traits::CounterStore,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// INCR and set the expiry on first touch, in one round-trip.
const FIXED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local window = ARGV[1]
local count = redis.call("INCR", key)
if count == 1 then
  redis.call("PEXPIRE", key, window)
end
return count
"#;

/// Counters kept in Upstash Redis, reached over its REST API.
pub struct UpstashCounterStore {
    client: Client,
    base_url: String,
    token: String,
}

impl UpstashCounterStore {
    pub fn new(config: UpstashConfig) -> Result<Self> {
        let base_url = config
            .url
            .ok_or_else(|| PaintError::Config("Upstash URL is required".into()))?;

        let token = config
            .token
            .ok_or_else(|| PaintError::Config("Upstash token is required".into()))?;

        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn command(key: &str, ttl: Duration) -> Value {
        json!([
            "EVAL",
            FIXED_WINDOW_SCRIPT,
            "1",
            key,
            ttl.as_millis().to_string()
        ])
    }
}

fn parse_count(body: &Value) -> Result<u64> {
    if let Some(error) = body["error"].as_str() {
        return Err(PaintError::Store(error.to_string()));
    }
    body["result"]
        .as_u64()
        .or_else(|| body["result"].as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| PaintError::Store(format!("Unexpected Upstash response: {}", body)))
}

#[async_trait]
impl CounterStore for UpstashCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&Self::command(key, ttl))
            .send()
            .await
            .map_err(|e| PaintError::Store(format!("Upstash request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            PaintError::Store(format!("Failed to parse Upstash response ({}): {}", status, e))
        })?;

        parse_count(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn requires_url_and_token() {
        assert!(UpstashCounterStore::new(UpstashConfig::new()).is_err());
        let mut partial = UpstashConfig::new();
        partial.url = Some("https://example.upstash.io".into());
        assert!(UpstashCounterStore::new(partial).is_err());
        assert!(UpstashCounterStore::new(
            UpstashConfig::new().with_credentials("https://example.upstash.io/", "t")
        )
        .is_ok());
    }

    #[test]
    fn command_is_a_single_eval() {
        let command = UpstashCounterStore::command("keystrokeimagen:1.2.3.4:7", Duration::from_secs(60));
        assert_eq!(command[0], "EVAL");
        assert_eq!(command[2], "1");
        assert_eq!(command[3], "keystrokeimagen:1.2.3.4:7");
        assert_eq!(command[4], "60000");
    }

    #[test]
    fn parses_counts_and_errors() {
        assert_eq!(parse_count(&json!({ "result": 3 })).unwrap(), 3);
        assert_eq!(parse_count(&json!({ "result": "4" })).unwrap(), 4);
        assert!(matches!(
            parse_count(&json!({ "error": "WRONGPASS" })),
            Err(PaintError::Store(_))
        ));
        assert!(parse_count(&json!({})).is_err());
    }

    fn store(url: &str) -> UpstashCounterStore {
        UpstashCounterStore::new(UpstashConfig::new().with_credentials(url, "token-1")).unwrap()
    }

    #[tokio::test]
    async fn increment_runs_the_script_over_rest() {
        let (url, server) = serve_once(200, "application/json", r#"{"result":7}"#).await;
        let count = store(&url)
            .increment("keystrokeimagen:1.2.3.4:20000", Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(count, 7);

        let received = server.await.unwrap();
        assert!(received.request_line.starts_with("POST / "));
        assert_eq!(received.header("authorization"), Some("Bearer token-1"));
        let command = received.json();
        assert_eq!(command[0], "EVAL");
        assert_eq!(command[3], "keystrokeimagen:1.2.3.4:20000");
        assert_eq!(command[4], "86400000");
    }

    #[tokio::test]
    async fn rest_errors_surface_as_store_errors() {
        let (url, server) =
            serve_once(401, "application/json", r#"{"error":"WRONGPASS invalid token"}"#).await;
        let err = store(&url)
            .increment("k", Duration::from_secs(1))
            .await
            .unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, PaintError::Store(ref m) if m.contains("WRONGPASS")));

        let (url, server) = serve_once(500, "text/plain", "oops").await;
        let err = store(&url)
            .increment("k", Duration::from_secs(1))
            .await
            .unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, PaintError::Store(_)));
    }
}
