use std::env;

pub const DEFAULT_TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";
pub const HELICONE_BASE_URL: &str = "https://together.helicone.ai/v1";

#[derive(Debug, Clone, Default)]
pub struct TogetherConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HeliconeConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstashConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub production: bool,
    pub together: TogetherConfig,
    pub helicone: Option<HeliconeConfig>,
    pub upstash: Option<UpstashConfig>,
}

/// Reads a variable, treating an empty value as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl TogetherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        TogetherConfig {
            api_key: non_empty_var("TOGETHER_API_KEY"),
            base_url: non_empty_var("TOGETHER_BASE_URL"),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

impl HeliconeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Option<Self> {
        non_empty_var("HELICONE_API_KEY").map(|key| HeliconeConfig { api_key: Some(key) })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl UpstashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self.token = Some(token.into());
        self
    }

    /// Rate limiting is only switched on when the REST URL is present.
    pub fn from_env() -> Option<Self> {
        let url = non_empty_var("UPSTASH_REDIS_REST_URL")?;
        let token = non_empty_var("UPSTASH_REDIS_REST_TOKEN");

        Some(UpstashConfig {
            url: Some(url),
            token,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: None,
            port: None,
            production: false,
            together: TogetherConfig::default(),
            helicone: None,
            upstash: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let host = non_empty_var("HOST");
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        let production = env::var("APP_ENV").map_or(false, |val| val == "production");

        Config {
            host,
            port,
            production,
            together: TogetherConfig::from_env(),
            helicone: HeliconeConfig::from_env(),
            upstash: UpstashConfig::from_env(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_together(mut self, config: TogetherConfig) -> Self {
        self.together = config;
        self
    }

    pub fn with_helicone(mut self, config: HeliconeConfig) -> Self {
        self.helicone = Some(config);
        self
    }

    pub fn with_upstash(mut self, config: UpstashConfig) -> Self {
        self.upstash = Some(config);
        self
    }

    pub fn bind_host(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn bind_port(&self) -> u16 {
        self.port.unwrap_or(3000)
    }

    /// Where provider calls go: the Helicone proxy when configured, else Together directly.
    pub fn provider_base_url(&self) -> &str {
        if self.helicone_key().is_some() {
            return HELICONE_BASE_URL;
        }
        self.together
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_TOGETHER_BASE_URL)
    }

    pub fn helicone_key(&self) -> Option<&str> {
        self.helicone.as_ref().and_then(|h| h.api_key.as_deref())
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.upstash.as_ref().map_or(false, |u| u.url.is_some())
    }
}
