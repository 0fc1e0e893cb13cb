use crate::error::{Result, StreamError};
use std::time::Duration;

pub const ENV_URL: &str = "DATASTREAM_URL";
pub const ENV_PUSH_URL: &str = "DATASTREAM_PUSH_URL";
pub const ENV_API_KEY: &str = "DATASTREAM_API_KEY";
pub const ENV_PUSH_INSERT: &str = "DATASTREAM_PUSH_INSERT";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST root, e.g. `http://localhost:8000/api/v1`.
    pub url: String,
    /// WebSocket endpoint. Subscriptions and push inserts are unavailable without it.
    pub push_url: Option<String>,
    pub api_key: Option<String>,
    /// Try inserts over the push connection before falling back to HTTP.
    pub push_insert: bool,
    pub timeout: Duration,
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api/v1".to_string(),
            push_url: None,
            api_key: None,
            push_insert: false,
            timeout: Duration::from_secs(30),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENV_URL).map_err(|_| StreamError::MissingUrl)?;
        let mut config = Self::new(url);
        config.push_url = std::env::var(ENV_PUSH_URL).ok();
        config.api_key = std::env::var(ENV_API_KEY).ok();
        config.push_insert = std::env::var(ENV_PUSH_INSERT)
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(config)
    }

    pub fn with_push_url(mut self, push_url: impl Into<String>) -> Self {
        self.push_url = Some(push_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_push_insert(mut self, enabled: bool) -> Self {
        self.push_insert = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub auto_reconnect: bool,
    pub reconnect_intervals: Vec<Duration>,
    pub max_reconnect_attempts: u32,
    pub ping_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_intervals: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ],
            max_reconnect_attempts: 5,
            ping_interval: Duration::from_secs(15),
        }
    }
}

impl ConnectionConfig {
    /// Backoff before reconnect attempt `attempt`; the last interval repeats.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.reconnect_intervals
            .get(attempt as usize)
            .copied()
            .unwrap_or_else(|| {
                self.reconnect_intervals
                    .last()
                    .copied()
                    .unwrap_or(Duration::from_secs(16))
            })
    }
}
