use std::time::Duration;
use tracing::info;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Settings for a chat session and its REST client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the profile/interest REST API.
    pub api_base_url: String,
    /// How many backlog messages to seed a session with.
    pub history_limit: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ChatConfig {
    /// Build a config from environment variables, loading `.env` first if
    /// one exists (its absence is not an error).
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            info!("No .env file found or failed to load: {}", e);
        }

        let mut config = Self::default();
        if let Ok(url) = std::env::var("RISHTA_API_URL") {
            config.api_base_url = url;
        }
        if let Some(limit) = std::env::var("RISHTA_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.history_limit = limit;
        }
        config
    }
}
