//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default TNS endpoint. The sandbox accepts reports without publishing them.
const DEFAULT_TNS_URL: &str = "https://sandbox.wis-tns.org/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the Transient Name Server.
#[derive(Clone, Debug)]
pub struct TnsConfig {
    /// Base URL of the TNS site (from TNS_BASE_URL)
    pub base_url: String,
    /// Bot API key (from TNS_API_KEY)
    pub api_key: String,
    /// Bot id used in the user-agent marker (from TNS_BOT_ID)
    pub bot_id: String,
    /// Bot name used in the user-agent marker (from TNS_BOT_NAME)
    pub bot_name: String,
    /// How many times to ask for a report reply before giving up (from TNS_REPLY_ATTEMPTS)
    pub reply_attempts: u32,
    /// Wait between reply attempts (from TNS_REPLY_INTERVAL_MS)
    pub reply_interval: Duration,
    /// Limit on establishing a connection (from TNS_CONNECT_TIMEOUT_SECS)
    pub connect_timeout: Duration,
    /// Limit on a whole request, response body included (from TNS_REQUEST_TIMEOUT_SECS)
    pub request_timeout: Duration,
}

impl TnsConfig {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("TNS_BASE_URL").unwrap_or_else(|_| DEFAULT_TNS_URL.to_string());
        let api_key = std::env::var("TNS_API_KEY").unwrap_or_default();
        let bot_id = std::env::var("TNS_BOT_ID").unwrap_or_default();
        let bot_name = std::env::var("TNS_BOT_NAME").unwrap_or_default();

        let reply_attempts = std::env::var("TNS_REPLY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let reply_interval = std::env::var("TNS_REPLY_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(1));
        let connect_timeout = secs_from_env("TNS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS);
        let request_timeout = secs_from_env("TNS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);

        if api_key.is_empty() {
            tracing::warn!("TNS_API_KEY is not set; submissions will be rejected by the TNS");
        }

        Self {
            base_url,
            api_key,
            bot_id,
            bot_name,
            reply_attempts,
            reply_interval,
            connect_timeout,
            request_timeout,
        }
    }

    /// Settings pointing at `base_url` with no polling delay.
    pub fn for_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: String::new(),
            bot_id: String::new(),
            bot_name: String::new(),
            reply_attempts: 10,
            reply_interval: Duration::ZERO,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

fn secs_from_env(var: &str, default: u64) -> Duration {
    let secs = std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Database location: TNS_REPORTER_DB if set, otherwise the platform data dir.
pub fn database_path() -> Option<PathBuf> {
    std::env::var_os("TNS_REPORTER_DB").map(PathBuf::from)
}
