//! Server configuration from environment.

use std::env;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    /// Shared secret the external scheduler must present to trigger a pass.
    pub check_secret: String,
    pub forecast_base_url: String,
    pub forecast_model: String,
    /// Relay endpoint that performs the actual Web Push delivery.
    pub push_relay_url: String,
    pub notification_icon: Option<String>,
    pub rate_limit_rps: u32,
    pub rate_limit_enabled: bool,
    pub trust_proxy: bool,
}

impl Config {
    /// Load configuration. Missing required secrets are a fatal
    /// configuration error: no partial processing may happen without them.
    pub fn from_env() -> Result<Self> {
        let check_secret = env::var("FLYWATCH_CHECK_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let Some(check_secret) = check_secret else {
            anyhow::bail!("FLYWATCH_CHECK_SECRET is not set");
        };

        let push_relay_url = env::var("FLYWATCH_PUSH_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let Some(push_relay_url) = push_relay_url else {
            anyhow::bail!("FLYWATCH_PUSH_URL is not set");
        };

        Ok(Self {
            server_port: env::var("FLYWATCH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            database_path: env::var("FLYWATCH_DB")
                .unwrap_or_else(|_| "data/flywatch.db".to_string()),
            check_secret,
            forecast_base_url: env::var("FLYWATCH_FORECAST_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1/forecast".to_string()),
            forecast_model: env::var("FLYWATCH_FORECAST_MODEL")
                .unwrap_or_else(|_| "best_match".to_string()),
            push_relay_url,
            notification_icon: env::var("FLYWATCH_NOTIFICATION_ICON")
                .ok()
                .filter(|s| !s.is_empty())
                .or_else(|| Some("/icons/icon-192.png".to_string())),
            rate_limit_rps: env::var("FLYWATCH_RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            rate_limit_enabled: env::var("FLYWATCH_RATE_LIMIT_ENABLED")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(true),
            trust_proxy: env::var("FLYWATCH_TRUST_PROXY")
                .map(|s| s == "1" || s.to_lowercase() == "true")
                .unwrap_or(false),
        })
    }
}
