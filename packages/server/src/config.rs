use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use telegram_auth::ProxyConfig;

use crate::domains::login::LoginConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub bridge_url: String,
    pub api_id: i32,
    pub api_hash: String,
    /// Optional proxy for outbound auth sessions. A malformed TG_PROXY value
    /// fails startup instead of silently connecting unproxied.
    pub proxy: Option<ProxyConfig>,
    pub login: LoginConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let proxy = match env::var("TG_PROXY") {
            Ok(raw) => Some(
                raw.parse::<ProxyConfig>()
                    .context("TG_PROXY must be scheme://[user:pass@]host:port")?,
            ),
            Err(_) => None,
        };

        let mut login = LoginConfig::default();
        if let Some(secs) = optional_secs("LOGIN_RESEND_INTERVAL_SECS")? {
            login.resend_interval = secs;
        }
        if let Some(secs) = optional_secs("LOGIN_PENDING_EXPIRY_SECS")? {
            login.pending_expiry = secs;
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://forgifts.db".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            bridge_url: env::var("TG_BRIDGE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            api_id: env::var("TG_API_ID")
                .context("TG_API_ID must be set")?
                .parse()
                .context("TG_API_ID must be a valid number")?,
            api_hash: env::var("TG_API_HASH").context("TG_API_HASH must be set")?,
            proxy,
            login,
        })
    }
}

fn optional_secs(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number of seconds"))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
