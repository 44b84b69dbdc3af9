use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Notion,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub frontend_url: String,

    pub booking_store: StoreBackend,
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    pub notion_api_url: String,
    pub notion_version: String,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_url: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,

    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub team_email: Option<String>,

    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub notify_max_attempts: u32,
    pub rate_limit_per_minute: u32,

    /// Enables the durable dispatch ledger when set
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("frontend_url", "http://localhost:3000")?
            .set_default("booking_store", "notion")?
            .set_default("notion_api_url", "https://api.notion.com")?
            .set_default("notion_version", "2022-06-28")?
            .set_default("stripe_api_url", "https://api.stripe.com")?
            .set_default("currency", "usd")?
            .set_default("webhook_tolerance_secs", 300)?
            .set_default("from_email", "bookings@localhost")?
            .set_default("poll_interval_secs", 15)?
            .set_default("http_timeout_secs", 30)?
            .set_default("notify_max_attempts", 3)?
            .set_default("rate_limit_per_minute", 30)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Checks the combinations `from_env` cannot express on its own
    pub fn validate(&self) -> AppResult<()> {
        if self.booking_store == StoreBackend::Notion
            && (self.notion_token.is_none() || self.notion_database_id.is_none())
        {
            return Err(AppError::Config(
                "NOTION_TOKEN and NOTION_DATABASE_ID must be set for the notion store".to_string(),
            ));
        }
        if self.stripe_secret_key.is_none() || self.stripe_webhook_secret.is_none() {
            return Err(AppError::Config(
                "STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must be set".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("POLL_INTERVAL_SECS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
