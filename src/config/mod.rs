use dotenvy::dotenv;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::shared::{DeskError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "ticketdesk.toml";
pub const ENV_PREFIX: &str = "TICKETDESK_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            feed: FeedConfig {
                poll_interval_ms: 2_000,
            },
            notifications: NotificationConfig {
                poll_interval_secs: 30,
            },
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Defaults, then `ticketdesk.toml` (or `path`), then `TICKETDESK_*`
    /// variables with `__` separating sections.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(DeskError::Config("api.base_url must be set".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DeskError::Config(format!(
                "api.base_url must be an http(s) URL, got {url}"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(DeskError::Config("api.timeout_secs must be positive".to_string()));
        }
        if self.feed.poll_interval_ms == 0 {
            return Err(DeskError::Config("feed.poll_interval_ms must be positive".to_string()));
        }
        if self.notifications.poll_interval_secs == 0 {
            return Err(DeskError::Config(
                "notifications.poll_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed.poll_interval_ms)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notifications.poll_interval_secs)
    }
}
