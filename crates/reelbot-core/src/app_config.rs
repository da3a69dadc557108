use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::selection::WeightPolicy;
use crate::slots::PostingSlot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub themes_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub publish_interval_secs: u64,
    pub publish_max_retries: u32,
    pub publish_backoff_base_secs: u64,
    pub publish_backoff_max_secs: u64,
    pub publish_timeout_secs: u64,
    pub publish_batch_limit: i64,
    pub metrics_interval_secs: u64,
    pub metrics_maturation_secs: u64,
    pub metrics_timeout_secs: u64,
    pub selection_freshness_days: u32,
    pub selection_dampening: f64,
    pub generate_interval_secs: u64,
    pub queue_target: u32,
    pub queue_low_watermark: u32,
    pub posting_slots: Vec<PostingSlot>,
    pub render_command: Option<String>,
    pub graph_access_token: Option<String>,
    pub graph_user_id: Option<String>,
    pub graph_base_url: String,
    pub media_base_url: Option<String>,
}

impl AppConfig {
    /// Retry/backoff policy for the publication scheduler.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.publish_max_retries,
            base_delay: Duration::from_secs(self.publish_backoff_base_secs),
            max_delay: Duration::from_secs(self.publish_backoff_max_secs),
        }
    }

    /// Usage/recency weighting used by the content selector.
    #[must_use]
    pub fn weight_policy(&self) -> WeightPolicy {
        WeightPolicy {
            freshness_window: chrono::Duration::days(i64::from(self.selection_freshness_days)),
            dampening: self.selection_dampening,
        }
    }

    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    #[must_use]
    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    /// Returns `true` when both Graph API credentials are present.
    #[must_use]
    pub fn publishing_enabled(&self) -> bool {
        self.graph_access_token.is_some() && self.graph_user_id.is_some()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("themes_path", &self.themes_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("publish_interval_secs", &self.publish_interval_secs)
            .field("publish_max_retries", &self.publish_max_retries)
            .field("publish_backoff_base_secs", &self.publish_backoff_base_secs)
            .field("publish_backoff_max_secs", &self.publish_backoff_max_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("publish_batch_limit", &self.publish_batch_limit)
            .field("metrics_interval_secs", &self.metrics_interval_secs)
            .field("metrics_maturation_secs", &self.metrics_maturation_secs)
            .field("metrics_timeout_secs", &self.metrics_timeout_secs)
            .field("selection_freshness_days", &self.selection_freshness_days)
            .field("selection_dampening", &self.selection_dampening)
            .field("generate_interval_secs", &self.generate_interval_secs)
            .field("queue_target", &self.queue_target)
            .field("queue_low_watermark", &self.queue_low_watermark)
            .field("posting_slots", &self.posting_slots)
            .field("render_command", &self.render_command)
            .field(
                "graph_access_token",
                &self.graph_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("graph_user_id", &self.graph_user_id)
            .field("graph_base_url", &self.graph_base_url)
            .field("media_base_url", &self.media_base_url)
            .finish()
    }
}
