pub mod app_config;
pub mod clock;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
pub mod selection;
pub mod slots;
pub mod store;
pub mod themes;

pub use app_config::{AppConfig, Environment};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use domain::{
    Asset, AssetKind, DuePost, EngagementCounts, NewAsset, NewPostMetrics, NewReel, PostMetrics,
    PostStatus, PublishResult, PublishedPost, QueueStatus, Reel, RenderMetadata, RenderResult,
    ScheduledPost, ThemedCombination,
};
pub use lifecycle::{InvalidTransition, ReelEvent, ReelStatus};
pub use metrics::{bucket_start, engagement_rate};
pub use retry::{FailureDisposition, RetryPolicy};
pub use selection::{selection_weight, WeightPolicy};
pub use slots::{next_posting_time, parse_posting_slots, PostingSlot};
pub use store::{AssetStore, MetricsStore, PostStore, ReelStore, Store, StoreError};
pub use themes::{load_themes, parse_themes, Theme, ThemesFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read themes file {path}: {source}")]
    ThemesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse themes file: {0}")]
    ThemesFileParse(#[from] serde_yaml::Error),
    #[error("invalid themes file: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown asset kind: {0}")]
    UnknownAssetKind(String),
    #[error("unknown reel status: {0}")]
    UnknownReelStatus(String),
    #[error("unknown scheduled post status: {0}")]
    UnknownPostStatus(String),
    #[error("invalid posting slot '{slot}': {reason}")]
    InvalidPostingSlot { slot: String, reason: String },
}
