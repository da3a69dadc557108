use reelbot_engine::{MetricsError, PublishError};
use thiserror::Error;

/// Errors returned by the Graph API client.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Graph API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The media container finished processing with an error.
    #[error("media container {container_id} failed processing: {status}")]
    Processing {
        container_id: String,
        status: String,
    },

    /// The container was still processing when polling gave up.
    #[error("media container {container_id} not finished after {polls} polls")]
    NotFinished { container_id: String, polls: u32 },

    /// A local locator with no configured public base URL.
    #[error("no public URL for media locator '{0}'; set REELBOT_MEDIA_BASE_URL")]
    NoPublicUrl(String),

    #[error("invalid Graph API configuration: {0}")]
    Config(String),
}

impl GraphError {
    /// Server-side failures, timeouts, and connection failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Status { status, .. } => (500..600).contains(status),
            Self::NotFinished { .. } => true,
            Self::Deserialize { .. }
            | Self::Processing { .. }
            | Self::NoPublicUrl(_)
            | Self::Config(_) => false,
        }
    }
}

impl From<GraphError> for PublishError {
    fn from(err: GraphError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

impl From<GraphError> for MetricsError {
    fn from(err: GraphError) -> Self {
        if err.is_transient() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Rejected(err.to_string())
        }
    }
}
