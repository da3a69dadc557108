//! HTTP client for the Instagram Graph API.
//!
//! Publishing is the three-step container flow: create a `REELS` container
//! pointing at a public video URL, poll it until processing finishes, then
//! call `media_publish`. Insights come from `/{media-id}/insights`.

use std::time::Duration;

use async_trait::async_trait;
use reelbot_core::{AppConfig, EngagementCounts, PublishResult};
use reelbot_engine::{MetricsError, MetricsSource, PublishError, Publisher};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::GraphError;
use crate::retry::retry_with_backoff;
use crate::types::{ContainerStatus, ErrorEnvelope, IdResponse, InsightsResponse, PermalinkResponse};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v19.0";

const INSIGHT_METRICS: &str = "likes,comments,shares,reach,saved";

#[derive(Clone)]
pub struct GraphConfig {
    pub access_token: String,
    /// Instagram business account id.
    pub user_id: String,
    pub base_url: String,
    /// Prefix turning a local output locator into a URL the API can fetch.
    pub media_base_url: Option<String>,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Wall-clock cap on waiting for a container, retried polls included.
    pub processing_budget: Duration,
    /// Single-attempt cap on the permalink lookup after `media_publish`.
    pub permalink_timeout: Duration,
    /// Extra attempts for GET requests that fail transiently.
    pub read_retries: u32,
    pub read_backoff_base_ms: u64,
}

impl GraphConfig {
    #[must_use]
    pub fn new(access_token: &str, user_id: &str) -> Self {
        Self {
            access_token: access_token.to_owned(),
            user_id: user_id.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            media_base_url: None,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            max_polls: 60,
            processing_budget: Duration::from_secs(300),
            permalink_timeout: Duration::from_secs(5),
            read_retries: 2,
            read_backoff_base_ms: 1_000,
        }
    }

    /// Returns `None` when publishing credentials are not configured.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let token = config.graph_access_token.as_deref()?;
        let user_id = config.graph_user_id.as_deref()?;
        let graph = Self {
            base_url: config.graph_base_url.clone(),
            media_base_url: config.media_base_url.clone(),
            ..Self::new(token, user_id)
        };
        Some(graph.within_publish_timeout(config.publish_timeout()))
    }

    /// Shrinks the request, processing and permalink budgets so a whole
    /// publish ends before `publish_timeout`.
    ///
    /// The worst case is two write requests, the processing budget and the
    /// permalink lookup. A tenth of the timeout is held back for the
    /// caller's outcome write.
    #[must_use]
    pub fn within_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.request_timeout = self.request_timeout.min(publish_timeout / 6);
        self.permalink_timeout = self.permalink_timeout.min(publish_timeout / 12);
        let reserved = self.request_timeout * 2 + self.permalink_timeout + publish_timeout / 10;
        self.processing_budget = self
            .processing_budget
            .min(publish_timeout.saturating_sub(reserved));
        let polls = self.processing_budget.as_millis() / self.poll_interval.as_millis().max(1);
        self.max_polls = self
            .max_polls
            .min(u32::try_from(polls).unwrap_or(u32::MAX))
            .max(1);
        self
    }
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("access_token", &"[redacted]")
            .field("user_id", &self.user_id)
            .field("base_url", &self.base_url)
            .field("media_base_url", &self.media_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .field("processing_budget", &self.processing_budget)
            .field("permalink_timeout", &self.permalink_timeout)
            .finish_non_exhaustive()
    }
}

/// Graph API client implementing [`Publisher`] and [`MetricsSource`].
#[derive(Debug)]
pub struct GraphClient {
    client: Client,
    config: GraphConfig,
    base_url: Url,
}

impl GraphClient {
    /// # Errors
    ///
    /// Returns [`GraphError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`GraphError::Config`] if the base URL does not parse.
    pub fn new(config: GraphConfig) -> Result<Self, GraphError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("reelbot/0.1")
            .build()?;

        // A single trailing slash makes `Url::join` append instead of
        // replacing the version segment.
        let normalised = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            GraphError::Config(format!("invalid base URL '{}': {e}", config.base_url))
        })?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GraphError> {
        self.base_url
            .join(path)
            .map_err(|e| GraphError::Config(format!("invalid endpoint '{path}': {e}")))
    }

    /// Maps an output locator to a URL the API can download.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoPublicUrl`] for a local path when no media
    /// base URL is configured.
    pub fn public_url(&self, locator: &str) -> Result<String, GraphError> {
        if locator.starts_with("https://") || locator.starts_with("http://") {
            return Ok(locator.to_owned());
        }
        match &self.config.media_base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                locator.trim_start_matches("./").trim_start_matches('/')
            )),
            None => Err(GraphError::NoPublicUrl(locator.to_owned())),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, GraphError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
                |_| body.clone(),
                |e| match e.error.code {
                    Some(code) => format!("{} (code {code})", e.error.message),
                    None => e.error.message,
                },
            );
            return Err(GraphError::Status {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| GraphError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GraphError> {
        let url = self.endpoint(path)?;
        retry_with_backoff(
            self.config.read_retries,
            self.config.read_backoff_base_ms,
            || {
                let request = self
                    .client
                    .get(url.clone())
                    .query(query)
                    .query(&[("access_token", self.config.access_token.as_str())]);
                self.send_json(request, path)
            },
        )
        .await
    }

    /// Creates a `REELS` container and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the request fails or the API rejects it.
    pub async fn create_container(&self, video_url: &str, caption: &str) -> Result<String, GraphError> {
        let path = format!("{}/media", self.config.user_id);
        let request = self.client.post(self.endpoint(&path)?).form(&[
            ("media_type", "REELS"),
            ("video_url", video_url),
            ("caption", caption),
            ("access_token", self.config.access_token.as_str()),
        ]);
        let created: IdResponse = self.send_json(request, &path).await?;
        tracing::info!(container_id = %created.id, "media container created");
        Ok(created.id)
    }

    /// Polls until the container reports `FINISHED`, for at most
    /// `max_polls` polls and `processing_budget` of wall-clock time.
    ///
    /// Transient poll failures are logged and the next poll proceeds.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Processing`] if the container errors or
    /// expires, [`GraphError::NotFinished`] when either limit runs out, or
    /// any permanent request error.
    pub async fn wait_until_finished(&self, container_id: &str) -> Result<(), GraphError> {
        let mut polls = 0;
        let outcome = tokio::time::timeout(
            self.config.processing_budget,
            self.poll_container(container_id, &mut polls),
        )
        .await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    container_id,
                    polls,
                    budget_secs = self.config.processing_budget.as_secs(),
                    "container processing budget exhausted"
                );
                Err(GraphError::NotFinished {
                    container_id: container_id.to_owned(),
                    polls,
                })
            }
        }
    }

    async fn poll_container(&self, container_id: &str, polls: &mut u32) -> Result<(), GraphError> {
        let max_polls = self.config.max_polls;
        for poll in 1..=max_polls {
            tokio::time::sleep(self.config.poll_interval).await;
            *polls = poll;
            let status = match self
                .get_json::<ContainerStatus>(container_id, &[("fields", "status_code,status")])
                .await
            {
                Ok(status) => status,
                Err(err) if err.is_transient() => {
                    tracing::warn!(container_id, poll, error = %err, "container status check failed");
                    continue;
                }
                Err(err) => return Err(err),
            };

            match status.status_code.as_deref() {
                Some("FINISHED") => return Ok(()),
                Some(code @ ("ERROR" | "EXPIRED")) => {
                    return Err(GraphError::Processing {
                        container_id: container_id.to_owned(),
                        status: status.status.unwrap_or_else(|| code.to_owned()),
                    });
                }
                code => {
                    tracing::debug!(container_id, poll, max_polls, status_code = ?code, "container processing");
                }
            }
        }
        Err(GraphError::NotFinished {
            container_id: container_id.to_owned(),
            polls: max_polls,
        })
    }

    /// Publishes a finished container and returns the media id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the request fails or the API rejects it.
    pub async fn publish_container(&self, container_id: &str) -> Result<String, GraphError> {
        let path = format!("{}/media_publish", self.config.user_id);
        let request = self.client.post(self.endpoint(&path)?).form(&[
            ("creation_id", container_id),
            ("access_token", self.config.access_token.as_str()),
        ]);
        let published: IdResponse = self.send_json(request, &path).await?;
        Ok(published.id)
    }

    /// Permalink of a published media object; `None` if the lookup fails.
    ///
    /// The reel is already live by now, so this is one attempt capped at
    /// `permalink_timeout` with no retries.
    pub async fn permalink(&self, media_id: &str) -> Option<String> {
        match self.fetch_permalink(media_id).await {
            Ok(found) => found.permalink,
            Err(err) => {
                tracing::warn!(media_id, error = %err, "permalink lookup failed");
                None
            }
        }
    }

    async fn fetch_permalink(&self, media_id: &str) -> Result<PermalinkResponse, GraphError> {
        let request = self
            .client
            .get(self.endpoint(media_id)?)
            .timeout(self.config.permalink_timeout)
            .query(&[
                ("fields", "permalink"),
                ("access_token", self.config.access_token.as_str()),
            ]);
        self.send_json(request, media_id).await
    }

    /// Runs the full container flow for one reel.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] along the way.
    pub async fn publish_reel(&self, locator: &str, caption: &str) -> Result<PublishResult, GraphError> {
        let video_url = self.public_url(locator)?;
        let container_id = self.create_container(&video_url, caption).await?;
        self.wait_until_finished(&container_id).await?;
        let media_id = self.publish_container(&container_id).await?;
        tracing::info!(container_id = %container_id, media_id = %media_id, "reel published to Instagram");
        let permalink = self.permalink(&media_id).await;
        Ok(PublishResult {
            external_media_id: media_id,
            permalink,
        })
    }

    /// Lifetime insights for a media object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the request fails or the body is malformed.
    pub async fn insights(&self, media_id: &str) -> Result<EngagementCounts, GraphError> {
        let path = format!("{media_id}/insights");
        let response: InsightsResponse = self
            .get_json(&path, &[("metric", INSIGHT_METRICS)])
            .await?;
        Ok(response.counts())
    }
}

#[async_trait]
impl Publisher for GraphClient {
    async fn publish(&self, locator: &str, caption: &str) -> Result<PublishResult, PublishError> {
        Ok(self.publish_reel(locator, caption).await?)
    }
}

#[async_trait]
impl MetricsSource for GraphClient {
    async fn fetch(&self, external_media_id: &str) -> Result<EngagementCounts, MetricsError> {
        Ok(self.insights(external_media_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(media_base_url: Option<&str>) -> GraphClient {
        let mut config = GraphConfig::new("secret-token", "17841400000");
        config.media_base_url = media_base_url.map(str::to_owned);
        GraphClient::new(config).expect("client construction should not fail")
    }

    #[test]
    fn endpoint_keeps_the_version_segment() {
        let client = client(None);
        assert_eq!(
            client.endpoint("17841400000/media").unwrap().as_str(),
            "https://graph.facebook.com/v19.0/17841400000/media"
        );
    }

    #[test]
    fn absolute_locators_pass_through() {
        let client = client(None);
        assert_eq!(
            client.public_url("https://cdn.example.com/r/1.mp4").unwrap(),
            "https://cdn.example.com/r/1.mp4"
        );
    }

    #[test]
    fn local_locators_need_a_media_base_url() {
        assert!(matches!(
            client(None).public_url("output/1.mp4"),
            Err(GraphError::NoPublicUrl(_))
        ));
        assert_eq!(
            client(Some("https://cdn.example.com/reels/"))
                .public_url("./output/1.mp4")
                .unwrap(),
            "https://cdn.example.com/reels/output/1.mp4"
        );
    }

    #[test]
    fn debug_redacts_the_token() {
        let rendered = format!("{:?}", GraphConfig::new("secret-token", "1"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let mut config = GraphConfig::new("t", "1");
        config.base_url = "not a url".to_owned();
        assert!(matches!(GraphClient::new(config), Err(GraphError::Config(_))));
    }
}
