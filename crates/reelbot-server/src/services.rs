//! Wires the engine components from configuration.

use std::sync::Arc;
use std::time::Duration;

use reelbot_core::{AppConfig, Clock, Store, ThemesFile};
use reelbot_engine::{
    CommandRenderer, ContentSelector, GenerationPipeline, LifecycleManager, MetricsCollector,
    PublicationScheduler, DEFAULT_RENDER_TIMEOUT,
};
use reelbot_graph::{GraphClient, GraphConfig};

/// Engine components shared by the periodic jobs and the HTTP API.
///
/// Publication and metrics need Graph API credentials; generation needs a
/// render command. Each is `None` when its prerequisite is missing.
pub struct Services {
    pub lifecycle: LifecycleManager,
    pub publication: Option<Arc<PublicationScheduler>>,
    pub metrics: Option<Arc<MetricsCollector>>,
    pub pipeline: Option<Arc<GenerationPipeline>>,
}

impl Services {
    /// # Errors
    ///
    /// Returns an error if the Graph client or the render command cannot be
    /// constructed.
    pub fn build(
        config: &AppConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        themes: ThemesFile,
    ) -> anyhow::Result<Self> {
        let lifecycle = LifecycleManager::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.posting_slots.clone(),
        );

        let (publication, metrics) = match GraphConfig::from_app_config(config) {
            Some(graph_config) => {
                let graph = Arc::new(GraphClient::new(graph_config)?);
                let publication = PublicationScheduler::new(
                    Arc::clone(&store),
                    graph.clone(),
                    Arc::clone(&clock),
                    config.retry_policy(),
                    config.publish_timeout(),
                    config.publish_batch_limit,
                );
                let metrics = MetricsCollector::new(
                    Arc::clone(&store),
                    graph,
                    Arc::clone(&clock),
                    Duration::from_secs(config.metrics_interval_secs),
                    Duration::from_secs(config.metrics_maturation_secs),
                    config.metrics_timeout(),
                );
                (Some(Arc::new(publication)), Some(Arc::new(metrics)))
            }
            None => {
                tracing::warn!(
                    "REELBOT_GRAPH_ACCESS_TOKEN or REELBOT_GRAPH_USER_ID not set; publishing and metrics disabled"
                );
                (None, None)
            }
        };

        let pipeline = match config.render_command.as_deref() {
            Some(command) => {
                let renderer = CommandRenderer::new(command, DEFAULT_RENDER_TIMEOUT)?;
                let selector =
                    ContentSelector::new(store, themes, config.weight_policy(), clock);
                Some(Arc::new(GenerationPipeline::new(
                    Arc::new(selector),
                    Arc::new(renderer),
                    lifecycle.clone(),
                )))
            }
            None => {
                tracing::info!("REELBOT_RENDER_COMMAND not set; queue top-up disabled");
                None
            }
        };

        Ok(Self {
            lifecycle,
            publication,
            metrics,
            pipeline,
        })
    }
}
