//! Engine wiring shared by the command handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reelbot_core::{
    AppConfig, Clock, RenderResult, Store, SystemClock, ThemedCombination, ThemesFile,
};
use reelbot_engine::{
    CommandRenderer, ContentSelector, GenerationPipeline, LifecycleManager, MetricsCollector,
    PublicationScheduler, RenderError, Renderer, DEFAULT_RENDER_TIMEOUT,
};
use reelbot_graph::{GraphClient, GraphConfig};
use sqlx::PgPool;

pub(crate) struct AppContext {
    pub config: AppConfig,
    pub pool: PgPool,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

/// Stands in when no render command is configured; registering externally
/// rendered reels still works through it.
struct NoRenderer;

#[async_trait]
impl Renderer for NoRenderer {
    async fn render(&self, _combo: &ThemedCombination) -> Result<RenderResult, RenderError> {
        Err(RenderError::EmptyCommand)
    }
}

impl AppContext {
    pub(crate) async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool_config = reelbot_db::PoolConfig::from_app_config(&config);
        let pool = reelbot_db::connect_pool(&config.database_url, pool_config).await?;
        let store: Arc<dyn Store> = Arc::new(reelbot_db::PgStore::new(pool.clone()));
        Ok(Self {
            config,
            pool,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn lifecycle(&self) -> LifecycleManager {
        LifecycleManager::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.posting_slots.clone(),
        )
    }

    pub(crate) fn themes(&self) -> anyhow::Result<ThemesFile> {
        Ok(reelbot_core::load_themes(&self.config.themes_path)?)
    }

    pub(crate) fn selector(&self, seed: Option<u64>) -> anyhow::Result<ContentSelector> {
        let themes = self.themes()?;
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let policy = self.config.weight_policy();
        Ok(match seed {
            Some(seed) => ContentSelector::seeded(store, themes, policy, clock, seed),
            None => ContentSelector::new(store, themes, policy, clock),
        })
    }

    pub(crate) fn pipeline(&self) -> anyhow::Result<GenerationPipeline> {
        let renderer: Arc<dyn Renderer> = match self.config.render_command.as_deref() {
            Some(command) => Arc::new(CommandRenderer::new(command, DEFAULT_RENDER_TIMEOUT)?),
            None => Arc::new(NoRenderer),
        };
        Ok(GenerationPipeline::new(
            Arc::new(self.selector(None)?),
            renderer,
            self.lifecycle(),
        ))
    }

    fn graph(&self) -> anyhow::Result<Arc<GraphClient>> {
        let config = GraphConfig::from_app_config(&self.config).ok_or_else(|| {
            anyhow::anyhow!(
                "REELBOT_GRAPH_ACCESS_TOKEN and REELBOT_GRAPH_USER_ID must be set to reach the Graph API"
            )
        })?;
        Ok(Arc::new(GraphClient::new(config)?))
    }

    pub(crate) fn publication(&self) -> anyhow::Result<PublicationScheduler> {
        Ok(PublicationScheduler::new(
            Arc::clone(&self.store),
            self.graph()?,
            Arc::clone(&self.clock),
            self.config.retry_policy(),
            self.config.publish_timeout(),
            self.config.publish_batch_limit,
        ))
    }

    pub(crate) fn metrics(&self) -> anyhow::Result<MetricsCollector> {
        Ok(MetricsCollector::new(
            Arc::clone(&self.store),
            self.graph()?,
            Arc::clone(&self.clock),
            Duration::from_secs(self.config.metrics_interval_secs),
            Duration::from_secs(self.config.metrics_maturation_secs),
            self.config.metrics_timeout(),
        ))
    }
}
