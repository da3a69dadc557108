mod api;
mod middleware;
mod scheduler;
mod services;

use std::sync::Arc;

use reelbot_core::{Clock, Store, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::CycleLocks,
    services::Services,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = reelbot_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = reelbot_db::PoolConfig::from_app_config(&config);
    let pool = reelbot_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = reelbot_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let themes = reelbot_core::load_themes(&config.themes_path)?;
    let store: Arc<dyn Store> = Arc::new(reelbot_db::PgStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = Arc::new(Services::build(&config, Arc::clone(&store), clock, themes)?);

    let locks = CycleLocks::default();
    let publish_lock = Arc::clone(&locks.publish);
    let scheduler = scheduler::build_scheduler(&services, &config, locks).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        reelbot_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            store,
            services,
            publish_lock,
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "reelbot-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
