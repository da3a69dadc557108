mod analytics;
mod assets;
mod context;
mod cycles;
mod generate;
mod review;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reelbot_core::ReelStatus;
use tracing_subscriber::EnvFilter;

use crate::assets::AssetsCommands;
use crate::context::AppContext;
use crate::review::RegisterArgs;

#[derive(Debug, Parser)]
#[command(name = "reelbot-cli")]
#[command(about = "Reelbot operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage the asset catalogue
    Assets {
        #[command(subcommand)]
        command: AssetsCommands,
    },
    /// List configured themes
    Themes,
    /// Draw a video, audio, and quote combination for a theme
    Select {
        theme: String,
        /// Record one use of each drawn asset
        #[arg(long)]
        commit: bool,
        /// Seed the draw for a reproducible result
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Render and register new reels through the render command
    Generate {
        /// Theme to generate for; a random configured theme when omitted
        #[arg(long)]
        theme: Option<String>,
        #[arg(long, default_value = "1")]
        count: u32,
    },
    /// Register a reel rendered outside the pipeline
    Register(RegisterArgs),
    /// Approve a pending reel and schedule it
    Approve {
        reel_id: i64,
        /// Publication time (RFC 3339); the next posting slot when omitted
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Reject a pending reel
    Reject { reel_id: i64 },
    /// Show queue counts, asset inventory, and upcoming posts
    Status,
    /// List reels, newest first
    Reels {
        #[arg(long)]
        status: Option<ReelStatus>,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Publish a scheduled reel immediately
    PublishNow { reel_id: i64 },
    /// Run one publication cycle
    PublishCycle,
    /// Run one metrics collection cycle
    MetricsCycle,
    /// Engagement report over recent publications
    Analytics {
        #[arg(long, default_value = "30")]
        days: i32,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("reelbot-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = reelbot_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let ctx = AppContext::connect(config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                reelbot_db::ping(&ctx.pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = reelbot_db::run_migrations(&ctx.pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Assets { command } => assets::run(&ctx, command).await?,
        Commands::Themes => generate::run_themes(&ctx)?,
        Commands::Select {
            theme,
            commit,
            seed,
        } => generate::run_select(&ctx, &theme, commit, seed).await?,
        Commands::Generate { theme, count } => {
            generate::run_generate(&ctx, theme.as_deref(), count).await?;
        }
        Commands::Register(args) => review::run_register(&ctx, args).await?,
        Commands::Approve { reel_id, at } => review::run_approve(&ctx, reel_id, at).await?,
        Commands::Reject { reel_id } => review::run_reject(&ctx, reel_id).await?,
        Commands::Status => review::run_status(&ctx).await?,
        Commands::Reels { status, limit } => review::run_reels(&ctx, status, limit).await?,
        Commands::PublishNow { reel_id } => cycles::run_publish_now(&ctx, reel_id).await?,
        Commands::PublishCycle => cycles::run_publish_cycle(&ctx).await?,
        Commands::MetricsCycle => cycles::run_metrics_cycle(&ctx).await?,
        Commands::Analytics { days } => analytics::run_analytics(&ctx, days).await?,
    }

    Ok(())
}

/// Formats an optional timestamp for table output.
pub(crate) fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "-".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Shortens `text` to `max` characters for table output.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
