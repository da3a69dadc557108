//! Asset catalogue commands.

use clap::Subcommand;
use reelbot_core::{AssetKind, NewAsset};

use crate::context::AppContext;

#[derive(Debug, Subcommand)]
pub enum AssetsCommands {
    /// Catalogue an asset, or refresh the tags of an existing one
    Add {
        #[arg(long)]
        kind: AssetKind,
        /// File path or URL; the quote text itself for quotes
        #[arg(long)]
        locator: String,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',', required = true)]
        tags: Vec<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        quality: Option<f64>,
    },
    /// List catalogued assets, least used first
    List {
        #[arg(long)]
        kind: Option<AssetKind>,
        #[arg(long, default_value = "50")]
        limit: i64,
    },
}

pub(crate) async fn run(ctx: &AppContext, command: AssetsCommands) -> anyhow::Result<()> {
    match command {
        AssetsCommands::Add {
            kind,
            locator,
            tags,
            author,
            duration,
            quality,
        } => {
            let asset = NewAsset {
                kind,
                locator,
                author,
                tags,
                duration_secs: duration,
                quality_score: quality,
            };
            run_assets_add(ctx, &asset).await
        }
        AssetsCommands::List { kind, limit } => run_assets_list(ctx, kind, limit).await,
    }
}

async fn run_assets_add(ctx: &AppContext, asset: &NewAsset) -> anyhow::Result<()> {
    if asset.locator.trim().is_empty() {
        anyhow::bail!("--locator must not be empty");
    }
    if asset.tags.iter().all(|t| t.trim().is_empty()) {
        anyhow::bail!("--tags must name at least one tag");
    }
    if let Some(quality) = asset.quality_score {
        if !(0.0..=1.0).contains(&quality) {
            anyhow::bail!("--quality must be within [0, 1], got {quality}");
        }
    }

    let row = reelbot_db::insert_asset(&ctx.pool, asset).await?;
    println!(
        "asset {} ({}) catalogued with tags [{}]; used {} time(s)",
        row.id,
        row.kind,
        row.tags.join(", "),
        row.usage_count
    );
    Ok(())
}

async fn run_assets_list(
    ctx: &AppContext,
    kind: Option<AssetKind>,
    limit: i64,
) -> anyhow::Result<()> {
    let rows = reelbot_db::list_assets(&ctx.pool, kind, limit).await?;
    if rows.is_empty() {
        println!("no assets catalogued; run `assets add` first");
        return Ok(());
    }

    println!(
        "{:<7}{:<7}{:<6}{:<18}{:<24}LOCATOR",
        "ID", "KIND", "USED", "LAST USED", "TAGS"
    );
    for row in &rows {
        println!(
            "{:<7}{:<7}{:<6}{:<18}{:<24}{}",
            row.id,
            row.kind,
            row.usage_count,
            crate::fmt_time(row.last_used_at),
            crate::truncate(&row.tags.join(","), 22),
            crate::truncate(&row.locator, 50)
        );
    }
    Ok(())
}
