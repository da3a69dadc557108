//! Review queue commands: registration, approval, rejection, and listings.

use chrono::{DateTime, Utc};
use clap::Args;
use reelbot_core::{NewReel, PostStatus, PostStore, ReelStatus, RenderMetadata};

use crate::context::AppContext;

/// A reel rendered outside the pipeline.
#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub video: i64,
    #[arg(long)]
    pub audio: i64,
    #[arg(long)]
    pub quote: i64,
    #[arg(long)]
    pub theme: String,
    /// Path or URL of the rendered file
    #[arg(long)]
    pub output: String,
    #[arg(long)]
    pub caption: String,
    #[arg(long)]
    pub duration: Option<f64>,
    #[arg(long)]
    pub quality: Option<f64>,
}

pub(crate) async fn run_register(ctx: &AppContext, args: RegisterArgs) -> anyhow::Result<()> {
    let reel = NewReel {
        video_id: args.video,
        audio_id: args.audio,
        quote_id: args.quote,
        theme: args.theme,
        output_locator: args.output,
        caption: args.caption,
        render: RenderMetadata {
            duration_secs: args.duration,
            quality_score: args.quality,
            ..RenderMetadata::default()
        },
    };

    let created = ctx.pipeline()?.register(&reel).await?;
    println!(
        "reel {} registered for {}; awaiting review",
        created.id, created.theme
    );
    Ok(())
}

pub(crate) async fn run_approve(
    ctx: &AppContext,
    reel_id: i64,
    at: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let post = ctx.lifecycle().approve(reel_id, at).await?;
    println!(
        "reel {reel_id} scheduled for {} (post {})",
        post.scheduled_time.format("%Y-%m-%d %H:%M UTC"),
        post.id
    );
    Ok(())
}

pub(crate) async fn run_reject(ctx: &AppContext, reel_id: i64) -> anyhow::Result<()> {
    ctx.lifecycle().reject(reel_id).await?;
    println!("reel {reel_id} rejected");
    Ok(())
}

/// Prints queue counts, the asset inventory, and the next pending posts.
pub(crate) async fn run_status(ctx: &AppContext) -> anyhow::Result<()> {
    let queue = ctx.lifecycle().queue_status().await?;
    println!("REVIEW QUEUE");
    println!(
        "  pending {}  approved {}  scheduled {}  published {}  rejected {}  failed {}",
        queue.pending,
        queue.approved,
        queue.scheduled,
        queue.published,
        queue.rejected,
        queue.failed
    );
    println!(
        "  backlog {} (target {}, low watermark {})",
        queue.backlog(),
        ctx.config.queue_target,
        ctx.config.queue_low_watermark
    );
    if queue.pending < i64::from(ctx.config.queue_low_watermark) {
        println!("  review queue is running low");
    }

    println!();
    println!("ASSETS");
    let inventory = reelbot_db::asset_inventory(&ctx.pool).await?;
    if inventory.is_empty() {
        println!("  none catalogued");
    }
    for row in &inventory {
        println!(
            "  {:<7}{:>5} total {:>5} never used",
            row.kind, row.total, row.never_used
        );
    }

    println!();
    println!("UPCOMING POSTS");
    let upcoming = ctx
        .store()
        .list_scheduled_posts(Some(PostStatus::Pending), 5)
        .await?;
    if upcoming.is_empty() {
        println!("  none scheduled");
    }
    for post in &upcoming {
        println!(
            "  reel {:<6} at {}  retries {}",
            post.reel_id,
            post.scheduled_time.format("%Y-%m-%d %H:%M UTC"),
            post.retry_count
        );
    }
    Ok(())
}

pub(crate) async fn run_reels(
    ctx: &AppContext,
    status: Option<ReelStatus>,
    limit: i64,
) -> anyhow::Result<()> {
    let reels = ctx.lifecycle().list(status, limit).await?;
    if reels.is_empty() {
        println!("no reels found");
        return Ok(());
    }

    println!(
        "{:<7}{:<11}{:<14}{:<18}CAPTION",
        "ID", "STATUS", "THEME", "CREATED"
    );
    for reel in &reels {
        println!(
            "{:<7}{:<11}{:<14}{:<18}{}",
            reel.id,
            reel.status.as_str(),
            crate::truncate(&reel.theme, 12),
            crate::fmt_time(Some(reel.created_at)),
            crate::truncate(&reel.caption, 50)
        );
    }
    Ok(())
}
