//! Engagement report over recent publications.

use crate::context::AppContext;

const TOP_POSTS: i64 = 5;

pub(crate) async fn run_analytics(ctx: &AppContext, days: i32) -> anyhow::Result<()> {
    if days < 1 {
        anyhow::bail!("--days must be at least 1");
    }

    let summary = reelbot_db::engagement_summary(&ctx.pool, days).await?;
    println!("ENGAGEMENT, LAST {days} DAY(S)");
    if summary.posts == 0 {
        println!("  no measured publications; run `metrics-cycle` after publishing");
        return Ok(());
    }
    println!(
        "  posts {}  likes {}  comments {}  shares {}  reach {}",
        summary.posts,
        summary.total_likes,
        summary.total_comments,
        summary.total_shares,
        summary.total_reach
    );
    println!(
        "  avg likes {:.1}  avg reach {:.1}  avg engagement {:.2}%",
        summary.avg_likes,
        summary.avg_reach,
        summary.avg_engagement_rate * 100.0
    );

    println!();
    println!("{:<20}{:>7}{:>10}{:>12}", "THEME", "POSTS", "REACH", "ENGAGEMENT");
    for row in reelbot_db::engagement_by_theme(&ctx.pool, days).await? {
        println!(
            "{:<20}{:>7}{:>10}{:>11.2}%",
            crate::truncate(&row.theme, 18),
            row.posts,
            row.total_reach,
            row.avg_engagement_rate * 100.0
        );
    }

    println!();
    println!("TOP POSTS");
    for post in reelbot_db::top_posts(&ctx.pool, days, TOP_POSTS).await? {
        println!(
            "  reel {:<6}{:<14}{:>8} reach {:>6.2}%  {}",
            post.reel_id,
            crate::truncate(&post.theme, 12),
            post.reach,
            post.engagement_rate * 100.0,
            post.permalink.as_deref().unwrap_or(&post.external_media_id)
        );
    }
    Ok(())
}
