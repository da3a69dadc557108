//! Theme, selection, and generation commands.

use crate::context::AppContext;

pub(crate) fn run_themes(ctx: &AppContext) -> anyhow::Result<()> {
    let themes = ctx.themes()?;
    println!("{:<20}TAGS", "THEME");
    for theme in &themes.themes {
        println!("{:<20}{}", theme.name, theme.tags.join(", "));
    }
    Ok(())
}

/// Draws a combination for `theme` and prints it. With `commit`, one use of
/// each drawn asset is recorded.
pub(crate) async fn run_select(
    ctx: &AppContext,
    theme: &str,
    commit: bool,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let selector = ctx.selector(seed)?;
    let combo = selector.select(theme).await?;

    println!("theme: {}", combo.theme);
    for asset in [&combo.video, &combo.audio, &combo.quote] {
        println!(
            "  {:<6} #{:<6} used {:<4} {}",
            asset.kind.as_str(),
            asset.id,
            asset.usage_count,
            crate::truncate(&asset.locator, 60)
        );
    }

    if commit {
        selector.update_usage(&combo).await?;
        println!("usage recorded");
    }
    Ok(())
}

/// Generates `count` reels through the configured render command.
///
/// Failed attempts are reported and do not stop the run.
pub(crate) async fn run_generate(
    ctx: &AppContext,
    theme: Option<&str>,
    count: u32,
) -> anyhow::Result<()> {
    if ctx.config.render_command.is_none() {
        anyhow::bail!("REELBOT_RENDER_COMMAND is not set; cannot generate reels");
    }
    let pipeline = ctx.pipeline()?;
    let themes = ctx.themes()?;
    let names = themes.names();
    if theme.is_none() && names.is_empty() {
        anyhow::bail!("no themes configured");
    }

    let mut generated = 0_u32;
    for attempt in 0..count {
        // Without --theme, attempts rotate through the configured themes.
        let theme = theme.map_or_else(
            || names[usize::try_from(attempt).unwrap_or(0) % names.len()].to_string(),
            str::to_string,
        );
        match pipeline.generate(&theme).await {
            Ok(reel) => {
                generated += 1;
                println!(
                    "reel {} generated for {}: {}",
                    reel.id, reel.theme, reel.output_locator
                );
            }
            Err(e) => {
                tracing::warn!(theme = %theme, error = %e, "reel generation failed");
                println!("generation failed for {theme}: {e}");
            }
        }
    }

    println!("generated {generated} of {count} reel(s)");
    Ok(())
}
