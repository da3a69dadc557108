//! One-shot runs of the publication and metrics cycles.

use reelbot_engine::CycleReport;

use crate::context::AppContext;

fn print_publication(report: &CycleReport) {
    println!(
        "attempted {}: published {}, retrying {}, failed {}, errored {}",
        report.attempted, report.published, report.retried, report.failed, report.errored
    );
}

pub(crate) async fn run_publish_now(ctx: &AppContext, reel_id: i64) -> anyhow::Result<()> {
    let report = ctx.publication()?.publish_now(reel_id).await?;
    print_publication(&report);
    Ok(())
}

pub(crate) async fn run_publish_cycle(ctx: &AppContext) -> anyhow::Result<()> {
    let report = ctx.publication()?.run_cycle().await?;
    if report.attempted == 0 {
        println!("no posts due");
        return Ok(());
    }
    print_publication(&report);
    Ok(())
}

pub(crate) async fn run_metrics_cycle(ctx: &AppContext) -> anyhow::Result<()> {
    let report = ctx.metrics()?.run_cycle().await?;
    println!(
        "{} publication(s) due: collected {}, already collected {}, errored {}",
        report.candidates, report.collected, report.duplicates, report.errored
    );
    Ok(())
}
