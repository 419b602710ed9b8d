//! Cumulative blame command implementation.

use super::{print_table, print_warnings, Context};
use anyhow::Result;
use colored::Colorize;
use rpo_core::{sample_revisions, AttributionOptions, Cadence, HistoryStore};

/// Run the cumulative-blame command.
pub async fn run(ctx: &Context, cadence: &str, options: AttributionOptions) -> Result<()> {
    let cadence: Cadence = cadence.parse()?;
    ctx.ingest().await?;

    let commits = ctx.store.commits().await?;
    let revisions = sample_revisions(&commits, cadence);
    println!(
        "{} Blaming {} revision(s) sampled {:?}",
        "→".blue(),
        revisions.len(),
        cadence
    );

    let attributor = ctx.attributor(options).await?;
    let matrix = tokio::task::spawn_blocking(move || attributor.attribute_over_time(&revisions)).await??;

    print_warnings(&matrix.warnings);
    print_table("Lines owned over time", &matrix.value);
    Ok(())
}
