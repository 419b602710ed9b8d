//! Blame command implementation.

use super::{print_table, print_warnings, Context};
use anyhow::Result;
use rpo_core::AttributionOptions;

/// Run the blame command.
pub async fn run(ctx: &Context, revision: String, ignore_whitespace: bool) -> Result<()> {
    ctx.ingest().await?;

    let attributor = ctx
        .attributor(AttributionOptions {
            ignore_whitespace,
            ..Default::default()
        })
        .await?;
    let spec = ctx.options.rank_spec();
    let title = format!("Line ownership at {revision}");

    let table = tokio::task::spawn_blocking(move || attributor.ownership_at(&revision, &spec)).await??;

    print_warnings(&table.warnings);
    print_table(&title, &table.value);
    Ok(())
}
