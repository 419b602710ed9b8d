//! Summary command implementation.

use super::{print_table, Context};
use anyhow::Result;
use rpo_core::Reporter;

/// Run the summary command.
pub async fn run(ctx: &Context) -> Result<()> {
    let reporter = Reporter::new(&ctx.options)?;
    ctx.ingest().await?;

    let rows = ctx.file_changes().await?;
    let summary = reporter.summary(&rows)?;
    print_table(
        &format!("Summary of {}", ctx.repository.root().display()),
        &summary,
    );
    Ok(())
}
