//! Revisions command implementation.

use super::{print_table, Context};
use anyhow::Result;
use rpo_core::Reporter;

/// Run the revisions command.
pub async fn run(ctx: &Context) -> Result<()> {
    let reporter = Reporter::new(&ctx.options)?;
    ctx.ingest().await?;

    let rows = ctx.file_changes().await?;
    print_table("File changes", &reporter.revisions(&rows)?);
    Ok(())
}
