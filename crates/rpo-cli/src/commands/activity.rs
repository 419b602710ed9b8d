//! Activity command implementation.

use super::{print_table, print_warnings, Context};
use anyhow::Result;
use rpo_core::Reporter;

/// Run the activity command.
pub async fn run(ctx: &Context, files: bool) -> Result<()> {
    let reporter = Reporter::new(&ctx.options)?;
    ctx.ingest().await?;

    let rows = ctx.file_changes().await?;
    let (title, report) = if files {
        ("File activity", reporter.files(&rows)?)
    } else {
        ("Contributor activity", reporter.contributors(&rows)?)
    };

    print_warnings(&report.warnings);
    print_table(title, &report.value);
    Ok(())
}
