//! Ingest command implementation.

use super::Context;
use anyhow::Result;
use colored::Colorize;
use rpo_core::HistoryStore;

/// Run the ingest command.
pub async fn run(ctx: &Context) -> Result<()> {
    println!(
        "{} Ingesting {}",
        "→".blue(),
        ctx.repository.root().display()
    );

    let report = ctx.ingest().await?;
    let total = ctx.store.commit_count().await?;

    println!("{} Ingestion complete!", "✓".green());
    match report.since {
        Some(since) => println!("  Since: {}", since.short()),
        None => println!("  Since: the first commit"),
    }
    println!("  Commits: {} new, {} total", report.commits_inserted.to_string().green(), total);
    println!("  File changes: {} of {} stored", report.inserted, report.submitted);
    println!("  Database: {}", ctx.store.destination());

    Ok(())
}
