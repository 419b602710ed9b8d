//! rpo CLI
//!
//! Command-line interface for the rpo repository analytics engine.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use rpo_core::{Extreme, IdentityField, Role, SelectionOptions};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "rpo")]
#[command(author, version, about = "Who wrote this repository, and when", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository to analyse
    #[arg(short, long, global = true, default_value = ".")]
    repository: PathBuf,

    /// History database path, relative to the repository root
    #[arg(short, long, global = true, default_value = ".rpo/history.db")]
    database: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    selection: SelectionArgs,
}

/// Flags controlling which records are analysed and how results are ordered.
#[derive(Args, Debug, Clone)]
struct SelectionArgs {
    /// JSON file with selection options; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Group by `author` or `committer`
    #[arg(long, global = true)]
    aggregate_by: Option<String>,

    /// Identify actors by `name` or `email`
    #[arg(long, global = true)]
    identify_by: Option<String>,

    /// Column to sort results by
    #[arg(long, global = true)]
    sort_by: Option<String>,

    /// Sort in descending order
    #[arg(long, global = true)]
    descending: bool,

    /// Keep only this many rows (0 keeps all)
    #[arg(short, long, global = true)]
    limit: Option<usize>,

    /// With --limit, keep the smallest rows instead of the largest
    #[arg(long, global = true)]
    bottom: bool,

    /// Only analyse paths matching this glob (repeatable)
    #[arg(long = "include", global = true)]
    include_globs: Vec<String>,

    /// Skip paths matching this glob (repeatable; takes priority over --include)
    #[arg(long = "exclude", global = true)]
    exclude_globs: Vec<String>,

    /// Drop records by this name or email (repeatable)
    #[arg(long = "exclude-user", global = true)]
    exclude_users: Vec<String>,

    /// JSON file mapping canonical identities to their aliases
    #[arg(long, global = true)]
    alias_file: Option<PathBuf>,

    /// Keep lock files and vendored dependencies
    #[arg(long, global = true)]
    keep_generated: bool,

    /// Leave merge commits out of ingestion
    #[arg(long, global = true)]
    no_merges: bool,
}

impl SelectionArgs {
    fn to_options(&self) -> Result<SelectionOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SelectionOptions::from_json(&json)?
            }
            None => SelectionOptions::default(),
        };

        if let Some(role) = &self.aggregate_by {
            options.aggregate_by = role.parse::<Role>()?;
        }
        if let Some(field) = &self.identify_by {
            options.identify_by = field.parse::<IdentityField>()?;
        }
        if self.sort_by.is_some() {
            options.sort_by = self.sort_by.clone();
        }
        if self.descending {
            options.descending = true;
        }
        if let Some(limit) = self.limit {
            options.limit = limit;
        }
        if self.bottom {
            options.extreme = Extreme::Smallest;
        }
        options.include_globs.extend(self.include_globs.iter().cloned());
        options.exclude_globs.extend(self.exclude_globs.iter().cloned());
        options.exclude_users.extend(self.exclude_users.iter().cloned());
        if self.keep_generated {
            options.ignore_generated = false;
        }
        if let Some(path) = &self.alias_file {
            options.load_alias_file(path)?;
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest new commits into the history database
    Ingest,

    /// Files, contributors, commits and the commit date range
    Summary,

    /// List every ingested file change
    Revisions,

    /// Insertions, deletions and net lines per contributor
    Activity {
        /// Report per file and contributor instead
        #[arg(short, long)]
        files: bool,
    },

    /// Lines owned per contributor at one revision
    Blame {
        /// Revision to blame (defaults to HEAD)
        #[arg(long, default_value = "HEAD")]
        revision: String,

        /// Ignore whitespace-only changes
        #[arg(short = 'w', long)]
        ignore_whitespace: bool,
    },

    /// Lines owned per contributor over time
    CumulativeBlame {
        /// Sampling cadence: day, week, month or every:N
        #[arg(long, default_value = "month")]
        cadence: String,

        /// Worker threads (0 uses all cores)
        #[arg(long, default_value = "0")]
        workers: usize,

        /// Revisions blamed per round
        #[arg(long, default_value = "16")]
        batch_size: usize,

        /// Ignore whitespace-only changes
        #[arg(short = 'w', long)]
        ignore_whitespace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("rpo=debug,rpo_core=debug,rpo_git=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("rpo=info,rpo_core=info,rpo_git=info")
            .init();
    }

    let options = cli.selection.to_options()?;
    let ctx = commands::Context::open(
        &cli.repository,
        &cli.database,
        options,
        cli.selection.no_merges,
    )?;

    match cli.command {
        Commands::Ingest => commands::ingest::run(&ctx).await?,
        Commands::Summary => commands::summary::run(&ctx).await?,
        Commands::Revisions => commands::revisions::run(&ctx).await?,
        Commands::Activity { files } => commands::activity::run(&ctx, files).await?,
        Commands::Blame {
            revision,
            ignore_whitespace,
        } => commands::blame::run(&ctx, revision, ignore_whitespace).await?,
        Commands::CumulativeBlame {
            cadence,
            workers,
            batch_size,
            ignore_whitespace,
        } => {
            let options = rpo_core::AttributionOptions {
                workers,
                batch_size,
                ignore_whitespace,
            };
            commands::cumulative::run(&ctx, &cadence, options).await?
        }
    }

    Ok(())
}
