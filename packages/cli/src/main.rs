#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line client for PAIRS queries.
//!
//! Each subcommand maps to one step of the query lifecycle. Run without a
//! subcommand for an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`pairs_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log lines
//! and the batch progress bar never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::Context;

#[derive(Parser)]
#[command(name = "pairs", about = "Submit, monitor and download PAIRS queries")]
struct Cli {
    /// TOML configuration file; `PAIRS_*` environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a query from a JSON file, wait for it and download the results
    Submit {
        /// Query request JSON file
        file: PathBuf,
        /// Folder results are written to
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
        /// Only submit; do not wait or download
        #[arg(long)]
        submit_only: bool,
    },
    /// Print the status of a query job
    Status {
        /// Query job id
        id: String,
        /// Keep checking until the job reaches a terminal state
        #[arg(long)]
        poll: bool,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Wait for a query job to finish and download its results
    Download {
        /// Query job id
        id: String,
        /// Folder results are written to
        #[arg(long)]
        folder: Option<PathBuf>,
        /// File name for the archive and extraction folder (default: the id)
        #[arg(long)]
        name: Option<String>,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Merge the layers of one query job into another
    Merge {
        /// Job whose layers are merged
        other: String,
        /// Job receiving the layers
        base: String,
    },
    /// Mark a query job as a favorite
    Favorite {
        /// Query job id
        id: String,
    },
    /// Remove the favorite mark from a query job
    Unfavorite {
        /// Query job id
        id: String,
    },
    /// Run several queries concurrently
    Batch {
        /// Query request JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of queries in flight at once
        #[arg(long)]
        workers: Option<usize>,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List a user's most recent query jobs
    Latest {
        /// User name
        user: String,
        /// Number of jobs to list
        #[arg(long, default_value = "10")]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = pairs_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let ctx = Context::new(config, multi)?;

    let Some(command) = cli.command else {
        return interactive::run(&ctx).await;
    };

    match command {
        Commands::Submit {
            file,
            folder,
            interval,
            submit_only,
        } => commands::submit(&ctx, &file, folder, interval, submit_only).await?,
        Commands::Status { id, poll, interval } => {
            commands::status(&ctx, &id, poll, interval).await?;
        }
        Commands::Download {
            id,
            folder,
            name,
            interval,
        } => commands::download(&ctx, &id, folder, name, interval).await?,
        Commands::Merge { other, base } => commands::merge(&ctx, &other, &base).await?,
        Commands::Favorite { id } => commands::set_favorite(&ctx, &id, true).await?,
        Commands::Unfavorite { id } => commands::set_favorite(&ctx, &id, false).await?,
        Commands::Batch {
            files,
            workers,
            interval,
        } => {
            let failed = commands::batch(&ctx, &files, workers, interval).await?;
            if failed > 0 {
                return Err(format!("{failed} of {} queries failed", files.len()).into());
            }
        }
        Commands::Latest { user, count } => commands::latest(&ctx, &user, count).await?,
    }

    Ok(())
}
