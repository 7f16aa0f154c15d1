//! Command implementations shared by the subcommands and the interactive
//! menu.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pairs_cli_utils::{IndicatifProgress, MultiProgress};
use pairs_query::batch::{BatchOptions, run_batch};
use pairs_query::query::{favorite, latest_queries, unfavorite};
use pairs_query::{PairsClient, PairsConfig, Query, QueryError, ReqwestClient};
use pairs_query_models::TransferObject;

/// Everything a command needs, built once in `main`.
pub struct Context {
    pub client: ReqwestClient,
    pub config: PairsConfig,
    pub multi: MultiProgress,
}

impl Context {
    /// Builds the client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: PairsConfig, multi: MultiProgress) -> Result<Self, QueryError> {
        let client = ReqwestClient::from_config(&config)?;
        Ok(Self {
            client,
            config,
            multi,
        })
    }

    fn interval(&self, secs: Option<u64>) -> Result<Duration, QueryError> {
        self.config.check_interval(
            secs.map_or_else(|| self.config.status_interval(), Duration::from_secs),
        )
    }

    fn folder(&self, folder: Option<PathBuf>) -> PathBuf {
        folder.unwrap_or_else(|| self.config.download_dir.clone())
    }
}

/// Loads configuration from an optional TOML file, then the environment.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a value is invalid.
pub fn load_config(path: Option<&Path>) -> Result<PairsConfig, QueryError> {
    let base = match path {
        Some(path) => PairsConfig::from_toml_file(path)?,
        None => PairsConfig::default(),
    };
    base.with_env(|name| std::env::var(name).ok())
}

fn read_query(file: &Path) -> Result<Query, QueryError> {
    let text = std::fs::read_to_string(file).map_err(|e| QueryError::Io {
        path: file.display().to_string(),
        source: e,
    })?;
    Query::from_input(text)
}

fn existing(id: &str) -> Query {
    Query {
        id: Some(id.to_string()),
        ..Query::default()
    }
}

fn print_json(value: &impl TransferObject) -> Result<(), QueryError> {
    println!("{}", value.to_json()?);
    Ok(())
}

/// Submits the request in `file`, then polls and downloads unless
/// `submit_only` is set.
///
/// # Errors
///
/// Returns the first lifecycle error.
pub async fn submit(
    ctx: &Context,
    file: &Path,
    folder: Option<PathBuf>,
    interval: Option<u64>,
    submit_only: bool,
) -> Result<(), QueryError> {
    let mut query = read_query(file)?.with_download_folder(ctx.folder(folder));

    if submit_only {
        query.submit(&ctx.client).await?;
    } else {
        query
            .submit_check_status_and_download(&ctx.client, ctx.interval(interval)?)
            .await?;
    }

    if let Some(response) = &query.submit_response {
        print_json(response)?;
    }
    if let (Some(status), Some(folder)) = (query.download_status, &query.download_folder) {
        println!("Download {status}: {}", folder.display());
    }
    Ok(())
}

/// Prints the status of job `id`, optionally waiting for a terminal code.
///
/// # Errors
///
/// Returns the status error, if any.
pub async fn status(
    ctx: &Context,
    id: &str,
    poll: bool,
    interval: Option<u64>,
) -> Result<(), QueryError> {
    let mut query = existing(id);
    let result = query
        .status(&ctx.client, poll, ctx.interval(interval)?)
        .await;
    if let Some(snapshot) = &query.status_response {
        print_json(snapshot)?;
    }
    result.map(|_| ())
}

/// Waits for job `id` to finish and downloads its results.
///
/// # Errors
///
/// Returns the download error, if any.
pub async fn download(
    ctx: &Context,
    id: &str,
    folder: Option<PathBuf>,
    name: Option<String>,
    interval: Option<u64>,
) -> Result<(), QueryError> {
    let mut query = existing(id).with_download_folder(ctx.folder(folder));
    if let Some(name) = name {
        query = query.with_download_file_name(name);
    }
    query.download(&ctx.client, ctx.interval(interval)?).await?;

    if let Some(folder) = &query.download_folder {
        println!("Downloaded {id} to {}", folder.display());
    }
    if let Some(info) = &query.output_info {
        print_json(info)?;
    }
    Ok(())
}

/// Merges job `other` into job `base` and prints the merged layers.
///
/// # Errors
///
/// Returns the merge error, if any.
pub async fn merge(ctx: &Context, other: &str, base: &str) -> Result<(), QueryError> {
    let mut query = existing(base);
    query.merge_query_into_base(&ctx.client, other, base).await?;
    for layer in &query.merge_response {
        print_json(layer)?;
    }
    Ok(())
}

/// Sets or clears the favorite mark of job `id`.
///
/// # Errors
///
/// Returns the request error, if any.
pub async fn set_favorite(ctx: &Context, id: &str, flag: bool) -> Result<(), QueryError> {
    if flag {
        favorite(&ctx.client, id).await
    } else {
        unfavorite(&ctx.client, id).await
    }
}

/// Prints the most recent jobs of `user`.
///
/// # Errors
///
/// Returns the request error, if any.
pub async fn latest(ctx: &Context, user: &str, count: u32) -> Result<(), QueryError> {
    let latest = latest_queries(&ctx.client, user, count).await?;
    for job in &latest.jobs {
        println!(
            "{:<32} {:<24} {}",
            job.id.as_deref().unwrap_or("-"),
            job.status.as_deref().unwrap_or("-"),
            job.nickname.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Runs the full lifecycle of every request file with bounded concurrency.
///
/// # Errors
///
/// Returns an error if a file cannot be read or the options are invalid.
/// Failures of individual queries are logged and counted instead.
pub async fn batch(
    ctx: &Context,
    files: &[PathBuf],
    workers: Option<usize>,
    interval: Option<u64>,
) -> Result<usize, QueryError> {
    let queries = files
        .iter()
        .map(|file| read_query(file))
        .collect::<Result<Vec<_>, _>>()?;

    let mut options =
        BatchOptions::from_config(&ctx.config).with_interval(ctx.interval(interval)?);
    if let Some(workers) = workers {
        options = options.with_workers(workers);
    }

    let progress = IndicatifProgress::queries_bar(&ctx.multi, "Running queries");
    let client: &dyn PairsClient = &ctx.client;
    let outcomes = run_batch(queries, client, &options, Some(&progress)).await?;

    let mut failed = 0;
    for (outcome, file) in outcomes.iter().zip(files) {
        if let Err(e) = &outcome.result {
            failed += 1;
            log::error!("{}: {e}", file.display());
        }
    }
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(PairsConfig::default(), MultiProgress::new()).unwrap()
    }

    #[test]
    fn rejects_interval_below_minimum() {
        let err = context().interval(Some(0)).unwrap_err();
        assert!(matches!(err, QueryError::Config { .. }), "{err}");
    }

    #[test]
    fn explicit_interval_overrides_default() {
        let ctx = context();
        assert_eq!(ctx.interval(Some(1)).unwrap(), Duration::from_secs(1));
        assert_eq!(ctx.interval(None).unwrap(), ctx.config.status_interval());
    }
}
