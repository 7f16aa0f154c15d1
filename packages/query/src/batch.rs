//! Running many query lifecycles at once.
//!
//! Each query runs its full submit, poll and download sequence as an
//! independent future. At most `workers` of them are in flight at any time;
//! the rest wait their turn in input order. One query failing does not stop
//! the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt as _};

use crate::QueryError;
use crate::client::PairsClient;
use crate::config::PairsConfig;
use crate::progress::ProgressCallback;
use crate::query::Query;

/// Concurrency and pacing of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of lifecycles in flight.
    pub workers: usize,
    /// Delay between status checks of each query.
    pub interval: Duration,
    /// Folder for queries that do not set their own.
    pub download_dir: Option<PathBuf>,
    max_workers: usize,
    min_interval: Duration,
}

impl BatchOptions {
    /// Takes the defaults and limits from `config`.
    #[must_use]
    pub fn from_config(config: &PairsConfig) -> Self {
        Self {
            workers: config.default_workers,
            interval: config.status_interval(),
            download_dir: Some(config.download_dir.clone()),
            max_workers: config.max_workers,
            min_interval: config.min_status_interval(),
        }
    }

    /// Sets the number of concurrent lifecycles.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the delay between status checks.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Checks the options against the limits they were built with.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] if `workers` is zero or above the
    /// configured maximum, or if `interval` is below the configured minimum.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.workers == 0 || self.workers > self.max_workers {
            return Err(QueryError::Config {
                message: format!(
                    "workers must be between 1 and {}, got {}",
                    self.max_workers, self.workers
                ),
            });
        }
        if self.interval < self.min_interval {
            return Err(QueryError::Config {
                message: format!(
                    "status interval must be at least {:?}, got {:?}",
                    self.min_interval, self.interval
                ),
            });
        }
        Ok(())
    }
}

/// Result of one query in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position of the query in the input.
    pub index: usize,
    /// The query with everything recorded during its lifecycle.
    pub query: Query,
    /// How the lifecycle ended.
    pub result: Result<(), QueryError>,
}

impl BatchOutcome {
    /// Returns `true` if the lifecycle completed without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs the full lifecycle of every query with bounded concurrency.
///
/// Outcomes are returned in input order.
///
/// # Errors
///
/// Returns [`QueryError::Config`] before any request is sent if `options`
/// fail [`BatchOptions::validate`]. Failures of individual queries are
/// reported in their [`BatchOutcome`] instead.
pub async fn run_batch(
    queries: Vec<Query>,
    client: &dyn PairsClient,
    options: &BatchOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<Vec<BatchOutcome>, QueryError> {
    options.validate()?;

    let total = queries.len();
    log::info!(
        "Running {total} queries (workers={}, interval={:?})",
        options.workers,
        options.interval
    );
    if let Some(p) = progress {
        p.set_total(total as u64);
    }

    let interval = options.interval;
    let mut outcomes: Vec<BatchOutcome> =
        stream::iter(queries.into_iter().enumerate().map(|(index, mut query)| {
            if query.download_folder.is_none() {
                query.download_folder.clone_from(&options.download_dir);
            }
            async move {
                let result = query
                    .submit_check_status_and_download(client, interval)
                    .await;
                BatchOutcome {
                    index,
                    query,
                    result,
                }
            }
        }))
        .buffer_unordered(options.workers)
        .inspect(|outcome| {
            let name = outcome.query.request.name.as_deref().unwrap_or("<unnamed>");
            match &outcome.result {
                Ok(()) => log::info!("[{}/{total}] {name} done", outcome.index + 1),
                Err(e) => log::warn!("[{}/{total}] {name} failed: {e}", outcome.index + 1),
            }
            if let Some(p) = progress {
                p.inc(1);
                p.set_message(name.to_string());
            }
        })
        .collect()
        .await;

    outcomes.sort_by_key(|o| o.index);

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    log::info!("Batch finished: {} succeeded, {failed} failed", total - failed);
    if let Some(p) = progress {
        p.finish(format!("{} succeeded, {failed} failed", total - failed));
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::TaskStatus;
    use crate::client::HttpResponse;
    use crate::progress::null_progress;
    use crate::testing::{MockClient, MockReply, build_zip, json_response, scratch_dir};

    fn config() -> PairsConfig {
        PairsConfig {
            min_status_interval_secs: 0,
            ..PairsConfig::default()
        }
    }

    fn bulk(name: &str) -> Query {
        Query::from_input(json!({"name": name, "spatial": {"type": "square"}})).unwrap()
    }

    #[test]
    fn rejects_worker_counts_out_of_range() {
        let options = BatchOptions::from_config(&PairsConfig::default());
        assert!(matches!(
            options.clone().with_workers(0).validate(),
            Err(QueryError::Config { .. })
        ));
        assert!(matches!(
            options.clone().with_workers(9).validate(),
            Err(QueryError::Config { .. })
        ));
        assert!(options.with_workers(8).validate().is_ok());
    }

    #[test]
    fn rejects_interval_below_minimum() {
        let options = BatchOptions::from_config(&PairsConfig::default())
            .with_interval(Duration::from_millis(500));
        assert!(matches!(options.validate(), Err(QueryError::Config { .. })));
    }

    #[tokio::test]
    async fn invalid_options_send_nothing() {
        let client = MockClient::new();
        let options = BatchOptions::from_config(&config()).with_workers(0);

        let err = run_batch(vec![bulk("a")], &client, &options, None)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Config { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn bounds_concurrency_and_keeps_input_order() {
        let tmp = scratch_dir("batch_concurrency");
        let next_id = AtomicUsize::new(0);
        let client = MockClient::with_responder(move |call| {
            let response = match call.method {
                "POST" => {
                    let id = next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    json_response(200, &json!({"id": id.to_string()}))
                }
                _ if call.path.ends_with("/download") => {
                    HttpResponse::new(200, build_zip(&[("a.txt", "a")]))
                }
                _ => json_response(200, &json!({"statusCode": 20})),
            };
            MockReply::Response(response)
        })
        .with_delay(Duration::from_millis(20));

        let options = BatchOptions::from_config(&config())
            .with_workers(2)
            .with_interval(Duration::ZERO);
        let queries = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|name| bulk(name).with_download_folder(&tmp))
            .collect();

        let outcomes = run_batch(queries, &client, &options, None).await.unwrap();

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(BatchOutcome::is_ok));
        let names: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.query.request.name.as_deref())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert!(
            outcomes
                .iter()
                .all(|o| o.query.download_status == Some(TaskStatus::Succeeded))
        );
        assert_eq!(client.max_in_flight(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let client = MockClient::with_responder(|call| match call.method {
            "POST" => MockReply::Response(json_response(400, &json!({"message": "bad layer"}))),
            _ => MockReply::TransportError("unexpected request".to_string()),
        });
        client.push_json(200, &json!({"id": "7"}));
        client.push_json(200, &json!({"statusCode": 31}));
        client.push_json(200, &json!({"statusCode": 31}));

        let options = BatchOptions::from_config(&config())
            .with_workers(1)
            .with_interval(Duration::ZERO);

        let progress = null_progress();
        let outcomes = run_batch(
            vec![bulk("kept"), bulk("rejected")],
            &client,
            &options,
            Some(&progress),
        )
        .await
        .unwrap();

        assert!(matches!(outcomes[0].result, Err(QueryError::Deleted { .. })));
        assert_eq!(outcomes[0].query.id.as_deref(), Some("7"));
        assert!(matches!(
            outcomes[1].result,
            Err(QueryError::Submit { status: 400, .. })
        ));
    }
}
