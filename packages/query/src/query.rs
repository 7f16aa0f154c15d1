//! The query lifecycle: submit, poll job status, download results.
//!
//! A bulk query moves through three steps, each a method on [`Query`]:
//!
//! 1. [`Query::submit`] POSTs the request and records the job id.
//! 2. [`Query::status`] GETs the job status, optionally repeating on a
//!    fixed interval until the server reports a terminal code.
//! 3. [`Query::download`] waits for the job to succeed, then fetches the
//!    result archive, writes it to disk and extracts it.
//!
//! A real-time point query (a single point with no batch flag) is answered
//! inline by the submission; status and download then become no-ops apart
//! from writing any inline data to a file.
//!
//! There is no retry of an individual HTTP call. The only loop is the one
//! waiting for the job's state to change, and it has no upper bound other
//! than the server reaching a terminal code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pairs_query_models::status::UNSPECIFIED_ERROR_CODE;
use pairs_query_models::{
    LatestQueries, ModelError, PointData, QueryJob, QueryJobLayer, QueryOutputInfoFile,
    QueryRequest, QueryResponse, QueryStatus, TransferInput, TransferObject as _,
};
use strum_macros::{AsRefStr, Display};

use crate::QueryError;
use crate::archive;
use crate::client::{HttpResponse, PairsClient, endpoints};
use crate::config::DEFAULT_DOWNLOAD_DIR;

/// Message recorded when a failed response carries no readable message.
pub const FAILED_MESSAGE: &str = "FAILED";

/// Status recorded instead of polling for a real-time point query.
pub const POINT_QUERY_STATUS: &str =
    "SKIPPED: real time point query, data was returned by the submission";

/// File stem used for inline point data when the query has no name.
const DEFAULT_POINT_FILE_STEM: &str = "point_query";

/// Outcome of a download or merge step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The step completed.
    Succeeded,
    /// The step failed; the error was returned to the caller.
    Failed,
    /// Nothing to do for this query.
    Skipped,
}

/// Input accepted by [`Query::from_input`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// JSON request text.
    Json(String),
    /// Parsed JSON request mapping.
    Value(serde_json::Value),
    /// An already-built request.
    Request(QueryRequest),
}

impl From<&str> for QueryInput {
    fn from(value: &str) -> Self {
        Self::Json(value.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(value: String) -> Self {
        Self::Json(value)
    }
}

impl From<serde_json::Value> for QueryInput {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<QueryRequest> for QueryInput {
    fn from(value: QueryRequest) -> Self {
        Self::Request(value)
    }
}

/// A query and everything the server has told us about it so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// The request sent on submission.
    pub request: QueryRequest,
    /// Server-assigned job id; set by a successful bulk submission.
    pub id: Option<String>,
    /// Latest submission response.
    pub submit_response: Option<QueryResponse>,
    /// Latest job status snapshot.
    pub status_response: Option<QueryJob>,
    /// Outcome of the download step.
    pub download_status: Option<TaskStatus>,
    /// Folder results are written to. Defaults to [`DEFAULT_DOWNLOAD_DIR`].
    pub download_folder: Option<PathBuf>,
    /// File stem of the archive and extraction folder. Defaults to the id.
    pub download_file_name: Option<String>,
    /// Outcome of the last merge.
    pub merge_status: Option<TaskStatus>,
    /// Layers of the merged job.
    pub merge_response: Vec<QueryJobLayer>,
    /// Metadata read from the extracted archive.
    pub output_info: Option<QueryOutputInfoFile>,
}

impl Query {
    /// Creates an unsubmitted query.
    #[must_use]
    pub fn new(request: QueryRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    /// Creates an unsubmitted query from JSON text, a mapping or a request.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Model`] if the input is not a valid request.
    pub fn from_input(input: impl Into<QueryInput>) -> Result<Self, QueryError> {
        let request = match input.into() {
            QueryInput::Json(text) => QueryRequest::from_input(TransferInput::Json(text))?,
            QueryInput::Value(value) => QueryRequest::from_input(TransferInput::Value(value))?,
            QueryInput::Request(request) => request,
        };
        Ok(Self::new(request))
    }

    /// Sets the folder results are written to.
    #[must_use]
    pub fn with_download_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.download_folder = Some(folder.into());
        self
    }

    /// Sets the file stem used for the archive and extraction folder.
    #[must_use]
    pub fn with_download_file_name(mut self, name: impl Into<String>) -> Self {
        self.download_file_name = Some(name.into());
        self
    }

    /// Returns `true` if the server answers this query inline.
    ///
    /// Evaluated from the current request on every call.
    #[must_use]
    pub fn is_point_query(&self) -> bool {
        self.request.is_point_query()
    }

    /// Returns the decoded status of the latest snapshot.
    #[must_use]
    pub fn current_status(&self) -> Option<QueryStatus> {
        self.status_response.as_ref()?.query_status()
    }

    fn job_id(&self, operation: &'static str) -> Result<String, QueryError> {
        self.id.clone().ok_or(QueryError::MissingId { operation })
    }

    /// Submits the request.
    ///
    /// On success the response is stored and, for a bulk query, its id
    /// becomes the query's id. On failure the partial response is stored as
    /// well so the caller can inspect it.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Submit`] for a non-200 response,
    /// [`QueryError::Transport`] if no response arrived, or
    /// [`QueryError::Model`] if the payload or response cannot be converted.
    pub async fn submit(&mut self, client: &dyn PairsClient) -> Result<(), QueryError> {
        let payload = self.request.to_wire_value()?;
        let name = self.request.name.as_deref().unwrap_or("<unnamed>");
        log::info!("Submitting query {name}");

        let response = client.post_json(endpoints::QUERY, &payload).await?;

        if !response.is_ok() {
            let message = response
                .error_message()
                .unwrap_or_else(|| FAILED_MESSAGE.to_string());
            log::error!("Query {name} was rejected (HTTP {}): {message}", response.status);
            log::debug!("Rejection body: {}", response.text());
            self.submit_response = Some(QueryResponse {
                message: Some(message.clone()),
                ..parse_lenient(&response)
            });
            return Err(QueryError::Submit {
                status: response.status,
                message,
            });
        }

        let submitted = QueryResponse::from_value(response.json()?)?;
        if self.is_point_query() {
            log::info!("Point query {name} answered inline");
        } else {
            if submitted.id.is_none() {
                log::warn!("Submission of {name} succeeded but returned no job id");
            }
            self.id.clone_from(&submitted.id);
            log::info!(
                "Query {name} accepted as job {}",
                self.id.as_deref().unwrap_or("<none>")
            );
        }
        self.submit_response = Some(submitted);
        Ok(())
    }

    /// Checks the job status.
    ///
    /// With `poll` set, keeps checking every `interval` until the server
    /// reports a terminal code; otherwise checks once. Succeeded,
    /// NoDataFound, Killed and Deleted return normally. For a real-time
    /// point query nothing is requested and `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingId`] before any request if the query has
    /// no id, [`QueryError::JobFailed`] for Failed, FailedConversion and
    /// unknown codes, [`QueryError::Http`] for a non-200 response,
    /// [`QueryError::Transport`] if no response arrived, and
    /// [`QueryError::Protocol`]/[`QueryError::Model`] for an unreadable
    /// body. A synthetic status is recorded in every error case.
    pub async fn status(
        &mut self,
        client: &dyn PairsClient,
        poll: bool,
        interval: Duration,
    ) -> Result<Option<QueryStatus>, QueryError> {
        if self.is_point_query() {
            log::info!("Point query; no job status to check");
            self.status_response = Some(QueryJob {
                status: Some(POINT_QUERY_STATUS.to_string()),
                ..QueryJob::default()
            });
            return Ok(None);
        }
        self.poll_status(client, poll, interval).await.map(Some)
    }

    async fn poll_status(
        &mut self,
        client: &dyn PairsClient,
        poll: bool,
        interval: Duration,
    ) -> Result<QueryStatus, QueryError> {
        let id = self.job_id("status")?;
        let path = endpoints::query_job(&id)?;

        loop {
            let response = match client.get(&path).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Status request for query {id} failed: {e}");
                    self.record_unspecified_status(&id);
                    return Err(e.into());
                }
            };

            if !response.is_ok() {
                let message = response
                    .error_message()
                    .unwrap_or_else(|| FAILED_MESSAGE.to_string());
                log::error!(
                    "Status request for query {id} returned HTTP {}: {message}",
                    response.status
                );
                self.status_response = Some(QueryJob {
                    id: Some(id),
                    status: Some(format!(
                        "{}({})",
                        QueryStatus::Failed.label(),
                        response.status
                    )),
                    status_code: Some(i64::from(response.status)),
                    ..QueryJob::default()
                });
                return Err(QueryError::Http {
                    operation: "status",
                    status: response.status,
                    message,
                });
            }

            let mut job = match parse_job(&response) {
                Ok(job) => job,
                Err(e) => {
                    log::error!("Unreadable status for query {id}: {e}");
                    self.record_unspecified_status(&id);
                    return Err(e);
                }
            };
            let Some(code) = job.status_code else {
                self.record_unspecified_status(&id);
                return Err(QueryError::Protocol {
                    message: format!("status of query {id} has no statusCode"),
                });
            };

            let status = QueryStatus::from_code(code);
            job.status = Some(status.to_string());
            self.status_response = Some(job);

            if status.is_in_progress() {
                if !poll {
                    log::debug!("Query {id}: {status}");
                    return Ok(status);
                }
                log::debug!("Query {id}: {status}, checking again in {interval:?}");
                tokio::time::sleep(interval).await;
                continue;
            }

            if status.is_quiet_terminal() {
                log::info!("Query {id}: {status}");
                return Ok(status);
            }
            log::error!("Query {id}: {status}");
            return Err(QueryError::JobFailed { id, status });
        }
    }

    fn record_unspecified_status(&mut self, id: &str) {
        self.status_response = Some(QueryJob {
            id: Some(id.to_string()),
            status: Some(format!("Unspecified error({UNSPECIFIED_ERROR_CODE})")),
            status_code: Some(UNSPECIFIED_ERROR_CODE),
            ..QueryJob::default()
        });
    }

    /// Downloads and extracts the job's results.
    ///
    /// Checks the status (without polling) every `interval` until the job
    /// succeeds, then writes `<folder>/<name>.zip` and extracts it into
    /// `<folder>/<name>/`. For a real-time point query, writes any inline
    /// data to one file instead, or skips the step if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Deleted`] without requesting the archive if
    /// the job was deleted, [`QueryError::JobFailed`] for any other
    /// non-success terminal state, and the status, transport, I/O and
    /// archive errors of the individual steps. `download_status` is set to
    /// [`TaskStatus::Failed`] in every error case.
    pub async fn download(
        &mut self,
        client: &dyn PairsClient,
        interval: Duration,
    ) -> Result<(), QueryError> {
        let result = if self.is_point_query() {
            self.write_point_data().await
        } else {
            self.download_bulk(client, interval).await
        };

        match result {
            Ok(status) => {
                self.download_status = Some(status);
                Ok(())
            }
            Err(e) => {
                self.download_status = Some(TaskStatus::Failed);
                Err(e)
            }
        }
    }

    async fn download_bulk(
        &mut self,
        client: &dyn PairsClient,
        interval: Duration,
    ) -> Result<TaskStatus, QueryError> {
        let id = self.job_id("download")?;

        loop {
            match self.poll_status(client, false, interval).await? {
                QueryStatus::Succeeded => break,
                QueryStatus::Deleted => {
                    log::error!("Query {id} was deleted; nothing to download");
                    return Err(QueryError::Deleted { id });
                }
                status if status.is_in_progress() => {
                    log::debug!("Query {id} not ready ({status}), waiting {interval:?}");
                    tokio::time::sleep(interval).await;
                }
                status => {
                    log::error!("Query {id} cannot be downloaded: {status}");
                    return Err(QueryError::JobFailed { id, status });
                }
            }
        }

        let folder = archive::resolve_output_folder(self.folder()).await?;
        let name = self.download_file_name.clone().unwrap_or_else(|| id.clone());
        self.download_folder = Some(folder.clone());
        self.download_file_name = Some(name.clone());

        let archive_path = folder.join(format!("{name}.zip"));
        log::info!("Downloading results of query {id}");
        let response = client
            .download_to(&endpoints::download(&id)?, &archive_path)
            .await?;
        if !response.is_ok() {
            return Err(QueryError::Http {
                operation: "download",
                status: response.status,
                message: response
                    .error_message()
                    .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
            });
        }

        let extract_dir = folder.join(&name);
        archive::extract_zip(&archive_path, &extract_dir).await?;

        self.output_info = match archive::read_output_info(&extract_dir).await {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Ignoring unreadable output.info for query {id}: {e}");
                None
            }
        };

        log::info!("Query {id} downloaded to {}", extract_dir.display());
        Ok(TaskStatus::Succeeded)
    }

    async fn write_point_data(&mut self) -> Result<TaskStatus, QueryError> {
        let Some(data) = self
            .submit_response
            .as_ref()
            .and_then(|r| r.data.as_ref())
            .filter(|d| !d.is_empty())
            .cloned()
        else {
            log::info!("Point query has no inline data; nothing to download");
            return Ok(TaskStatus::Skipped);
        };

        let folder = archive::resolve_output_folder(self.folder()).await?;
        let stem = self
            .download_file_name
            .clone()
            .or_else(|| self.request.name.clone())
            .unwrap_or_else(|| DEFAULT_POINT_FILE_STEM.to_string());

        let (file_name, contents) = match data {
            PointData::Csv(text) => (format!("{stem}.csv"), text.into_bytes()),
            PointData::Rows(rows) => (
                format!("{stem}.json"),
                serde_json::to_vec_pretty(&rows).map_err(ModelError::from)?,
            ),
        };

        archive::write_archive(&contents, &folder.join(&file_name)).await?;
        self.download_folder = Some(folder);
        self.download_file_name = Some(stem);
        Ok(TaskStatus::Succeeded)
    }

    fn folder(&self) -> &Path {
        self.download_folder
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_DOWNLOAD_DIR))
    }

    /// Submits, then checks the status.
    ///
    /// # Errors
    ///
    /// Returns the first error; status is not checked if submission fails.
    pub async fn submit_and_check_status(
        &mut self,
        client: &dyn PairsClient,
        poll: bool,
        interval: Duration,
    ) -> Result<(), QueryError> {
        self.submit(client).await?;
        self.status(client, poll, interval).await?;
        Ok(())
    }

    /// Polls the status to a terminal code, then downloads.
    ///
    /// # Errors
    ///
    /// Returns the first error; nothing is downloaded if the status check
    /// fails.
    pub async fn check_status_and_download(
        &mut self,
        client: &dyn PairsClient,
        interval: Duration,
    ) -> Result<(), QueryError> {
        self.status(client, true, interval).await?;
        self.download(client, interval).await
    }

    /// Runs the whole lifecycle: submit, poll to a terminal code, download.
    ///
    /// # Errors
    ///
    /// Returns the first error; later steps are not attempted.
    pub async fn submit_check_status_and_download(
        &mut self,
        client: &dyn PairsClient,
        interval: Duration,
    ) -> Result<(), QueryError> {
        self.submit(client).await?;
        self.check_status_and_download(client, interval).await
    }

    /// Merges the output layers of job `other_id` into job `base_id` on the
    /// server.
    ///
    /// On success the merged layer list replaces `merge_response`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Merge`] with a status-specific message for a
    /// non-200 response, or [`QueryError::Transport`] if no response
    /// arrived. `merge_status` is set to [`TaskStatus::Failed`] in every
    /// error case.
    pub async fn merge_query_into_base(
        &mut self,
        client: &dyn PairsClient,
        other_id: &str,
        base_id: &str,
    ) -> Result<(), QueryError> {
        let result = merge(client, other_id, base_id).await;
        match result {
            Ok(layers) => {
                self.merge_response = layers;
                self.merge_status = Some(TaskStatus::Succeeded);
                Ok(())
            }
            Err(e) => {
                self.merge_status = Some(TaskStatus::Failed);
                Err(e)
            }
        }
    }
}

async fn merge(
    client: &dyn PairsClient,
    other_id: &str,
    base_id: &str,
) -> Result<Vec<QueryJobLayer>, QueryError> {
    log::info!("Merging query {other_id} into {base_id}");
    let response = client
        .put_json(&endpoints::merge(base_id, other_id)?, None)
        .await?;

    let message = match response.status {
        200 => {
            let layers = parse_layers(response.json()?)?;
            log::info!(
                "Merged query {other_id} into {base_id}: {} layers",
                layers.len()
            );
            return Ok(layers);
        }
        401 => format!("not authorized to merge query {other_id} into {base_id}"),
        404 => format!("query {other_id} or base query {base_id} was not found"),
        412 => format!(
            "query {other_id} cannot be merged into {base_id}; the queries are not compatible"
        ),
        status => response
            .error_message()
            .unwrap_or_else(|| format!("merge of {other_id} into {base_id} failed ({status})")),
    };

    log::error!("Merge failed (HTTP {}): {message}", response.status);
    Err(QueryError::Merge {
        status: response.status,
        message,
    })
}

/// Accepts either a bare layer array or an object wrapping it in `data`.
fn parse_layers(body: serde_json::Value) -> Result<Vec<QueryJobLayer>, QueryError> {
    let items = match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(QueryError::Protocol {
                    message: "merge response has no layer list".to_string(),
                });
            }
        },
        other => {
            return Err(QueryError::Protocol {
                message: format!("unexpected merge response: {other}"),
            });
        }
    };

    items
        .into_iter()
        .map(|item| QueryJobLayer::from_value(item).map_err(QueryError::from))
        .collect()
}

fn parse_job(response: &HttpResponse) -> Result<QueryJob, QueryError> {
    let value: serde_json::Value = response.json().map_err(ModelError::from)?;
    Ok(QueryJob::from_value(value)?)
}

/// Parses whatever can be parsed out of a failed submission response.
fn parse_lenient(response: &HttpResponse) -> QueryResponse {
    response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|value| QueryResponse::from_value(value).ok())
        .unwrap_or_default()
}

/// Sets or clears the favorite flag of a job.
///
/// # Errors
///
/// Returns [`QueryError::Http`] for a non-200 response or
/// [`QueryError::Transport`] if no response arrived.
pub async fn set_favorite(
    client: &dyn PairsClient,
    id: &str,
    favorite: bool,
) -> Result<(), QueryError> {
    let body = serde_json::json!({ "favorite": favorite });
    let response = client
        .put_json(&endpoints::favorite(id)?, Some(&body))
        .await?;
    if !response.is_ok() {
        return Err(QueryError::Http {
            operation: if favorite { "favorite" } else { "unfavorite" },
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
        });
    }
    log::info!(
        "Query {id} {}",
        if favorite { "favorited" } else { "unfavorited" }
    );
    Ok(())
}

/// Marks a job as a favorite.
///
/// # Errors
///
/// See [`set_favorite`].
pub async fn favorite(client: &dyn PairsClient, id: &str) -> Result<(), QueryError> {
    set_favorite(client, id, true).await
}

/// Clears a job's favorite mark.
///
/// # Errors
///
/// See [`set_favorite`].
pub async fn unfavorite(client: &dyn PairsClient, id: &str) -> Result<(), QueryError> {
    set_favorite(client, id, false).await
}

/// Fetches the status snapshot of any job without attaching it to a query.
///
/// # Errors
///
/// Returns [`QueryError::Http`] for a non-200 response,
/// [`QueryError::Transport`] if no response arrived, or
/// [`QueryError::Model`] if the body cannot be parsed.
pub async fn query_job(client: &dyn PairsClient, id: &str) -> Result<QueryJob, QueryError> {
    let response = client.get(&endpoints::query_job(id)?).await?;
    if !response.is_ok() {
        return Err(QueryError::Http {
            operation: "query job",
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
        });
    }
    let mut job = parse_job(&response)?;
    if let Some(status) = job.query_status() {
        job.status = Some(status.to_string());
    }
    Ok(job)
}

/// Fetches a user's most recent jobs.
///
/// The server may answer with a bare job array or a full
/// [`LatestQueries`] object; both are accepted.
///
/// # Errors
///
/// Returns [`QueryError::Http`] for a non-200 response,
/// [`QueryError::Transport`] if no response arrived, or
/// [`QueryError::Model`] if the body cannot be parsed.
pub async fn latest_queries(
    client: &dyn PairsClient,
    user: &str,
    count: u32,
) -> Result<LatestQueries, QueryError> {
    let response = client.get(&endpoints::latest(user, count)?).await?;
    if !response.is_ok() {
        return Err(QueryError::Http {
            operation: "latest queries",
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
        });
    }

    let body: serde_json::Value = response.json()?;
    let mut latest = match body {
        serde_json::Value::Array(items) => LatestQueries {
            jobs: items
                .into_iter()
                .map(QueryJob::from_value)
                .collect::<Result<_, _>>()?,
            ..LatestQueries::default()
        },
        other => LatestQueries::from_value(other)?,
    };
    latest.user_id.get_or_insert_with(|| user.to_string());
    latest.count.get_or_insert(count);
    Ok(latest)
}

/// Builds a query from `input` and submits it.
///
/// # Errors
///
/// See [`Query::submit`]. The partially updated query is dropped on error;
/// use the method directly to inspect it.
pub async fn submit(
    input: impl Into<QueryInput> + Send,
    client: &dyn PairsClient,
) -> Result<Query, QueryError> {
    let mut query = Query::from_input(input)?;
    query.submit(client).await?;
    Ok(query)
}

/// Builds a query from `input`, submits it and checks its status.
///
/// # Errors
///
/// See [`Query::submit_and_check_status`].
pub async fn submit_and_check_status(
    input: impl Into<QueryInput> + Send,
    client: &dyn PairsClient,
    poll: bool,
    interval: Duration,
) -> Result<Query, QueryError> {
    let mut query = Query::from_input(input)?;
    query.submit_and_check_status(client, poll, interval).await?;
    Ok(query)
}

/// Builds a query from `input` and runs its whole lifecycle, writing
/// results under `folder`.
///
/// # Errors
///
/// See [`Query::submit_check_status_and_download`].
pub async fn submit_check_status_and_download(
    input: impl Into<QueryInput> + Send,
    client: &dyn PairsClient,
    folder: &Path,
    interval: Duration,
) -> Result<Query, QueryError> {
    let mut query = Query::from_input(input)?.with_download_folder(folder);
    query
        .submit_check_status_and_download(client, interval)
        .await?;
    Ok(query)
}
