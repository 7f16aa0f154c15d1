#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client-side lifecycle of a PAIRS query.
//!
//! A [`Query`] is submitted to the server, its job status is polled on a
//! fixed interval until the server reports a terminal code, and the result
//! archive is downloaded and unpacked. Real-time point queries are answered
//! inline by the submission and skip the polling and download steps.
//!
//! All network access goes through the [`PairsClient`] trait, which callers
//! pass explicitly to every lifecycle operation. [`ReqwestClient`] is the
//! production implementation; build it once at the composition root from a
//! [`PairsConfig`].
//!
//! Many queries can be run together with [`batch::run_batch`], which bounds
//! how many lifecycles are in flight at once.

pub mod archive;
pub mod batch;
pub mod client;
pub mod config;
pub mod progress;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

use pairs_query_models::{ModelError, QueryStatus};

pub use batch::{BatchOptions, BatchOutcome, run_batch};
pub use client::{ClientError, HttpResponse, PairsClient, ReqwestClient};
pub use config::PairsConfig;
pub use query::{Query, QueryInput, TaskStatus};

/// Errors that can occur during a query lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// An operation that needs a job id was called before one was assigned.
    #[error("Query has no id; submit it before calling {operation}")]
    MissingId {
        /// Operation that needed the id.
        operation: &'static str,
    },

    /// The server rejected a submission.
    #[error("Submit failed (HTTP {status}): {message}")]
    Submit {
        /// HTTP status code.
        status: u16,
        /// Message parsed from the response body.
        message: String,
    },

    /// The server answered a request with a non-200 status.
    #[error("{operation} failed (HTTP {status}): {message}")]
    Http {
        /// Operation that issued the request.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Message parsed from the response body.
        message: String,
    },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(#[source] ClientError),

    /// The response arrived but did not have the expected shape.
    #[error("Unexpected response: {message}")]
    Protocol {
        /// Description of what was wrong.
        message: String,
    },

    /// The job reached a failed or unknown terminal state.
    #[error("Query {id} ended with status {status}")]
    JobFailed {
        /// Job identifier.
        id: String,
        /// Terminal status reported by the server.
        status: QueryStatus,
    },

    /// The job was deleted on the server, so there is nothing to download.
    #[error("Query {id} was deleted on the server")]
    Deleted {
        /// Job identifier.
        id: String,
    },

    /// A merge request was rejected.
    #[error("Merge failed (HTTP {status}): {message}")]
    Merge {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason.
        message: String,
    },

    /// I/O error (directory creation, file write).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The result archive could not be read or extracted.
    #[error("Archive error at {path}: {message}")]
    Archive {
        /// Archive path.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// A transfer object could not be parsed or serialized.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A blocking filesystem task panicked or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Invalid configuration or caller-supplied option.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl From<serde_json::Error> for QueryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Model(ModelError::from(value))
    }
}

impl From<ClientError> for QueryError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Io { path, source } => Self::Io { path, source },
            other => Self::Transport(other),
        }
    }
}
