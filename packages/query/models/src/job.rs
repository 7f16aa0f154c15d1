//! Query job metadata: status snapshots, job listings and merged layers.

use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::status::QueryStatus;

/// Status snapshot of a single query job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryJob {
    /// Job identifier.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Submission timestamp as reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Owning user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Human-readable status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Numeric status code; drives all control flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    /// Query window start in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Query window end in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// South-west corner latitude of the result bounding box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_lat: Option<f64>,
    /// South-west corner longitude.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_lon: Option<f64>,
    /// North-east corner latitude.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ne_lat: Option<f64>,
    /// North-east corner longitude.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ne_lon: Option<f64>,
    /// Progress in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_complete: Option<f64>,
    /// Whether the result archive is ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    /// User-assigned nickname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Folder the job is filed under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Job description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether results were published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    /// Whether the job is marked as a favorite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl QueryJob {
    /// Returns the decoded status, if a status code is present.
    #[must_use]
    pub fn query_status(&self) -> Option<QueryStatus> {
        self.status_code.map(QueryStatus::from_code)
    }
}

/// A page of query jobs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryJobs {
    /// Jobs on this page.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<QueryJob>,
}

/// A layer contained in a job's output, as returned by a merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryJobLayer {
    /// Layer identifier.
    #[serde(
        deserialize_with = "coerce::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Layer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Dataset the layer belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    /// Storage data type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    /// Resolution level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    /// Coordinate reference system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

/// A user's query history within a time window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryHistory {
    /// User the history belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Window start (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Window end (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Page offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Jobs in the window.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<QueryJob>,
}

/// The most recent queries of a user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LatestQueries {
    /// User the queries belong to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Number of queries requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Most recent jobs, newest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<QueryJob>,
}
