//! HTTP collaborator used by the query lifecycle.
//!
//! The lifecycle never talks to the network directly: it calls a
//! [`PairsClient`], which returns the raw status code and body of each
//! response and leaves interpretation to the caller. Transport failures
//! (connection refused, TLS errors, timeouts) surface as [`ClientError`];
//! non-200 responses are returned normally.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt as _;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt as _;

use crate::config::PairsConfig;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("pairs-query/", env!("CARGO_PKG_VERSION"));

/// API paths used by the lifecycle.
///
/// Ids and user names are percent-encoded as single path segments, and
/// query parameters are form-encoded.
pub mod endpoints {
    use super::ClientError;

    /// Query submission.
    pub const QUERY: &str = "/v2/query";

    /// Origin the paths are built against; only the path and query are kept.
    const PATH_ORIGIN: &str = "http://localhost/";

    /// Status of one job.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn query_job(id: &str) -> Result<String, ClientError> {
        build(&["v2", "queryjobs", id], &[])
    }

    /// Result archive of one job.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn download(id: &str) -> Result<String, ClientError> {
        build(&["v2", "queryjobs", id, "download"], &[])
    }

    /// Merge `other` into `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn merge(base: &str, other: &str) -> Result<String, ClientError> {
        build(&["v2", "queryjobs", base, "merge", other], &[])
    }

    /// Favorite flag of one job.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn favorite(id: &str) -> Result<String, ClientError> {
        build(&["v2", "queryjobs", id, "favorite"], &[])
    }

    /// Most recent jobs of a user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the path cannot be built.
    pub fn latest(user: &str, count: u32) -> Result<String, ClientError> {
        let count = count.to_string();
        build(
            &["v2", "queryhistories", user, "latest"],
            &[("count", count.as_str())],
        )
    }

    fn build(segments: &[&str], query: &[(&str, &str)]) -> Result<String, ClientError> {
        let mut url = reqwest::Url::parse(PATH_ORIGIN).map_err(|e| ClientError::InvalidUrl {
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl {
                message: format!("{PATH_ORIGIN} cannot hold path segments"),
            })?
            .clear()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        })
    }
}

/// Errors raised when a request produced no usable response.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying HTTP client failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The connection failed for a reason reported as text.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// A request path could not be built.
    #[error("Invalid URL: {message}")]
    InvalidUrl {
        /// Description of the failure.
        message: String,
    },

    /// A streamed body could not be written to disk.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Destination path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A complete HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response.
    #[must_use]
    pub const fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns `true` for HTTP 200, the only status the API uses for
    /// success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Extracts the `message` field of a JSON error body, if there is one.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let body: serde_json::Value = self.json().ok()?;
        body.get("message")
            .and_then(serde_json::Value::as_str)
            .filter(|m| !m.is_empty())
            .map(String::from)
    }
}

/// Minimal HTTP client the lifecycle depends on.
#[async_trait]
pub trait PairsClient: Send + Sync {
    /// Sends a GET expecting a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if no response was received.
    async fn get(&self, path: &str) -> Result<HttpResponse, ClientError>;

    /// Sends a GET for a binary body and streams it into `dest`.
    ///
    /// Only a 200 body is written; it is returned with an empty `body`. Any
    /// other response is returned whole and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if no response was received or `dest`
    /// cannot be written.
    async fn download_to(&self, path: &str, dest: &Path) -> Result<HttpResponse, ClientError>;

    /// Sends a POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if no response was received.
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ClientError>;

    /// Sends a PUT, with a JSON body if one is given.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if no response was received.
    async fn put_json(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, ClientError>;
}

/// [`PairsClient`] backed by `reqwest`.
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
    user: Option<String>,
    api_key: Option<String>,
}

impl ReqwestClient {
    /// Creates a client for the server and credentials in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &PairsConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: config.server.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.user {
            Some(user) => builder.basic_auth(user, self.api_key.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<HttpResponse, ClientError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        log::trace!("HTTP {status}, {} bytes", body.len());
        Ok(HttpResponse::new(status, body))
    }
}

fn io_error(dest: &Path, source: std::io::Error) -> ClientError {
    ClientError::Io {
        path: dest.display().to_string(),
        source,
    }
}

#[async_trait]
impl PairsClient for ReqwestClient {
    async fn get(&self, path: &str) -> Result<HttpResponse, ClientError> {
        log::debug!("GET {path}");
        let builder = self
            .request(reqwest::Method::GET, path)
            .header(reqwest::header::ACCEPT, "application/json");
        self.send(builder).await
    }

    async fn download_to(&self, path: &str, dest: &Path) -> Result<HttpResponse, ClientError> {
        log::debug!("GET {path} -> {}", dest.display());
        let response = self
            .request(reqwest::Method::GET, path)
            .header(reqwest::header::ACCEPT, "application/octet-stream")
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.bytes().await?.to_vec();
            return Ok(HttpResponse::new(status, body));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| io_error(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error(dest, e))?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| io_error(dest, e))?;

        #[allow(clippy::cast_precision_loss)]
        let mb = downloaded as f64 / 1_048_576.0;
        log::info!("  wrote {} ({mb:.1} MB)", dest.display());
        Ok(HttpResponse::new(status, Vec::new()))
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ClientError> {
        log::debug!("POST {path}");
        let builder = self.request(reqwest::Method::POST, path).json(body);
        self.send(builder).await
    }

    async fn put_json(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, ClientError> {
        log::debug!("PUT {path}");
        let builder = self.request(reqwest::Method::PUT, path);
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        self.send(builder).await
    }
}
