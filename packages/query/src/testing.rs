//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{ClientError, HttpResponse, PairsClient};

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(HttpResponse),
    TransportError(String),
}

type Responder = Box<dyn Fn(&RecordedCall) -> MockReply + Send + Sync>;

/// Scripted [`PairsClient`].
///
/// Replies are taken from the queue in order; once it is empty the
/// responder (if any) answers instead, otherwise a transport error is
/// returned.
#[derive(Default)]
pub struct MockClient {
    replies: Mutex<VecDeque<MockReply>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder(
        responder: impl Fn(&RecordedCall) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_json(&self, status: u16, body: &serde_json::Value) {
        self.push(MockReply::Response(json_response(status, body)));
    }

    pub fn push_bytes(&self, status: u16, body: Vec<u8>) {
        self.push(MockReply::Response(HttpResponse::new(status, body)));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.push(MockReply::TransportError(message.to_string()));
    }

    pub fn push_status_codes(&self, codes: &[i64]) {
        for &code in codes {
            self.push_json(200, &serde_json::json!({"id": "1", "statusCode": code}));
        }
    }

    fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path_suffix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path.ends_with(path_suffix))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, ClientError> {
        let call = RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        };
        self.calls.lock().unwrap().push(call.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let queued = self.replies.lock().unwrap().pop_front();
        let reply = match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(&call),
            (None, None) => MockReply::TransportError(format!("no reply scripted for {path}")),
        };
        match reply {
            MockReply::Response(response) => Ok(response),
            MockReply::TransportError(message) => Err(ClientError::Connection { message }),
        }
    }
}

#[async_trait]
impl PairsClient for MockClient {
    async fn get(&self, path: &str) -> Result<HttpResponse, ClientError> {
        self.answer("GET", path, None).await
    }

    async fn download_to(&self, path: &str, dest: &Path) -> Result<HttpResponse, ClientError> {
        let response = self.answer("GET", path, None).await?;
        if !response.is_ok() {
            return Ok(response);
        }
        tokio::fs::write(dest, &response.body)
            .await
            .map_err(|source| ClientError::Io {
                path: dest.display().to_string(),
                source,
            })?;
        Ok(HttpResponse::new(response.status, Vec::new()))
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ClientError> {
        self.answer("POST", path, Some(body)).await
    }

    async fn put_json(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, ClientError> {
        self.answer("PUT", path, body).await
    }
}

pub fn json_response(status: u16, body: &serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(body).unwrap())
}

/// Builds an in-memory zip archive from `(name, contents)` pairs.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Creates an empty, uniquely named directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pairs_query_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
