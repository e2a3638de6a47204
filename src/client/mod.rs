//! Backend client
//!
//! The UX test backend exposes one job at a time: a start request, two
//! server-sent event streams (progress and logs), a results document and a
//! stop request. `JobBackend` is the seam the session controller talks to;
//! `HttpJobClient` is the real implementation.

pub mod http;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use http::HttpJobClient;

/// Raw `data` payloads of one event stream, in arrival order
pub type FrameStream = BoxStream<'static, Result<String, ClientError>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{channel} stream failed: {message}")]
    Stream {
        channel: StreamChannel,
        message: String,
    },

    #[error("{channel} stream closed by server")]
    StreamEnded { channel: StreamChannel },
}

impl ClientError {
    /// A clean end of stream, as opposed to a broken connection
    pub fn is_stream_end(&self) -> bool {
        matches!(self, ClientError::StreamEnded { .. })
    }
}

/// The two server-pushed channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamChannel {
    Progress,
    Logs,
}

impl fmt::Display for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamChannel::Progress => write!(f, "progress"),
            StreamChannel::Logs => write!(f, "logs"),
        }
    }
}

/// Body of the start request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub app_name: String,
    pub category: String,
    pub max_depth: u32,
}

/// Acknowledgement of an accepted job. The backend echoes the request back;
/// every field is optional since the payload is not relied on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartJobAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopJobResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Ask the backend to begin a job
    async fn start_job(&self, request: &StartJobRequest) -> Result<StartJobAck, ClientError>;

    /// Fetch the results document. Error payloads (`{"error": ...}`) are
    /// returned as values; interpreting them is the caller's job.
    async fn fetch_results(&self) -> Result<serde_json::Value, ClientError>;

    async fn stop_job(&self) -> Result<StopJobResponse, ClientError>;

    /// Open one event stream
    async fn open_stream(&self, channel: StreamChannel) -> Result<FrameStream, ClientError>;
}
