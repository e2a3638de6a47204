//! HTTP implementation of the backend client

use super::{
    ClientError, FrameStream, JobBackend, StartJobAck, StartJobRequest, StopJobResponse,
    StreamChannel,
};
use crate::stream::sse::SseDecoder;
use crate::utils::config::{Config, Endpoints};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

/// HTTP client for the UX test backend
pub struct HttpJobClient {
    /// Base URL (e.g., "http://localhost:5000")
    base_url: String,
    endpoints: Endpoints,
    client: reqwest::Client,
    /// Applied to JSON requests only; streams stay open as long as the job runs
    request_timeout: Duration,
}

impl HttpJobClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let base_url = config.server_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|source| ClientError::Request {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url,
            endpoints: config.endpoints.clone(),
            client,
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn stream_url(&self, channel: StreamChannel) -> String {
        match channel {
            StreamChannel::Progress => self.url(&self.endpoints.progress),
            StreamChannel::Logs => self.url(&self.endpoints.logs),
        }
    }

    /// Send a request and read the whole body as text
    async fn send_for_text(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), ClientError> {
        let request_error = |source| ClientError::Request {
            url: url.to_string(),
            source,
        };
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;
        Ok((status, body))
    }
}

fn status_error(url: &str, status: reqwest::StatusCode, body: &str) -> ClientError {
    ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: truncate_body(body),
    }
}

fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_string(),
    }
}

#[async_trait]
impl JobBackend for HttpJobClient {
    async fn start_job(&self, request: &StartJobRequest) -> Result<StartJobAck, ClientError> {
        let url = self.url(&self.endpoints.start);
        let (status, body) = self
            .send_for_text(&url, self.client.post(&url).json(request))
            .await?;

        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url,
            message: e.to_string(),
        })
    }

    async fn fetch_results(&self) -> Result<Value, ClientError> {
        let url = self.url(&self.endpoints.results);
        let (status, body) = self.send_for_text(&url, self.client.get(&url)).await?;

        match serde_json::from_str::<Value>(&body) {
            // Error documents come back with 404/500; they carry their own message
            Ok(value) if status.is_success() || value.get("error").is_some() => Ok(value),
            Ok(_) => Err(status_error(&url, status, &body)),
            Err(e) if status.is_success() => Err(ClientError::Decode {
                url,
                message: e.to_string(),
            }),
            Err(_) => Err(status_error(&url, status, &body)),
        }
    }

    async fn stop_job(&self) -> Result<StopJobResponse, ClientError> {
        let url = self.url(&self.endpoints.stop);
        let (status, body) = self.send_for_text(&url, self.client.post(&url)).await?;

        match serde_json::from_str::<StopJobResponse>(&body) {
            Ok(response) => Ok(response),
            Err(_) if !status.is_success() => Err(status_error(&url, status, &body)),
            Err(e) => Err(ClientError::Decode {
                url,
                message: e.to_string(),
            }),
        }
    }

    async fn open_stream(&self, channel: StreamChannel) -> Result<FrameStream, ClientError> {
        let url = self.stream_url(channel);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&url, status, &body));
        }

        let bytes = response
            .bytes_stream()
            .map_err(move |e| ClientError::Stream {
                channel,
                message: e.to_string(),
            })
            .boxed();

        let frames = futures_util::stream::unfold(
            (bytes, SseDecoder::new(), VecDeque::new()),
            |(mut bytes, mut decoder, mut pending)| async move {
                loop {
                    if let Some(data) = pending.pop_front() {
                        return Some((Ok(data), (bytes, decoder, pending)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(e)) => return Some((Err(e), (bytes, decoder, pending))),
                        None => return None,
                    }
                }
            },
        );

        Ok(frames.boxed())
    }
}
