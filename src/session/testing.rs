//! In-process fakes for driving the controller and subscribers in tests

use super::dashboard::Dashboard;
use super::log_sink::LogEntry;
use super::state::SessionState;
use crate::client::{
    ClientError, FrameStream, JobBackend, StartJobAck, StartJobRequest, StopJobResponse,
    StreamChannel,
};
use crate::report::Report;
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type FrameSender = UnboundedSender<Result<String, ClientError>>;

/// Backend whose replies are set up front and whose streams are fed by hand
pub struct ScriptedBackend {
    start_failure: Mutex<Option<String>>,
    results: Mutex<Value>,
    results_failure: Mutex<Option<String>>,
    stop_response: Mutex<StopJobResponse>,
    stop_failure: Mutex<Option<String>>,
    refuse_streams: AtomicBool,
    streams: Mutex<HashMap<StreamChannel, Vec<FrameSender>>>,
    last_start: Mutex<Option<StartJobRequest>>,
    start_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            start_failure: Mutex::new(None),
            results: Mutex::new(json!({"summary": "ok"})),
            results_failure: Mutex::new(None),
            stop_response: Mutex::new(StopJobResponse {
                success: true,
                error: None,
                message: Some("Agent stopped".to_string()),
            }),
            stop_failure: Mutex::new(None),
            refuse_streams: AtomicBool::new(false),
            streams: Mutex::new(HashMap::new()),
            last_start: Mutex::new(None),
            start_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_start(&self, body: &str) {
        *self.start_failure.lock().unwrap() = Some(body.to_string());
    }

    pub fn results(&self, value: Value) {
        *self.results.lock().unwrap() = value;
    }

    pub fn fail_results(&self, body: &str) {
        *self.results_failure.lock().unwrap() = Some(body.to_string());
    }

    pub fn refuse_stop(&self, error: &str) {
        *self.stop_response.lock().unwrap() = StopJobResponse {
            success: false,
            error: Some(error.to_string()),
            message: None,
        };
    }

    pub fn fail_stop(&self, body: &str) {
        *self.stop_failure.lock().unwrap() = Some(body.to_string());
    }

    pub fn refuse_streams(&self) {
        self.refuse_streams.store(true, Ordering::SeqCst);
    }

    pub fn last_start(&self) -> Option<StartJobRequest> {
        self.last_start.lock().unwrap().clone()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn stream_opens(&self, channel: StreamChannel) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(&channel)
            .map_or(0, Vec::len)
    }

    /// Feed for the first stream opened on `channel`
    pub async fn feed(&self, channel: StreamChannel) -> Feed {
        self.feed_nth(channel, 0).await
    }

    /// Feed for the `n`th stream opened on `channel`, waiting for it to open
    pub async fn feed_nth(&self, channel: StreamChannel, n: usize) -> Feed {
        for _ in 0..500 {
            let sender = self
                .streams
                .lock()
                .unwrap()
                .get(&channel)
                .and_then(|senders| senders.get(n).cloned());
            if let Some(tx) = sender {
                return Feed { tx, channel };
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("{} stream #{} was never opened", channel, n);
    }
}

fn scripted_failure(path: &str, body: &str) -> ClientError {
    ClientError::Status {
        url: format!("http://scripted{}", path),
        status: 503,
        body: body.to_string(),
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn start_job(&self, request: &StartJobRequest) -> Result<StartJobAck, ClientError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_start.lock().unwrap() = Some(request.clone());
        if let Some(body) = self.start_failure.lock().unwrap().clone() {
            return Err(scripted_failure("/start-job", &body));
        }
        Ok(StartJobAck {
            status: Some("started".to_string()),
            app_name: Some(request.app_name.clone()),
            category: Some(request.category.clone()),
            max_depth: Some(request.max_depth),
        })
    }

    async fn fetch_results(&self) -> Result<Value, ClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(body) = self.results_failure.lock().unwrap().clone() {
            return Err(scripted_failure("/results", &body));
        }
        Ok(self.results.lock().unwrap().clone())
    }

    async fn stop_job(&self) -> Result<StopJobResponse, ClientError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(body) = self.stop_failure.lock().unwrap().clone() {
            return Err(scripted_failure("/stop-job", &body));
        }
        Ok(self.stop_response.lock().unwrap().clone())
    }

    async fn open_stream(&self, channel: StreamChannel) -> Result<FrameStream, ClientError> {
        if self.refuse_streams.load(Ordering::SeqCst) {
            return Err(scripted_failure(&format!("/{}", channel), "streams disabled"));
        }
        let (tx, rx) = unbounded();
        self.streams
            .lock()
            .unwrap()
            .entry(channel)
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }
}

/// Writing end of one scripted stream. Sends to a closed stream are ignored.
pub struct Feed {
    tx: FrameSender,
    channel: StreamChannel,
}

impl Feed {
    pub fn frame(&self, data: &str) {
        let _ = self.tx.unbounded_send(Ok(data.to_string()));
    }

    pub fn progress(&self, message: &str, percentage: f64) {
        self.frame(&json!({"message": message, "percentage": percentage}).to_string());
    }

    pub fn log(&self, message: &str, kind: Option<&str>) {
        let frame = match kind {
            Some(kind) => json!({"message": message, "type": kind}),
            None => json!({"message": message}),
        };
        self.frame(&frame.to_string());
    }

    pub fn keepalive(&self) {
        self.frame(r#"{"keepalive": true}"#);
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.unbounded_send(Err(ClientError::Stream {
            channel: self.channel,
            message: message.to_string(),
        }));
    }

    /// Close the stream as a server would
    pub fn end(&self) {
        self.tx.close_channel();
    }
}

/// Dashboard that records every call
#[derive(Debug, Default)]
pub struct RecordingDashboard {
    pub logs: Vec<LogEntry>,
    pub clears: usize,
    pub progress: Vec<(String, f64)>,
    pub cancel: Vec<bool>,
    pub states: Vec<SessionState>,
    pub alerts: Vec<String>,
    pub confirms: usize,
    pub confirm_answer: bool,
    pub reports: Vec<Report>,
}

impl RecordingDashboard {
    pub fn confirming(answer: bool) -> Self {
        Self {
            confirm_answer: answer,
            ..Self::default()
        }
    }

    pub fn percentages(&self) -> Vec<f64> {
        self.progress.iter().map(|(_, pct)| *pct).collect()
    }
}

impl Dashboard for RecordingDashboard {
    fn log_appended(&mut self, entries: &[LogEntry]) {
        self.logs.extend_from_slice(entries);
    }

    fn log_cleared(&mut self) {
        self.clears += 1;
        self.logs.clear();
    }

    fn progress_updated(&mut self, message: &str, percentage: f64) {
        self.progress.push((message.to_string(), percentage));
    }

    fn cancel_visibility_changed(&mut self, visible: bool) {
        self.cancel.push(visible);
    }

    fn state_changed(&mut self, state: SessionState) {
        self.states.push(state);
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn confirm(&mut self, _prompt: &str) -> bool {
        self.confirms += 1;
        self.confirm_answer
    }

    fn present_report(&mut self, report: &Report) {
        self.reports.push(report.clone());
    }
}
