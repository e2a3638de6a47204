//! Session lifecycle controller.
//!
//! Owns the one live session: validates and starts the job, owns both stream
//! subscribers, reconciles their events into a single state machine and
//! tears everything down on the way back to idle.
//!
//! ```text
//! Idle -> Starting -> Running -> Completing -> Complete
//!                        |            |
//!                        +-> Error / Stopped -> (reset) -> Idle
//! ```
//!
//! All inputs (stream events, stream failures, the settle timer, stop
//! requests) funnel through one inbox and are handled one at a time, in
//! arrival order, by `run_until_settled` / `step`.

use super::dashboard::Dashboard;
use super::error::{SessionError, ValidationError};
use super::log_sink::{EventLogSink, LogEntry, LogLevel};
use super::state::{
    LogEvent, ProgressEvent, SessionForm, SessionOutcome, SessionState, Terminal,
};
use crate::client::{ClientError, JobBackend, StartJobRequest, StreamChannel};
use crate::report::Report;
use crate::stream::{Subscriber, SubscriberId};
use crate::utils::config::Config;
use log::{debug, error, info, trace, warn};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const STOP_PROMPT: &str = "Are you sure you want to stop the agent execution?";
const STOPPED_BY_USER: &str = "Agent execution stopped by user";

/// Controller settings, usually derived from `Config`
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub settle_delay: Duration,
    pub default_max_depth: u32,
    pub depth_range: RangeInclusive<u32>,
    /// Empty accepts any non-empty category
    pub categories: Vec<String>,
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            default_max_depth: config.default_max_depth,
            depth_range: config.depth_range(),
            categories: config.categories.clone(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug)]
enum Input {
    Progress(SubscriberId, ProgressEvent),
    Log(SubscriberId, LogEvent),
    StreamFailed(SubscriberId, ClientError),
    SettleElapsed(u64),
    StopRequested,
}

/// Requests `stop_agent` from outside the controller (e.g. a signal handler)
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: mpsc::UnboundedSender<Input>,
}

impl StopHandle {
    pub fn request(&self) {
        let _ = self.tx.send(Input::StopRequested);
    }
}

/// Result of a stop attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No running session with an open progress stream
    Unavailable,
    Declined,
    Stopped,
    /// The backend answered `success: false`
    Refused(String),
    Failed(String),
}

pub struct SessionController<D: Dashboard> {
    backend: Arc<dyn JobBackend>,
    dashboard: D,
    config: ControllerConfig,

    state: SessionState,
    form: SessionForm,
    sink: EventLogSink,
    progress: Option<Subscriber<ProgressEvent>>,
    logs: Option<Subscriber<LogEvent>>,
    settle_timer: Option<JoinHandle<()>>,
    cancel_visible: bool,
    stopped_by_user: bool,
    last_progress: Option<ProgressEvent>,
    report: Option<Report>,
    outcome: Option<SessionOutcome>,

    /// Bumped on every start; timers from older sessions are ignored
    generation: u64,
    next_subscriber: u64,
    inbox_tx: mpsc::UnboundedSender<Input>,
    inbox_rx: mpsc::UnboundedReceiver<Input>,
}

impl<D: Dashboard> SessionController<D> {
    pub fn new(backend: Arc<dyn JobBackend>, dashboard: D, config: ControllerConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let form = SessionForm::with_default_depth(config.default_max_depth);
        Self {
            backend,
            dashboard,
            config,
            state: SessionState::Idle,
            form,
            sink: EventLogSink::new(),
            progress: None,
            logs: None,
            settle_timer: None,
            cancel_visible: false,
            stopped_by_user: false,
            last_progress: None,
            report: None,
            outcome: None,
            generation: 0,
            next_subscriber: 0,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn form(&self) -> &SessionForm {
        &self.form
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        self.sink.entries()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn last_progress(&self) -> Option<&ProgressEvent> {
        self.last_progress.as_ref()
    }

    pub fn cancel_visible(&self) -> bool {
        self.cancel_visible
    }

    pub fn progress_open(&self) -> bool {
        self.progress.is_some()
    }

    pub fn logs_open(&self) -> bool {
        self.logs.is_some()
    }

    pub fn dashboard(&self) -> &D {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut D {
        &mut self.dashboard
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Validate the form, start the job and open both streams.
    ///
    /// Validation failures are alerted and change nothing. A failed start
    /// request is alerted, recorded and leaves the controller idle.
    pub async fn start_test(
        &mut self,
        app_name: &str,
        category: &str,
        max_depth: u32,
    ) -> Result<(), SessionError> {
        if !self.state.can_start() {
            return Err(SessionError::Busy(self.state));
        }
        let form = match self.validate(app_name, category, max_depth) {
            Ok(form) => form,
            Err(e) => {
                self.dashboard.alert(&e.to_string());
                return Err(e.into());
            }
        };

        // The previous session must be fully gone before new streams open
        self.teardown();
        while self.inbox_rx.try_recv().is_ok() {}
        self.generation += 1;
        self.report = None;
        self.outcome = None;
        self.last_progress = None;
        self.stopped_by_user = false;
        self.form = form.clone();

        self.sink.reset();
        self.dashboard.log_cleared();
        self.set_state(SessionState::Starting);
        self.log("Starting test configuration...", LogLevel::Info);
        self.set_cancel_visible(true);

        let request = StartJobRequest {
            app_name: form.app_name.clone(),
            category: form.category.clone(),
            max_depth: form.max_depth,
        };
        match self.backend.start_job(&request).await {
            Ok(ack) => {
                debug!("job accepted: {:?}", ack);
                info!(
                    "session {} started for {} ({}, depth {})",
                    self.generation, form.app_name, form.category, form.max_depth
                );
                self.log(&format!("Test initiated for {}", form.app_name), LogLevel::Success);
                self.set_state(SessionState::Running);
                self.open_subscribers();
                Ok(())
            }
            Err(e) => {
                error!("start request failed: {}", e);
                self.fail_session(
                    &format!("Error starting test: {}", e),
                    &format!("Error: {}", e),
                    SessionState::Error,
                );
                Err(e.into())
            }
        }
    }

    /// Ask the backend to stop the running job, after confirmation.
    ///
    /// On success the session goes down the same path as a failed job. On
    /// failure the session keeps running: the job may not have stopped.
    pub async fn stop_agent(&mut self) -> StopOutcome {
        if self.state != SessionState::Running || !self.cancel_visible || self.progress.is_none()
        {
            debug!("stop ignored in state {}", self.state);
            return StopOutcome::Unavailable;
        }
        if !self.dashboard.confirm(STOP_PROMPT) {
            return StopOutcome::Declined;
        }

        self.log("Stopping agent...", LogLevel::Warning);
        match self.backend.stop_job().await {
            Ok(response) if response.success => {
                self.log("Agent stopped successfully", LogLevel::Info);
                self.set_cancel_visible(false);
                self.stopped_by_user = true;
                self.handle_progress(ProgressEvent::new(STOPPED_BY_USER, -1.0));
                StopOutcome::Stopped
            }
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "no reason given".to_string());
                warn!("stop refused: {}", reason);
                self.log(&format!("Failed to stop agent: {}", reason), LogLevel::Error);
                StopOutcome::Refused(reason)
            }
            Err(e) => {
                warn!("stop request failed: {}", e);
                self.log(&format!("Error stopping agent: {}", e), LogLevel::Error);
                StopOutcome::Failed(e.to_string())
            }
        }
    }

    /// Back to idle from anywhere. Safe to repeat.
    pub fn reset_test(&mut self) {
        self.set_cancel_visible(false);
        self.teardown();
        self.report = None;
        self.stopped_by_user = false;
        self.form = SessionForm::with_default_depth(self.config.default_max_depth);
        self.sink.reset();
        self.dashboard.log_cleared();
        self.set_state(SessionState::Idle);
    }

    /// Handle inputs until the session is no longer starting, running or
    /// completing. Returns how the session ended, if it has.
    pub async fn run_until_settled(&mut self) -> Option<SessionOutcome> {
        while self.state.is_active() {
            if !self.step().await {
                break;
            }
        }
        self.outcome.clone()
    }

    /// Wait for and handle one input
    pub async fn step(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(input) => {
                self.dispatch(input).await;
                true
            }
            None => false,
        }
    }

    async fn dispatch(&mut self, input: Input) {
        match input {
            Input::Progress(id, event) => {
                if current(&self.progress, id) {
                    self.handle_progress(event);
                } else {
                    trace!("dropping progress event from stale subscriber {}", id);
                }
            }
            Input::Log(id, event) => {
                if current(&self.logs, id) {
                    self.handle_log(event);
                } else {
                    trace!("dropping log event from stale subscriber {}", id);
                }
            }
            Input::StreamFailed(id, error) => self.handle_stream_failure(id, error),
            Input::SettleElapsed(generation) => {
                if generation == self.generation && self.state == SessionState::Completing {
                    self.settle_timer = None;
                    self.load_results().await;
                }
            }
            Input::StopRequested => {
                let outcome = self.stop_agent().await;
                debug!("stop request: {:?}", outcome);
            }
        }
    }

    fn handle_progress(&mut self, event: ProgressEvent) {
        self.dashboard
            .progress_updated(&event.message, event.percentage);
        let terminal = event.terminal();
        let message = event.message.clone();
        self.last_progress = Some(event);

        match terminal {
            Some(Terminal::Success) => {
                self.close_progress();
                if self.state == SessionState::Running && self.settle_timer.is_none() {
                    self.set_state(SessionState::Completing);
                    self.schedule_results();
                }
            }
            Some(Terminal::Failure) => {
                self.close_progress();
                let terminal_state = if self.stopped_by_user {
                    SessionState::Stopped
                } else {
                    SessionState::Error
                };
                self.fail_session(&format!("Test failed: {}", message), &message, terminal_state);
            }
            None => {}
        }
    }

    fn handle_log(&mut self, event: LogEvent) {
        let level = LogLevel::from_tag(event.kind.as_deref());
        self.log(&event.message, level);
    }

    /// A lost log stream is abandoned and the session carries on. Losing the
    /// progress stream before the final event fails the session, since
    /// nothing else can move it out of `Running`.
    fn handle_stream_failure(&mut self, id: SubscriberId, error: ClientError) {
        let channel = if current(&self.progress, id) {
            self.progress = None;
            StreamChannel::Progress
        } else if current(&self.logs, id) {
            self.logs = None;
            StreamChannel::Logs
        } else {
            trace!("ignoring failure of stale subscriber {}: {}", id, error);
            return;
        };

        if channel == StreamChannel::Progress && self.state == SessionState::Running {
            warn!("progress stream lost before completion: {}", error);
            let message = format!("Lost progress stream: {}", error);
            self.fail_session(&message, &message, SessionState::Error);
            return;
        }

        if error.is_stream_end() {
            debug!("{} stream ended", channel);
        } else {
            warn!("{} stream lost: {}", channel, error);
            self.log(
                &format!("Lost {} stream: {}", channel, error),
                LogLevel::Warning,
            );
        }
    }

    async fn load_results(&mut self) {
        match self.fetch_report().await {
            Ok(report) => {
                self.set_state(SessionState::Complete);
                self.close_logs();
                self.set_cancel_visible(false);
                self.dashboard.present_report(&report);
                self.outcome = Some(SessionOutcome::Completed(report.clone()));
                self.report = Some(report);
            }
            Err(e) => {
                warn!("results unavailable: {}", e);
                let message = format!("Error loading results: {}", e);
                self.fail_session(&message, &message, SessionState::Error);
            }
        }
    }

    async fn fetch_report(&self) -> Result<Report, SessionError> {
        let value = self.backend.fetch_results().await?;
        Ok(Report::from_value(value)?)
    }

    /// Alert, reset, then record `entry` in the fresh log so it outlives the reset
    fn fail_session(&mut self, alert: &str, entry: &str, terminal: SessionState) {
        self.set_state(terminal);
        self.outcome = Some(match terminal {
            SessionState::Stopped => SessionOutcome::Stopped,
            _ => SessionOutcome::Failed(entry.to_string()),
        });
        self.dashboard.alert(alert);
        self.reset_test();
        self.log(entry, LogLevel::Error);
    }

    fn validate(
        &self,
        app_name: &str,
        category: &str,
        max_depth: u32,
    ) -> Result<SessionForm, ValidationError> {
        let app_name = app_name.trim();
        if app_name.is_empty() {
            return Err(ValidationError::MissingAppName);
        }
        let category = category.trim();
        if category.is_empty() {
            return Err(ValidationError::MissingCategory);
        }
        if !self.config.categories.is_empty()
            && !self
                .config
                .categories
                .iter()
                .any(|known| known.eq_ignore_ascii_case(category))
        {
            return Err(ValidationError::UnknownCategory(category.to_string()));
        }
        if !self.config.depth_range.contains(&max_depth) {
            return Err(ValidationError::MaxDepthOutOfRange {
                value: max_depth,
                min: *self.config.depth_range.start(),
                max: *self.config.depth_range.end(),
            });
        }

        Ok(SessionForm {
            app_name: app_name.to_string(),
            category: category.to_string(),
            max_depth,
        })
    }

    fn open_subscribers(&mut self) {
        let progress_id = self.next_id();
        let event_tx = self.inbox_tx.clone();
        let error_tx = self.inbox_tx.clone();
        self.progress = Some(Subscriber::open(
            self.backend.clone(),
            StreamChannel::Progress,
            progress_id,
            move |id, event| {
                let _ = event_tx.send(Input::Progress(id, event));
            },
            move |id, error| {
                let _ = error_tx.send(Input::StreamFailed(id, error));
            },
        ));

        let logs_id = self.next_id();
        let event_tx = self.inbox_tx.clone();
        let error_tx = self.inbox_tx.clone();
        self.logs = Some(Subscriber::open(
            self.backend.clone(),
            StreamChannel::Logs,
            logs_id,
            move |id, event| {
                let _ = event_tx.send(Input::Log(id, event));
            },
            move |id, error| {
                let _ = error_tx.send(Input::StreamFailed(id, error));
            },
        ));
    }

    fn next_id(&mut self) -> SubscriberId {
        self.next_subscriber += 1;
        SubscriberId(self.next_subscriber)
    }

    fn schedule_results(&mut self) {
        let tx = self.inbox_tx.clone();
        let generation = self.generation;
        let delay = self.config.settle_delay;
        self.settle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::SettleElapsed(generation));
        }));
    }

    fn close_progress(&mut self) {
        if let Some(mut subscriber) = self.progress.take() {
            subscriber.close();
        }
    }

    fn close_logs(&mut self) {
        if let Some(mut subscriber) = self.logs.take() {
            subscriber.close();
        }
    }

    /// Close both streams and cancel a pending results fetch
    fn teardown(&mut self) {
        self.close_logs();
        self.close_progress();
        if let Some(timer) = self.settle_timer.take() {
            timer.abort();
        }
    }

    fn log(&mut self, message: &str, level: LogLevel) {
        let added = self.sink.append(message, level);
        if !added.is_empty() {
            self.dashboard.log_appended(added);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("session state {} -> {}", self.state, state);
            self.state = state;
            self.dashboard.state_changed(state);
        }
    }

    fn set_cancel_visible(&mut self, visible: bool) {
        if self.cancel_visible != visible {
            self.cancel_visible = visible;
            self.dashboard.cancel_visibility_changed(visible);
        }
    }
}

fn current<E>(slot: &Option<Subscriber<E>>, id: SubscriberId) -> bool {
    slot.as_ref().map_or(false, |subscriber| subscriber.id() == id)
}
