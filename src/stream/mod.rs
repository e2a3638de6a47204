//! Stream subscribers
//!
//! A `Subscriber<E>` owns one server-sent event channel: it opens the stream
//! on a background task, decodes each frame into `E`, drops keepalive
//! heartbeats and hands everything else to a callback. It never reconnects.

pub mod sse;

use crate::client::{ClientError, JobBackend, StreamChannel};
use futures_util::StreamExt;
use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Identifies one subscriber instance across the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<E> {
    Keepalive,
    Event(E),
}

/// Decode one `data` payload. Keepalive detection runs before the payload is
/// interpreted as `E`, so heartbeats never need to match the event shape.
pub fn decode_frame<E: DeserializeOwned>(data: &str) -> Result<Frame<E>, serde_json::Error> {
    let value: Value = serde_json::from_str(data)?;
    if value.get("keepalive").map_or(false, is_truthy) {
        return Ok(Frame::Keepalive);
    }
    serde_json::from_value(value).map(Frame::Event)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub struct Subscriber<E> {
    id: SubscriberId,
    channel: StreamChannel,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    _event: PhantomData<fn() -> E>,
}

impl<E> Subscriber<E>
where
    E: DeserializeOwned + Send + 'static,
{
    /// Start consuming `channel`.
    ///
    /// `on_event` gets every non-keepalive event in arrival order.
    /// `on_error` is called at most once, when the stream cannot be opened,
    /// breaks, or is ended by the server; the subscriber is closed by then.
    /// Neither callback fires after `close`.
    pub fn open<F, G>(
        backend: Arc<dyn JobBackend>,
        channel: StreamChannel,
        id: SubscriberId,
        on_event: F,
        on_error: G,
    ) -> Self
    where
        F: Fn(SubscriberId, E) + Send + 'static,
        G: FnOnce(SubscriberId, ClientError) + Send + 'static,
    {
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();

        let task = tokio::spawn(async move {
            let fail = |error: ClientError| {
                if !flag.swap(true, Ordering::SeqCst) {
                    on_error(id, error);
                }
            };

            let mut frames = match backend.open_stream(channel).await {
                Ok(frames) => frames,
                Err(e) => {
                    fail(e);
                    return;
                }
            };
            debug!("{} subscriber {} connected", channel, id);

            while let Some(item) = frames.next().await {
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                match item {
                    Ok(data) => match decode_frame::<E>(&data) {
                        Ok(Frame::Keepalive) => trace!("{} keepalive", channel),
                        Ok(Frame::Event(event)) => on_event(id, event),
                        Err(e) => warn!("{} subscriber {}: malformed frame {:?}: {}", channel, id, data, e),
                    },
                    Err(e) => {
                        fail(e);
                        return;
                    }
                }
            }

            fail(ClientError::StreamEnded { channel });
        });

        Self {
            id,
            channel,
            closed,
            task: Some(task),
            _event: PhantomData,
        }
    }
}

impl<E> Subscriber<E> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn channel(&self) -> StreamChannel {
        self.channel
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Stop the channel. Idempotent; frames still in flight are dropped.
    pub fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("{} subscriber {} closed", self.channel, self.id);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<E> Drop for Subscriber<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::ScriptedBackend;
    use serde::Deserialize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Tick {
        n: u32,
    }

    #[derive(Debug)]
    enum Seen {
        Event(u32),
        Error(bool),
    }

    fn open_ticks(
        backend: &Arc<ScriptedBackend>,
        channel: StreamChannel,
    ) -> (Subscriber<Tick>, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let err_tx = tx.clone();
        let subscriber = Subscriber::open(
            backend.clone(),
            channel,
            SubscriberId(1),
            move |_, tick: Tick| {
                let _ = tx.send(Seen::Event(tick.n));
            },
            move |_, error| {
                let _ = err_tx.send(Seen::Error(error.is_stream_end()));
            },
        );
        (subscriber, rx)
    }

    #[test]
    fn test_decode_keepalive_before_shape() {
        assert_eq!(
            decode_frame::<Tick>(r#"{"keepalive": true}"#).unwrap(),
            Frame::Keepalive
        );
        assert_eq!(
            decode_frame::<Tick>(r#"{"keepalive": 1, "n": 3}"#).unwrap(),
            Frame::Keepalive
        );
        assert_eq!(
            decode_frame::<Tick>(r#"{"keepalive": false, "n": 3}"#).unwrap(),
            Frame::Event(Tick { n: 3 })
        );
        assert!(decode_frame::<Tick>("not json").is_err());
        assert!(decode_frame::<Tick>(r#"{"other": 1}"#).is_err());
    }

    #[tokio::test]
    async fn test_delivers_events_and_skips_keepalive_and_garbage() {
        let backend = Arc::new(ScriptedBackend::new());
        let (mut subscriber, mut rx) = open_ticks(&backend, StreamChannel::Logs);

        let feed = backend.feed(StreamChannel::Logs).await;
        feed.frame(r#"{"n": 1}"#);
        feed.frame(r#"{"keepalive": true}"#);
        feed.frame("{broken");
        feed.frame(r#"{"n": 2}"#);

        assert!(matches!(rx.recv().await, Some(Seen::Event(1))));
        assert!(matches!(rx.recv().await, Some(Seen::Event(2))));
        assert!(subscriber.is_open());

        subscriber.close();
        subscriber.close();
        assert!(!subscriber.is_open());
    }

    #[tokio::test]
    async fn test_transport_error_closes_subscriber() {
        let backend = Arc::new(ScriptedBackend::new());
        let (subscriber, mut rx) = open_ticks(&backend, StreamChannel::Progress);

        let feed = backend.feed(StreamChannel::Progress).await;
        feed.fail("connection reset");
        feed.frame(r#"{"n": 9}"#);

        assert!(matches!(rx.recv().await, Some(Seen::Error(false))));
        assert!(!subscriber.is_open());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_server_end_reports_stream_end() {
        let backend = Arc::new(ScriptedBackend::new());
        let (subscriber, mut rx) = open_ticks(&backend, StreamChannel::Logs);

        let feed = backend.feed(StreamChannel::Logs).await;
        feed.frame(r#"{"n": 4}"#);
        feed.end();

        assert!(matches!(rx.recv().await, Some(Seen::Event(4))));
        assert!(matches!(rx.recv().await, Some(Seen::Error(true))));
        assert!(!subscriber.is_open());
    }

    #[tokio::test]
    async fn test_open_failure_reports_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.refuse_streams();
        let (subscriber, mut rx) = open_ticks(&backend, StreamChannel::Logs);

        assert!(matches!(rx.recv().await, Some(Seen::Error(false))));
        assert!(!subscriber.is_open());
    }

    #[tokio::test]
    async fn test_no_delivery_after_close() {
        let backend = Arc::new(ScriptedBackend::new());
        let (mut subscriber, mut rx) = open_ticks(&backend, StreamChannel::Logs);

        let feed = backend.feed(StreamChannel::Logs).await;
        subscriber.close();
        feed.frame(r#"{"n": 5}"#);
        feed.end();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
