//! Subscription protocol
//!
//! A topic subscription sends `{"id","reqType":"sub","dataType"}` as the
//! first frame of its session, then only lets through envelopes whose
//! `dataType` equals the topic key. Envelopes are read twice: a minimal
//! header first, the typed payload only on a match. A payload that fails to
//! decode is reported and skipped; the session keeps running.

use crate::error::{BingxError, Result};
use crate::stream::session::{self, SessionHandle};
use crate::bingx::types::ApiError;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// `{symbol}@{stream_kind}_{stream_param}`, e.g. `BTC-USDT@kline_1m`
pub fn topic_key(symbol: &str, stream_kind: &str, stream_param: &str) -> String {
    format!("{}@{}_{}", symbol, stream_kind, stream_param)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Sub,
    Unsub,
}

/// Outbound subscribe / unsubscribe frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub id: String,
    #[serde(rename = "reqType")]
    pub kind: RequestKind,
    #[serde(rename = "dataType")]
    pub topic: String,
}

impl SubscriptionRequest {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::new(RequestKind::Sub, topic)
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::new(RequestKind::Unsub, topic)
    }

    fn new(kind: RequestKind, topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            topic: topic.into(),
        }
    }

    /// Serializes to the wire text format
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_frame(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// Just enough of an inbound envelope to route it
#[derive(Debug, Deserialize)]
pub(crate) struct TopicHeader {
    #[serde(default)]
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) msg: String,
    #[serde(rename = "dataType", default)]
    pub(crate) data_type: Option<String>,
}

#[derive(Deserialize)]
struct TopicEnvelope<T> {
    data: T,
}

/// Reads the `dataType` tag of a decoded frame
pub(crate) fn read_topic(text: &str) -> Result<TopicHeader> {
    Ok(serde_json::from_str(text)?)
}

/// Decodes `data` of an envelope tagged with `topic`
///
/// Returns `Ok(None)` for envelopes of other topics, acknowledgements and
/// anything else without a matching tag.
pub fn decode_topic_payload<T: DeserializeOwned>(topic: &str, text: &str) -> Result<Option<T>> {
    let header = read_topic(text)?;
    if header.data_type.as_deref() != Some(topic) {
        return Ok(None);
    }
    if header.code != 0 {
        return Err(ApiError {
            code: header.code,
            message: header.msg,
        }
        .into());
    }
    let envelope: TopicEnvelope<T> = serde_json::from_str(text)?;
    Ok(Some(envelope.data))
}

/// Error callback shared by a subscription's message handler (per-message
/// decode errors) and its session (the terminal fault)
pub(crate) struct ErrorSink(Arc<Mutex<Box<dyn FnMut(BingxError) + Send>>>);

impl ErrorSink {
    pub(crate) fn new<E>(on_error: E) -> Self
    where
        E: FnMut(BingxError) + Send + 'static,
    {
        Self(Arc::new(Mutex::new(Box::new(on_error))))
    }

    /// Runs the callback; a callback that panicked earlier does not stop
    /// later reports
    pub(crate) fn report(&self, err: BingxError) {
        let mut on_error = self.0.lock().unwrap_or_else(|poisoned| {
            warn!("Error callback panicked earlier; still reporting");
            PoisonError::into_inner(poisoned)
        });
        (on_error)(err);
    }
}

impl Clone for ErrorSink {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Wraps a typed callback in the topic filter
pub(crate) fn topic_handler<T, F>(
    topic: String,
    mut on_payload: F,
    errors: ErrorSink,
) -> impl FnMut(String) + Send + 'static
where
    T: DeserializeOwned + 'static,
    F: FnMut(T) + Send + 'static,
{
    move |text: String| match decode_topic_payload::<T>(&topic, &text) {
        Ok(Some(payload)) => on_payload(payload),
        Ok(None) => debug!(topic = %topic, "Discarding message for another topic"),
        Err(e) => errors.report(e),
    }
}

/// Serves a dedicated session that subscribes to `topic` on connect
pub(crate) async fn serve_topic<H>(
    endpoint: &str,
    topic: &str,
    handler: H,
    errors: ErrorSink,
) -> Result<SessionHandle>
where
    H: FnMut(String) + Send + 'static,
{
    let frame = SubscriptionRequest::subscribe(topic).to_frame()?;
    info!(topic = %topic, "Subscribing to BingX topic");
    session::serve(endpoint, Some(frame), handler, move |e| errors.report(e)).await
}

/// Subscribes to `{symbol}@{stream_kind}_{stream_param}` on its own session
///
/// `on_event` receives the decoded `data` of every matching envelope.
/// `on_error` receives per-message decode errors (the session continues) and
/// the fault that ends the session, if any.
pub async fn subscribe_topic<T, F, E>(
    endpoint: &str,
    symbol: &str,
    stream_kind: &str,
    stream_param: &str,
    on_event: F,
    on_error: E,
) -> Result<SessionHandle>
where
    T: DeserializeOwned + 'static,
    F: FnMut(T) + Send + 'static,
    E: FnMut(BingxError) + Send + 'static,
{
    let topic = topic_key(symbol, stream_kind, stream_param);
    let errors = ErrorSink::new(on_error);
    let handler = topic_handler(topic.clone(), on_event, errors.clone());
    serve_topic(endpoint, &topic, handler, errors).await
}

/// Item delivered through a [`Subscription`]
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Data(T),
    Error(BingxError),
}

/// Sending side of a subscription channel, split into the two callbacks the
/// session layer expects
pub(crate) struct EventSink<T> {
    tx: mpsc::UnboundedSender<StreamEvent<T>>,
}

impl<T: Send + 'static> EventSink<T> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn on_data(&self) -> impl FnMut(T) + Send + 'static {
        let tx = self.tx.clone();
        move |event| {
            let _ = tx.send(StreamEvent::Data(event));
        }
    }

    pub(crate) fn on_error(&self) -> impl FnMut(BingxError) + Send + 'static {
        let tx = self.tx.clone();
        move |err| {
            let _ = tx.send(StreamEvent::Error(err));
        }
    }
}

/// Channel view of one session
///
/// Events arrive in session order. The channel ends after the session has
/// closed and everything it produced has been read. Dropping the
/// subscription stops the session.
pub struct Subscription<T> {
    handle: SessionHandle,
    events: mpsc::UnboundedReceiver<StreamEvent<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(handle: SessionHandle, events: mpsc::UnboundedReceiver<StreamEvent<T>>) -> Self {
        Self { handle, events }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent<T>> {
        self.events.recv().await
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub async fn wait(&self) {
        self.handle.wait().await;
    }
}

impl<T> Stream for Subscription<T> {
    type Item = StreamEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}
