//! Connection session
//!
//! One physical WebSocket connection and the background task that reads it.
//! Frames are gzip-decoded, `Ping` probes are answered with `Pong`, and every
//! other payload goes to a single handler, in receipt order, on that task.
//!
//! Lifecycle: `Connecting -> Open -> Closing -> Closed`. Either a fault or a
//! stop request moves an open session to closing; the socket is closed before
//! the done signal fires, and the done signal fires exactly once.

use crate::bingx::codec;
use crate::config::endpoints::redact_endpoint;
use crate::error::{BingxError, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ACCEPT_ENCODING;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest inbound message accepted, in bytes
const READ_LIMIT: usize = 655_350;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Write half shared by the receive loop (probe replies) and the handle
/// (follow-up subscribe frames). `None` once the session has closed.
type SharedWriter = Arc<Mutex<Option<WsWriter>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// Caller-side view of a running session
///
/// Cloning is cheap; all clones observe the same session.
#[derive(Clone)]
pub struct SessionHandle {
    endpoint: String,
    stop: CancellationToken,
    done: CancellationToken,
    writer: SharedWriter,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    /// Requests a graceful shutdown. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// The stop signal; cancelling it is the same as calling [`stop`](Self::stop)
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once the receive loop has exited and the socket is closed
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn state(&self) -> SessionState {
        if self.done.is_cancelled() {
            SessionState::Closed
        } else if self.stop.is_cancelled() {
            SessionState::Closing
        } else {
            SessionState::Open
        }
    }

    /// Endpoint with any query string (listen key) removed
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a text frame on this session's connection
    pub(crate) async fn send_text(&self, text: &str) -> Result<()> {
        send_text(&self.writer, text).await
    }
}

/// Opens a session and starts its receive loop
///
/// A non-empty `init_message` is sent right after the handshake, before any
/// frame is read. Dial, handshake and init-send failures are returned here as
/// `BingxError::Connect` and nothing is spawned.
///
/// After that, `handler` receives every decoded non-probe payload and
/// `err_handler` is called at most once, with the fault that ended the
/// session, unless the caller had already asked the session to stop.
pub async fn serve<H, E>(
    endpoint: &str,
    init_message: Option<String>,
    handler: H,
    err_handler: E,
) -> Result<SessionHandle>
where
    H: FnMut(String) + Send + 'static,
    E: FnOnce(BingxError) + Send + 'static,
{
    let label = redact_endpoint(endpoint).to_string();

    let mut request = endpoint
        .into_client_request()
        .map_err(|e| BingxError::Connect(format!("invalid endpoint {}: {}", label, e)))?;
    request
        .headers_mut()
        .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    info!(endpoint = %label, "Connecting to BingX stream");

    let config = WebSocketConfig::default().max_message_size(Some(READ_LIMIT));
    let (ws_stream, _) = connect_async_with_config(request, Some(config), false)
        .await
        .map_err(|e| BingxError::Connect(format!("{}: {}", label, e)))?;

    let (mut write, read) = ws_stream.split();

    if let Some(init) = init_message.filter(|m| !m.is_empty()) {
        write.send(Message::Text(init.into())).await.map_err(|e| {
            BingxError::Connect(format!("failed to send initial message to {}: {}", label, e))
        })?;
    }

    info!(endpoint = %label, "BingX stream connected");

    let handle = SessionHandle {
        endpoint: label,
        stop: CancellationToken::new(),
        done: CancellationToken::new(),
        writer: Arc::new(Mutex::new(Some(write))),
    };

    tokio::spawn(receive_loop(handle.clone(), read, handler, err_handler));

    Ok(handle)
}

enum LoopExit {
    Stopped,
    Fault(BingxError),
}

async fn receive_loop<H, E>(session: SessionHandle, mut read: WsReader, mut handler: H, err_handler: E)
where
    H: FnMut(String) + Send + 'static,
    E: FnOnce(BingxError) + Send + 'static,
{
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = session.stop.cancelled() => break LoopExit::Stopped,
            next = read.next() => next,
        };

        let decoded = match next {
            Some(Ok(Message::Binary(data))) => codec::decode_gzip(&data),
            Some(Ok(Message::Text(text))) => codec::decode_gzip(text.as_str().as_bytes()),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                continue;
            }
            Some(Ok(Message::Close(frame))) => Err(BingxError::Transport(format!(
                "connection closed by peer: {:?}",
                frame
            ))),
            Some(Err(e)) => Err(BingxError::Transport(e.to_string())),
            None => Err(BingxError::Transport("connection closed".to_string())),
        };

        let text = match decoded {
            Ok(text) => text,
            Err(e) => break LoopExit::Fault(e),
        };

        if codec::is_ping(&text) {
            debug!(endpoint = %session.endpoint, "Received ping, sending pong");
            if let Err(e) = send_text(&session.writer, codec::PONG).await {
                break LoopExit::Fault(e);
            }
            continue;
        }

        handler(text);
    };

    // Closing: release the socket before anyone can observe done
    if let Some(mut write) = session.writer.lock().await.take() {
        if let Err(e) = write.close().await {
            debug!(endpoint = %session.endpoint, error = %e, "Close handshake failed");
        }
    }
    drop(read);

    report_exit(&session.endpoint, exit, session.stop.is_cancelled(), err_handler);
    session.done.cancel();
}

/// Faults seen once a stop was requested are not passed on
fn report_exit<E>(endpoint: &str, exit: LoopExit, stop_requested: bool, err_handler: E)
where
    E: FnOnce(BingxError),
{
    match exit {
        LoopExit::Stopped => {
            info!(endpoint = %endpoint, "BingX stream stopped");
        }
        LoopExit::Fault(e) if stop_requested => {
            debug!(endpoint = %endpoint, error = %e, "Ignoring error raised during shutdown");
        }
        LoopExit::Fault(e) => {
            warn!(endpoint = %endpoint, error = %e, "BingX stream terminated");
            err_handler(e);
        }
    }
}

async fn send_text(writer: &SharedWriter, text: &str) -> Result<()> {
    let mut guard = writer.lock().await;
    let write = guard
        .as_mut()
        .ok_or_else(|| BingxError::Transport("session is closed".to_string()))?;
    write
        .send(Message::Text(text.to_string().into()))
        .await
        .map_err(|e| BingxError::Transport(format!("write failed: {}", e)))
}
