// Local WebSocket server standing in for the BingX stream endpoint.
//
// Frames sent to the client are gzip compressed the way the exchange sends
// them; frames received from the client are returned as plain text.

#![allow(dead_code)]

use bingx_connector::bingx::codec;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

pub struct MockServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/swap-market", listener.local_addr().unwrap());
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(MockConnection { ws }).is_err() {
                        break;
                    }
                }
            }
        });

        Self { url, connections }
    }

    /// Next accepted client connection
    pub async fn accept(&mut self) -> MockConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("no client connected")
            .expect("listener stopped")
    }

    /// True if a further client connected within `wait`
    pub async fn has_pending_connection(&mut self, wait: Duration) -> bool {
        matches!(tokio::time::timeout(wait, self.connections.recv()).await, Ok(Some(_)))
    }
}

pub struct MockConnection {
    ws: WebSocketStream<TcpStream>,
}

impl MockConnection {
    pub async fn send_gzip(&mut self, text: &str) {
        let frame = codec::encode_gzip(text).unwrap();
        let _ = self.ws.send(Message::Binary(frame.into())).await;
    }

    /// Sends an uncompressed binary frame; the client may already be gone
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let _ = self.ws.send(Message::Binary(bytes.to_vec().into())).await;
    }

    /// Next text frame from the client, `None` once it has gone away
    pub async fn recv_text(&mut self) -> Option<String> {
        loop {
            let next = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for client frame");
            match next {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_string()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Parses the next client frame as a subscription request
    pub async fn recv_json(&mut self) -> serde_json::Value {
        let text = self.recv_text().await.expect("client closed");
        serde_json::from_str(&text).unwrap()
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Topic envelope as pushed by the exchange
pub fn envelope(topic: &str, data: &str) -> String {
    format!(r#"{{"code":0,"dataType":"{}","data":{}}}"#, topic, data)
}

/// Kline snapshot payload
pub fn kline(close: &str, time: i64) -> String {
    format!(
        r#"{{"o":"100.0","h":"110.0","l":"95.0","c":"{}","v":"12.5","T":{}}}"#,
        close, time
    )
}
