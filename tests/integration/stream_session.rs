// Integration tests for the connection session
//
// A local WebSocket server plays the exchange:
// - keepalive probes are answered on the wire and never reach the handler
// - payloads reach the handler in receipt order
// - faults end the session and are reported once
// - a stop request suppresses the fault it provokes

mod common;

#[cfg(test)]
mod stream_session_tests {
    use super::common::{MockServer, WAIT};
    use bingx_connector::error::BingxError;
    use bingx_connector::stream::session::{serve, SessionHandle, SessionState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Callbacks {
        messages: mpsc::UnboundedReceiver<String>,
        errors: mpsc::UnboundedReceiver<BingxError>,
        error_count: Arc<AtomicUsize>,
    }

    async fn open(url: &str, init: Option<String>) -> (SessionHandle, Callbacks) {
        let (msg_tx, messages) = mpsc::unbounded_channel();
        let (err_tx, errors) = mpsc::unbounded_channel();
        let error_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&error_count);

        let handle = serve(
            url,
            init,
            move |text| {
                let _ = msg_tx.send(text);
            },
            move |err| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = err_tx.send(err);
            },
        )
        .await
        .expect("session should open");

        (
            handle,
            Callbacks {
                messages,
                errors,
                error_count,
            },
        )
    }

    async fn next_message(callbacks: &mut Callbacks) -> Option<String> {
        tokio::time::timeout(WAIT, callbacks.messages.recv())
            .await
            .expect("timed out waiting for handler")
    }

    async fn wait_done(handle: &SessionHandle) {
        tokio::time::timeout(WAIT, handle.wait())
            .await
            .expect("session did not finish");
    }

    #[tokio::test]
    async fn test_ping_is_answered_and_not_delivered() {
        let mut server = MockServer::start().await;
        let (handle, mut callbacks) = open(&server.url, None).await;
        let mut conn = server.accept().await;

        conn.send_gzip("Ping").await;
        assert_eq!(conn.recv_text().await.as_deref(), Some("Pong"));

        conn.send_gzip(r#"{"dataType":"x"}"#).await;
        assert_eq!(next_message(&mut callbacks).await.as_deref(), Some(r#"{"dataType":"x"}"#));

        handle.stop();
        wait_done(&handle).await;
        assert!(callbacks.messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_payloads_arrive_in_order() {
        let mut server = MockServer::start().await;
        let (handle, mut callbacks) = open(&server.url, None).await;
        let mut conn = server.accept().await;

        for i in 0..20 {
            conn.send_gzip(&format!("message-{}", i)).await;
        }
        for i in 0..20 {
            assert_eq!(next_message(&mut callbacks).await, Some(format!("message-{}", i)));
        }

        handle.stop();
        wait_done(&handle).await;
    }

    #[tokio::test]
    async fn test_init_message_is_first_frame() {
        let mut server = MockServer::start().await;
        let init = r#"{"id":"1","reqType":"sub","dataType":"BTC-USDT@kline_1m"}"#.to_string();
        let (handle, _callbacks) = open(&server.url, Some(init.clone())).await;
        let mut conn = server.accept().await;

        assert_eq!(conn.recv_text().await, Some(init));

        handle.stop();
        wait_done(&handle).await;
    }

    #[tokio::test]
    async fn test_decode_failure_ends_session() {
        let mut server = MockServer::start().await;
        let (handle, mut callbacks) = open(&server.url, None).await;
        let mut conn = server.accept().await;

        conn.send_gzip("before").await;
        conn.send_raw(b"definitely not gzip").await;
        conn.send_gzip("after").await;

        wait_done(&handle).await;

        assert_eq!(callbacks.messages.recv().await.as_deref(), Some("before"));
        assert!(matches!(callbacks.errors.recv().await, Some(BingxError::Decode(_))));
        assert_eq!(callbacks.error_count.load(Ordering::SeqCst), 1);
        // sender side was dropped with the loop; "after" never arrived
        assert_eq!(callbacks.messages.recv().await, None);
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_remote_close_reports_transport_fault_once() {
        let mut server = MockServer::start().await;
        let (handle, mut callbacks) = open(&server.url, None).await;
        let conn = server.accept().await;

        conn.close().await;
        wait_done(&handle).await;

        assert!(matches!(callbacks.errors.recv().await, Some(BingxError::Transport(_))));
        assert_eq!(callbacks.error_count.load(Ordering::SeqCst), 1);
        assert!(!handle.is_stop_requested());
    }

    #[tokio::test]
    async fn test_stop_suppresses_fault() {
        let mut server = MockServer::start().await;
        let (handle, callbacks) = open(&server.url, None).await;
        let mut conn = server.accept().await;

        handle.stop();
        conn.send_raw(b"garbage after stop").await;
        wait_done(&handle).await;

        assert_eq!(callbacks.error_count.load(Ordering::SeqCst), 0);
        assert!(handle.is_done());
        // the client closed its end before signalling done
        assert_eq!(conn.recv_text().await, None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut server = MockServer::start().await;
        let (handle, callbacks) = open(&server.url, None).await;
        let _conn = server.accept().await;

        let clone = handle.clone();
        handle.stop();
        clone.stop();
        clone.stop_token().cancel();
        wait_done(&handle).await;
        wait_done(&clone).await;

        assert_eq!(callbacks.error_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_synchronous() {
        let result = serve("ws://127.0.0.1:1/swap-market", None, |_| {}, |_| {}).await;
        assert!(matches!(result, Err(BingxError::Connect(_))));
    }

    #[tokio::test]
    async fn test_endpoint_is_redacted() {
        let mut server = MockServer::start().await;
        let url = format!("{}?listenKey=secret-key", server.url);
        let (handle, _callbacks) = open(&url, None).await;
        let _conn = server.accept().await;

        assert_eq!(handle.endpoint(), server.url);
        assert!(!format!("{:?}", handle).contains("secret-key"));

        handle.stop();
        wait_done(&handle).await;
    }
}
