// Integration tests for the REST client against a local axum server
//
// The mock checks what the exchange checks (API key header, HMAC signature
// over the canonical query) and replies with canned envelopes.

#[cfg(test)]
mod rest_client_tests {
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use bingx_connector::bingx::codec;
    use bingx_connector::bingx::{ApiError, BingxClient, CreateOrderRequest, Interval, OrderRef, SideType};
    use bingx_connector::config::Credentials;
    use bingx_connector::error::BingxError;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::sync::{Arc, Mutex};

    const API_KEY: &str = "test-api-key";
    const SECRET: &str = "test-secret-key";

    #[derive(Debug, Clone, Default)]
    struct Seen {
        api_key: Option<String>,
        query: Option<String>,
        body: String,
    }

    type Recorder = Arc<Mutex<Vec<Seen>>>;

    fn record(recorder: &Recorder, headers: &HeaderMap, query: Option<String>, body: String) {
        recorder.lock().unwrap().push(Seen {
            api_key: headers
                .get("X-BX-APIKEY")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            query,
            body,
        });
    }

    fn expected_signature(payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn assert_signed(carrier: &str) {
        let (payload, signature) = carrier
            .rsplit_once("&signature=")
            .expect("signature must be the last parameter");
        assert!(payload.contains("timestamp="));
        assert_eq!(signature, expected_signature(payload));
    }

    async fn klines(State(recorder): State<Recorder>, headers: HeaderMap, RawQuery(query): RawQuery) -> impl IntoResponse {
        record(&recorder, &headers, query, String::new());
        r#"{"code":0,"msg":"","data":[
            {"open":"100","close":"101","high":"102","low":"99","volume":"12","time":1700000000000},
            {"open":"101","close":"103","high":"104","low":"100","volume":"8","time":1700000060000}
        ]}"#
    }

    async fn balance(State(recorder): State<Recorder>, headers: HeaderMap, RawQuery(query): RawQuery) -> impl IntoResponse {
        record(&recorder, &headers, query, String::new());
        r#"{"code":0,"msg":"","data":{"balance":{"userId":"1","asset":"USDT","balance":"1000",
            "equity":"1001","unrealizedProfit":"1","realisedProfit":"0","availableMargin":"900",
            "usedMargin":"100","freezedMargin":"0"}}}"#
    }

    async fn order(State(recorder): State<Recorder>, headers: HeaderMap, RawQuery(query): RawQuery) -> impl IntoResponse {
        record(&recorder, &headers, query, String::new());
        r#"{"code":0,"msg":"","data":{"order":{"orderId":1735950529123455488,"symbol":"BTC-USDT","clientOrderID":"cid-7"}}}"#
    }

    async fn rejected() -> impl IntoResponse {
        r#"{"code":101204,"msg":"Insufficient margin","data":{}}"#
    }

    async fn bad_signature() -> impl IntoResponse {
        (StatusCode::BAD_REQUEST, r#"{"code":100001,"msg":"Signature verification failed"}"#)
    }

    async fn throttled() -> impl IntoResponse {
        (StatusCode::TOO_MANY_REQUESTS, "slow down")
    }

    async fn gateway_text() -> impl IntoResponse {
        (StatusCode::BAD_GATEWAY, "upstream unavailable")
    }

    async fn gzipped_contracts() -> impl IntoResponse {
        let body = r#"{"code":0,"msg":"","data":[
            {"symbol":"ETH-USDT","quantityPrecision":2,"pricePrecision":2,"tradeMinQuantity":0.01},
            {"symbol":"BTC-USDT","quantityPrecision":4,"pricePrecision":1,"tradeMinQuantity":0.0001}
        ]}"#;
        codec::encode_gzip(body).unwrap()
    }

    async fn listen_key(State(recorder): State<Recorder>, headers: HeaderMap, RawQuery(query): RawQuery, body: String) -> impl IntoResponse {
        record(&recorder, &headers, query, body);
        r#"{"listenKey":"a8ea75681542e66f1a50a1616dd06ed77dab61baa0c296bca03a9b13ee5f2dd7"}"#
    }

    async fn start(recorder: Recorder) -> String {
        let app = Router::new()
            .route("/openApi/swap/v3/quote/klines", get(klines))
            .route("/openApi/swap/v2/quote/contracts", get(gzipped_contracts))
            .route("/openApi/swap/v2/user/balance", get(balance))
            .route("/openApi/swap/v2/trade/order", post(order).get(bad_signature))
            .route("/openApi/swap/v2/trade/allOpenOrders", axum::routing::delete(rejected))
            .route("/openApi/swap/v2/trade/openOrders", get(throttled))
            .route("/openApi/swap/v2/user/positions", get(gateway_text))
            .route(
                "/openApi/user/auth/userDataStream",
                post(listen_key).put(listen_key).delete(listen_key),
            )
            .with_state(recorder);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn public_client(base_url: &str) -> BingxClient {
        BingxClient::new().unwrap().with_base_url(base_url)
    }

    fn signed_client(base_url: &str) -> BingxClient {
        public_client(base_url).with_credentials(Credentials::new(API_KEY, SECRET))
    }

    #[tokio::test]
    async fn test_public_klines() {
        let recorder = Recorder::default();
        let base_url = start(recorder.clone()).await;

        let klines = public_client(&base_url)
            .get_klines("BTC-USDT", Interval::OneMinute, None, None, Some(2))
            .await
            .unwrap();

        assert_eq!(klines.len(), 2);
        assert_eq!(klines[1].close, "103");
        let seen = recorder.lock().unwrap()[0].clone();
        assert_eq!(seen.api_key, None);
        assert_eq!(seen.query.as_deref(), Some("interval=1m&limit=2&symbol=BTC-USDT"));
    }

    #[tokio::test]
    async fn test_signed_request_carries_key_and_signature() {
        let recorder = Recorder::default();
        let base_url = start(recorder.clone()).await;

        let balance = signed_client(&base_url).get_balance().await.unwrap();

        assert_eq!(balance.asset, "USDT");
        assert_eq!(balance.available_margin, "900");
        let seen = recorder.lock().unwrap()[0].clone();
        assert_eq!(seen.api_key.as_deref(), Some(API_KEY));
        assert_signed(seen.query.as_deref().unwrap());
    }

    #[tokio::test]
    async fn test_create_order_is_signed() {
        let recorder = Recorder::default();
        let base_url = start(recorder.clone()).await;

        let order = CreateOrderRequest::limit("BTC-USDT", SideType::Buy, 0.001, 30000.0).client_order_id("cid-7");
        let created = signed_client(&base_url).create_order(order).await.unwrap();

        assert_eq!(created.order_id, 1735950529123455488);
        assert_eq!(created.client_order_id, "cid-7");
        let seen = recorder.lock().unwrap()[0].clone();
        let query = seen.query.unwrap();
        assert!(query.starts_with("clientOrderID=cid-7&price=30000&quantity=0.001&side=BUY&symbol=BTC-USDT"));
        assert_signed(&query);
    }

    #[tokio::test]
    async fn test_signed_request_without_secret_is_rejected_locally() {
        let recorder = Recorder::default();
        let base_url = start(recorder.clone()).await;

        let err = public_client(&base_url).get_balance().await.unwrap_err();

        assert!(matches!(err, BingxError::InvalidRequest(_)));
        assert!(recorder.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_envelope_error_code_surfaces_as_api_error() {
        let base_url = start(Recorder::default()).await;

        let err = signed_client(&base_url)
            .cancel_all_orders("BTC-USDT", None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BingxError::Api(ApiError {
                code: 101204,
                message: "Insufficient margin".to_string()
            })
        );
        assert!(err.to_string().contains("code=101204"));
    }

    #[tokio::test]
    async fn test_http_error_body_is_parsed() {
        let base_url = start(Recorder::default()).await;

        let err = signed_client(&base_url)
            .get_order("BTC-USDT", &OrderRef::Id(1))
            .await
            .unwrap_err();

        assert!(matches!(err, BingxError::Api(ApiError { code: 100001, .. })));
    }

    #[tokio::test]
    async fn test_http_error_without_json_falls_back_to_status() {
        let base_url = start(Recorder::default()).await;

        let err = signed_client(&base_url).get_open_positions(None).await.unwrap_err();

        assert_eq!(
            err,
            BingxError::Api(ApiError {
                code: 502,
                message: "upstream unavailable".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let base_url = start(Recorder::default()).await;

        let err = signed_client(&base_url).get_open_orders(None).await.unwrap_err();

        assert!(matches!(err, BingxError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_gzip_response_is_decoded() {
        let base_url = start(Recorder::default()).await;

        let contract = public_client(&base_url).get_symbol_data("BTC-USDT").await.unwrap();

        assert_eq!(contract.symbol, "BTC-USDT");
        assert_eq!(contract.quantity_precision, 4);
    }

    #[tokio::test]
    async fn test_listen_key_lifecycle() {
        let recorder = Recorder::default();
        let base_url = start(recorder.clone()).await;
        let client = signed_client(&base_url);

        let key = client.create_listen_key().await.unwrap();
        assert_eq!(key.len(), 64);
        client.extend_listen_key(&key).await.unwrap();
        client.close_listen_key(&key).await.unwrap();

        let seen = recorder.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|s| s.api_key.as_deref() == Some(API_KEY)));
        // listen key calls are not signed
        assert_eq!(seen[0].query, None);
        assert_eq!(seen[1].query.as_deref(), Some(format!("listenKey={}", key).as_str()));
    }

    #[tokio::test]
    async fn test_listen_key_needs_api_key() {
        let base_url = start(Recorder::default()).await;
        let err = public_client(&base_url).create_listen_key().await.unwrap_err();
        assert!(matches!(err, BingxError::InvalidRequest(_)));
    }
}
