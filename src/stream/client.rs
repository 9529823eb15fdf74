//! Streaming client
//!
//! Entry point for the streaming layer: resolves endpoints, opens dedicated
//! sessions (callback or channel style) and hands out shared market feeds.

use crate::bingx::types::Interval;
use crate::config::Endpoints;
use crate::error::{BingxError, Result};
use crate::stream::account::{order_update_serve, OrderTradeUpdate};
use crate::stream::kline::{kline_serve, WsKlineEvent};
use crate::stream::registry::{SharedFeed, StreamRegistry};
use crate::stream::session::SessionHandle;
use crate::stream::subscription::{self, EventSink, Subscription};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub struct BingxWebSocketClient {
    endpoints: Endpoints,
    registry: StreamRegistry,
}

impl BingxWebSocketClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            registry: StreamRegistry::new(),
        }
    }

    /// Endpoints from `BINGX_BASE_URL` / `BINGX_WS_URL`
    pub fn from_env() -> Self {
        Self::new(Endpoints::from_env())
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Generic market topic on a dedicated session
    pub async fn subscribe_topic<T, F, E>(
        &self,
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
        subscription::subscribe_topic(
            &self.endpoints.market_ws_url,
            symbol,
            stream_kind,
            stream_param,
            on_event,
            on_error,
        )
        .await
    }

    pub async fn kline_serve<F, E>(
        &self,
        symbol: &str,
        interval: Interval,
        on_event: F,
        on_error: E,
    ) -> Result<SessionHandle>
    where
        F: FnMut(WsKlineEvent) + Send + 'static,
        E: FnMut(BingxError) + Send + 'static,
    {
        kline_serve(&self.endpoints.market_ws_url, symbol, interval, on_event, on_error).await
    }

    /// Order updates for the account identified by `listen_key`
    pub async fn order_update_serve<F, E>(&self, listen_key: &str, on_event: F, on_error: E) -> Result<SessionHandle>
    where
        F: FnMut(OrderTradeUpdate) + Send + 'static,
        E: FnMut(BingxError) + Send + 'static,
    {
        if listen_key.is_empty() {
            return Err(BingxError::InvalidRequest("listen key is required".to_string()));
        }
        order_update_serve(&self.endpoints.account_ws_url(listen_key), on_event, on_error).await
    }

    /// Channel form of [`kline_serve`](Self::kline_serve)
    pub async fn kline_stream(&self, symbol: &str, interval: Interval) -> Result<Subscription<WsKlineEvent>> {
        let (sink, events) = EventSink::channel();
        let handle = self
            .kline_serve(symbol, interval, sink.on_data(), sink.on_error())
            .await?;
        Ok(Subscription::new(handle, events))
    }

    /// Channel form of [`order_update_serve`](Self::order_update_serve)
    pub async fn order_update_stream(&self, listen_key: &str) -> Result<Subscription<OrderTradeUpdate>> {
        let (sink, events) = EventSink::channel();
        let handle = self
            .order_update_serve(listen_key, sink.on_data(), sink.on_error())
            .await?;
        Ok(Subscription::new(handle, events))
    }

    /// Channel form of [`subscribe_topic`](Self::subscribe_topic)
    pub async fn topic_stream<T>(
        &self,
        symbol: &str,
        stream_kind: &str,
        stream_param: &str,
    ) -> Result<Subscription<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (sink, events) = EventSink::channel();
        let handle = self
            .subscribe_topic(symbol, stream_kind, stream_param, sink.on_data(), sink.on_error())
            .await?;
        Ok(Subscription::new(handle, events))
    }

    /// The market feed shared by every caller of this client
    pub async fn shared_market_feed(&self) -> Result<Arc<SharedFeed>> {
        self.registry.get_or_create(&self.endpoints.market_ws_url).await
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }
}

impl Default for BingxWebSocketClient {
    fn default() -> Self {
        Self::new(Endpoints::default())
    }
}
