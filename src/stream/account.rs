//! Account stream
//!
//! The account session URL carries a listen key and sends no subscribe frame.
//! Envelopes are tagged by `e`; only `ORDER_TRADE_UPDATE` is decoded into a
//! typed event.

use crate::bingx::types::{
    de_f64_lenient, OrderStatus, OrderType, PositionSideType, SideType, WorkingType,
};
use crate::error::{BingxError, Result};
use crate::stream::session::{self, SessionHandle};
use crate::stream::subscription::ErrorSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ORDER_TRADE_UPDATE: &str = "ORDER_TRADE_UPDATE";

#[derive(Debug, Deserialize)]
struct EventHeader {
    #[serde(default)]
    e: Option<String>,
}

/// `{"e":"ORDER_TRADE_UPDATE","E":<ms>,"o":{...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTradeUpdate {
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "o")]
    pub order: WsOrder,
}

impl OrderTradeUpdate {
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.event_time)
    }
}

/// Order state carried by an order update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", default)]
    pub client_order_id: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "S")]
    pub side: SideType,
    #[serde(rename = "o")]
    pub order_type: OrderType,
    #[serde(rename = "q", deserialize_with = "de_f64_lenient", default)]
    pub quantity: f64,
    #[serde(rename = "p", deserialize_with = "de_f64_lenient", default)]
    pub price: f64,
    #[serde(rename = "ap", deserialize_with = "de_f64_lenient", default)]
    pub average_price: f64,
    #[serde(rename = "sp", deserialize_with = "de_f64_lenient", default)]
    pub stop_price: f64,
    /// Update reason, e.g. `NEW`, `TRADE`, `CANCELED`
    #[serde(rename = "x", default)]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub status: OrderStatus,
    #[serde(rename = "T", default)]
    pub time: i64,
    #[serde(rename = "ps", default)]
    pub position_side: Option<PositionSideType>,
    #[serde(rename = "z", deserialize_with = "de_f64_lenient", default)]
    pub executed_quantity: f64,
    #[serde(rename = "n", deserialize_with = "de_f64_lenient", default)]
    pub commission: f64,
    #[serde(rename = "N", default)]
    pub commission_asset: Option<String>,
    #[serde(rename = "rp", deserialize_with = "de_f64_lenient", default)]
    pub realised_profit: f64,
    #[serde(rename = "wt", default)]
    pub working_type: Option<WorkingType>,
}

/// Decoded account envelope
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    OrderTradeUpdate(OrderTradeUpdate),
    /// Any other event type; empty when the envelope had no `e`
    Other(String),
}

/// Classifies an account envelope, decoding the payload only for order updates
pub fn decode_account_event(text: &str) -> Result<AccountEvent> {
    let header: EventHeader = serde_json::from_str(text)?;
    match header.e.as_deref() {
        Some(ORDER_TRADE_UPDATE) => Ok(AccountEvent::OrderTradeUpdate(serde_json::from_str(text)?)),
        Some(other) => Ok(AccountEvent::Other(other.to_string())),
        None => Ok(AccountEvent::Other(String::new())),
    }
}

pub(crate) fn order_update_handler<F>(mut on_event: F, errors: ErrorSink) -> impl FnMut(String) + Send + 'static
where
    F: FnMut(OrderTradeUpdate) + Send + 'static,
{
    move |text: String| match decode_account_event(&text) {
        Ok(AccountEvent::OrderTradeUpdate(update)) => on_event(update),
        Ok(AccountEvent::Other(kind)) => debug!(event = %kind, "Ignoring account event"),
        Err(e) => errors.report(e),
    }
}

/// Streams order updates from an account endpoint (`...?listenKey=<key>`)
pub async fn order_update_serve<F, E>(endpoint: &str, on_event: F, on_error: E) -> Result<SessionHandle>
where
    F: FnMut(OrderTradeUpdate) + Send + 'static,
    E: FnMut(BingxError) + Send + 'static,
{
    let errors = ErrorSink::new(on_error);
    let handler = order_update_handler(on_event, errors.clone());
    session::serve(endpoint, None, handler, move |e| errors.report(e)).await
}
