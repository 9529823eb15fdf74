//! Kline stream and bar aggregation
//!
//! The exchange pushes a fresh snapshot of the current candle on every
//! update. [`KlineAggregator`] turns that into a stream of events where a bar
//! is marked `completed` once a snapshot of a newer bucket shows up. Every
//! emission lags the input by one snapshot.

use crate::bingx::types::{de_f64, Interval};
use crate::error::{BingxError, Result};
use crate::stream::session::SessionHandle;
use crate::stream::subscription::{serve_topic, topic_handler, topic_key, ErrorSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const KLINE_STREAM: &str = "kline";

/// Candle snapshot as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct RawKline {
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    #[serde(rename = "o", deserialize_with = "de_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "de_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "de_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "de_f64")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "de_f64")]
    pub volume: f64,
    #[serde(rename = "T", alias = "t")]
    pub time: i64,
}

impl RawKline {
    fn into_event(self, fallback_symbol: &str) -> WsKlineEvent {
        WsKlineEvent {
            symbol: self
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback_symbol.to_string()),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            time: self.time,
            completed: false,
        }
    }
}

/// `data` of a kline envelope: one snapshot or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum KlinePayload {
    Many(Vec<RawKline>),
    One(RawKline),
}

impl KlinePayload {
    pub fn into_vec(self) -> Vec<RawKline> {
        match self {
            KlinePayload::Many(klines) => klines,
            KlinePayload::One(kline) => vec![kline],
        }
    }
}

/// Aggregated candle delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsKlineEvent {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bucket start, ms since epoch
    pub time: i64,
    pub completed: bool,
}

impl WsKlineEvent {
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }
}

/// Holds the last snapshot of one subscription
#[derive(Debug, Default)]
pub struct KlineAggregator {
    last: Option<WsKlineEvent>,
}

impl KlineAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one snapshot and returns the event to emit for it
    ///
    /// The first snapshot is echoed back uncompleted. After that the held
    /// snapshot is emitted, completed iff its bucket differs from the new
    /// one, and the new snapshot takes its place.
    pub fn push(&mut self, snapshot: WsKlineEvent) -> WsKlineEvent {
        match self.last.take() {
            None => {
                self.last = Some(snapshot.clone());
                WsKlineEvent {
                    completed: false,
                    ..snapshot
                }
            }
            Some(mut held) => {
                held.completed = held.time != snapshot.time;
                self.last = Some(snapshot);
                held
            }
        }
    }

    /// Snapshot waiting for its successor
    pub fn pending(&self) -> Option<&WsKlineEvent> {
        self.last.as_ref()
    }
}

/// `{symbol}@kline_{interval}`
pub fn kline_topic(symbol: &str, interval: Interval) -> String {
    topic_key(symbol, KLINE_STREAM, interval.as_str())
}

/// Message handler for one kline topic, owning its aggregator
pub(crate) fn kline_handler<F>(
    symbol: &str,
    interval: Interval,
    mut on_event: F,
    errors: ErrorSink,
) -> impl FnMut(String) + Send + 'static
where
    F: FnMut(WsKlineEvent) + Send + 'static,
{
    let fallback_symbol = symbol.to_string();
    let mut aggregator = KlineAggregator::new();
    topic_handler(
        kline_topic(symbol, interval),
        move |payload: KlinePayload| {
            for raw in payload.into_vec() {
                on_event(aggregator.push(raw.into_event(&fallback_symbol)));
            }
        },
        errors,
    )
}

/// Subscribes to aggregated candles for `symbol` on a dedicated session
pub async fn kline_serve<F, E>(
    endpoint: &str,
    symbol: &str,
    interval: Interval,
    on_event: F,
    on_error: E,
) -> Result<SessionHandle>
where
    F: FnMut(WsKlineEvent) + Send + 'static,
    E: FnMut(BingxError) + Send + 'static,
{
    if symbol.is_empty() {
        return Err(BingxError::InvalidRequest("symbol is required".to_string()));
    }
    let errors = ErrorSink::new(on_error);
    let handler = kline_handler(symbol, interval, on_event, errors.clone());
    serve_topic(endpoint, &kline_topic(symbol, interval), handler, errors).await
}
