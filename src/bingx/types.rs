//! BingX API Type Definitions
//!
//! Wire models for the perpetual-swap REST API. Prices and quantities are
//! kept as strings, exactly as the exchange sends them.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Error body returned by BingX on failure
///
/// Also produced for HTTP 200 responses whose envelope carries `code != 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("<APIError> code={code}, msg={message}")]
pub struct ApiError {
    pub code: i64,
    #[serde(rename = "msg", default)]
    pub message: String,
}

/// Standard response envelope `{code, msg, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Splits the envelope into its payload or the exchange error
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.code != 0 {
            return Err(ApiError {
                code: self.code,
                message: self.msg,
            });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SideType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopMarket,
    TakeProfitMarket,
    Stop,
    TakeProfit,
    TriggerLimit,
    TriggerMarket,
    TrailingStopMarket,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSideType {
    Long,
    Short,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Pending,
    PartiallyFilled,
    Filled,
    Canceled,
    Cancelled,
    Failed,
    Expired,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkingType {
    MarkPrice,
    ContractPrice,
    IndexPrice,
    #[serde(other)]
    Other,
}

macro_rules! wire_str {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_str!(SideType { Buy => "BUY", Sell => "SELL" });
wire_str!(PositionSideType { Long => "LONG", Short => "SHORT", Both => "BOTH" });
wire_str!(OrderType {
    Limit => "LIMIT",
    Market => "MARKET",
    StopMarket => "STOP_MARKET",
    TakeProfitMarket => "TAKE_PROFIT_MARKET",
    Stop => "STOP",
    TakeProfit => "TAKE_PROFIT",
    TriggerLimit => "TRIGGER_LIMIT",
    TriggerMarket => "TRIGGER_MARKET",
    TrailingStopMarket => "TRAILING_STOP_MARKET",
    Other => "OTHER",
});

/// Candle interval, used by REST klines and the kline stream topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

wire_str!(Interval {
    OneMinute => "1m",
    ThreeMinutes => "3m",
    FiveMinutes => "5m",
    FifteenMinutes => "15m",
    ThirtyMinutes => "30m",
    OneHour => "1h",
    TwoHours => "2h",
    FourHours => "4h",
    SixHours => "6h",
    EightHours => "8h",
    TwelveHours => "12h",
    OneDay => "1d",
    ThreeDays => "3d",
    OneWeek => "1w",
    OneMonth => "1M",
});

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s {
            "1m" => Interval::OneMinute,
            "3m" => Interval::ThreeMinutes,
            "5m" => Interval::FiveMinutes,
            "15m" => Interval::FifteenMinutes,
            "30m" => Interval::ThirtyMinutes,
            "1h" => Interval::OneHour,
            "2h" => Interval::TwoHours,
            "4h" => Interval::FourHours,
            "6h" => Interval::SixHours,
            "8h" => Interval::EightHours,
            "12h" => Interval::TwelveHours,
            "1d" => Interval::OneDay,
            "3d" => Interval::ThreeDays,
            "1w" => Interval::OneWeek,
            "1M" => Interval::OneMonth,
            other => return Err(format!("unsupported interval: {}", other)),
        };
        Ok(interval)
    }
}

/// Historical candle from /openApi/swap/v3/quote/klines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open: String,
    pub close: String,
    pub high: String,
    pub low: String,
    pub volume: String,
    /// Bucket start, milliseconds since Unix epoch
    pub time: i64,
}

/// Contract specification from /openApi/swap/v2/quote/contracts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolData {
    pub symbol: String,
    #[serde(default)]
    pub quantity_precision: i32,
    #[serde(default)]
    pub price_precision: i32,
    #[serde(default)]
    pub trade_min_quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub user_id: String,
    pub asset: String,
    pub balance: String,
    pub equity: String,
    pub unrealized_profit: String,
    pub realised_profit: String,
    pub available_margin: String,
    pub used_margin: String,
    pub freezed_margin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub position_id: String,
    pub position_side: String,
    pub isolated: bool,
    pub position_amt: String,
    pub available_amt: String,
    pub unrealized_profit: String,
    pub realised_profit: String,
    pub initial_margin: String,
    pub avg_price: String,
    #[serde(deserialize_with = "de_f64_lenient", default)]
    pub liquidation_price: f64,
    pub leverage: i32,
    #[serde(default)]
    pub position_value: String,
    #[serde(default)]
    pub mark_price: String,
    #[serde(default)]
    pub risk_rate: String,
    #[serde(default)]
    pub max_margin_reduction: String,
    #[serde(default)]
    pub pnl_ratio: String,
}

/// Order record returned by query, cancel, and open-orders endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub symbol: String,
    pub order_id: i64,
    pub side: SideType,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub position_side: Option<PositionSideType>,
    pub status: OrderStatus,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stop_price: String,
    #[serde(rename = "origQty", default)]
    pub orig_quantity: String,
    #[serde(rename = "avgPrice", default)]
    pub average_price: String,
    #[serde(rename = "executedQty", default)]
    pub executed_quantity: String,
    #[serde(default)]
    pub cum_quote: String,
    #[serde(default)]
    pub profit: String,
    #[serde(rename = "commission", default)]
    pub fee: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub working_type: Option<WorkingType>,
    #[serde(rename = "clientOrderID", alias = "clientOrderId", default)]
    pub client_order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: i64,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "clientOrderID", alias = "clientOrderId", default)]
    pub client_order_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAllOrdersResponse {
    #[serde(default)]
    pub success: Vec<Order>,
    #[serde(default)]
    pub failed: Vec<Order>,
}

/// Body of POST /openApi/user/auth/userDataStream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyResponse {
    pub listen_key: String,
}

/// Accepts a JSON number or a numeric string
pub(crate) fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(v) => Ok(v),
        NumberOrString::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

/// Like `de_f64`, but an empty string or null reads as zero
pub(crate) fn de_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrString::Number(v)) => Ok(v),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}
