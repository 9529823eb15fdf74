//! BingX API Client
//!
//! REST signing/dispatch, endpoint methods, wire types, and the gzip codec
//! shared with the streaming layer.

pub mod account;
pub mod client;
pub mod codec;
pub mod market;
pub mod request;
pub mod trade;
pub mod types;

// Re-export commonly used types
pub use client::BingxClient;
pub use request::ApiRequest;
pub use trade::{CreateOrderRequest, OrderRef};
pub use types::{
    ApiError, Balance, Interval, Kline, Order, OrderStatus, OrderType, Position,
    PositionSideType, SideType, SymbolData,
};
