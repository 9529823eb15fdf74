//! BingX WebSocket streams
//!
//! Sessions, topic subscriptions, kline aggregation, account order updates,
//! and shared multi-topic feeds.

pub mod account;
pub mod client;
pub mod kline;
pub mod registry;
pub mod session;
pub mod subscription;

pub use account::{decode_account_event, AccountEvent, OrderTradeUpdate, WsOrder};
pub use client::BingxWebSocketClient;
pub use kline::{KlineAggregator, WsKlineEvent};
pub use registry::{SharedFeed, StreamRegistry};
pub use session::{serve, SessionHandle, SessionState};
pub use subscription::{topic_key, StreamEvent, Subscription, SubscriptionRequest};
