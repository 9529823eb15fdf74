// Library exports for bingx-connector

pub mod error;

// BingX API integration modules
pub mod bingx; // REST client, wire types, codec
pub mod config; // Credentials and endpoints

#[cfg(feature = "websocket")]
pub mod stream; // WebSocket sessions and subscriptions

pub use bingx::BingxClient;
pub use error::{BingxError, Result};

#[cfg(feature = "websocket")]
pub use stream::BingxWebSocketClient;
