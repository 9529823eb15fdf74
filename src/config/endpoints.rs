//! Endpoint configuration
//!
//! ## Environment Variables
//!
//! - `BINGX_BASE_URL`: REST base URL (default: https://open-api.bingx.com)
//! - `BINGX_WS_URL`: market stream URL (default: wss://open-api-swap.bingx.com/swap-market)
//!
//! The account stream shares the market URL and carries the listen key as a
//! query parameter.

use url::form_urlencoded;

const DEFAULT_REST_BASE_URL: &str = "https://open-api.bingx.com";
const DEFAULT_WS_URL: &str = "wss://open-api-swap.bingx.com/swap-market";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest_base_url: String,
    pub market_ws_url: String,
}

impl Endpoints {
    pub fn new(rest_base_url: impl Into<String>, market_ws_url: impl Into<String>) -> Self {
        Self {
            rest_base_url: rest_base_url.into(),
            market_ws_url: market_ws_url.into(),
        }
    }

    pub fn from_env() -> Self {
        let rest_base_url =
            std::env::var("BINGX_BASE_URL").unwrap_or_else(|_| DEFAULT_REST_BASE_URL.to_string());
        let market_ws_url =
            std::env::var("BINGX_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        Self::new(
            rest_base_url.trim_end_matches('/'),
            market_ws_url.trim_end_matches('/'),
        )
    }

    /// Account stream URL with the listen key embedded, form-encoded
    pub fn account_ws_url(&self, listen_key: &str) -> String {
        let separator = if self.market_ws_url.contains('?') { '&' } else { '?' };
        let listen_key: String = form_urlencoded::byte_serialize(listen_key.as_bytes()).collect();
        format!("{}{}listenKey={}", self.market_ws_url, separator, listen_key)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_REST_BASE_URL, DEFAULT_WS_URL)
    }
}

/// Strips the query string so listen keys never reach the logs
pub fn redact_endpoint(endpoint: &str) -> &str {
    endpoint.split('?').next().unwrap_or(endpoint)
}
