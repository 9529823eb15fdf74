//! Public market-data endpoints

use crate::bingx::client::BingxClient;
use crate::bingx::request::ApiRequest;
use crate::bingx::types::{Interval, Kline, SymbolData};
use crate::error::{BingxError, Result};

impl BingxClient {
    /// Get candlestick data
    ///
    /// Calls GET /openApi/swap/v3/quote/klines
    ///
    /// # Arguments
    /// * `symbol` - Contract symbol (e.g., "BTC-USDT")
    /// * `interval` - Candle width
    /// * `start_time` / `end_time` - Optional bounds in milliseconds
    /// * `limit` - Number of candles (exchange default 500, max 1440)
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let request = ApiRequest::get("/openApi/swap/v3/quote/klines")
            .param("symbol", symbol)
            .param("interval", interval)
            .param_opt("startTime", start_time)
            .param_opt("endTime", end_time)
            .param_opt("limit", limit);

        Ok(self.send(request).await?.unwrap_or_default())
    }

    /// Get contract specification for one symbol
    ///
    /// Calls GET /openApi/swap/v2/quote/contracts
    pub async fn get_symbol_data(&self, symbol: &str) -> Result<SymbolData> {
        let request = ApiRequest::get("/openApi/swap/v2/quote/contracts").param("symbol", symbol);
        let contracts: Vec<SymbolData> = self.send(request).await?.unwrap_or_default();

        contracts
            .into_iter()
            .find(|c| c.symbol == symbol)
            .ok_or_else(|| BingxError::InvalidRequest(format!("Unknown symbol: {}", symbol)))
    }
}
