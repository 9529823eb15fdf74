//! Account endpoints and listen-key management
//!
//! The listen key returned here is what the account stream embeds in its URL.

use crate::bingx::client::BingxClient;
use crate::bingx::request::ApiRequest;
use crate::bingx::types::{Balance, ListenKeyResponse, Position};
use crate::error::{BingxError, Result};
use serde::Deserialize;

const USER_DATA_STREAM: &str = "/openApi/user/auth/userDataStream";

#[derive(Deserialize)]
struct BalanceData {
    balance: Balance,
}

impl BingxClient {
    /// GET /openApi/swap/v2/user/balance (signed)
    pub async fn get_balance(&self) -> Result<Balance> {
        let request = ApiRequest::get("/openApi/swap/v2/user/balance").signed();
        let data: BalanceData = self.send_required(request).await?;
        Ok(data.balance)
    }

    /// GET /openApi/swap/v2/user/positions (signed)
    ///
    /// All open positions, or those of `symbol` when given.
    pub async fn get_open_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let request = ApiRequest::get("/openApi/swap/v2/user/positions")
            .param_opt("symbol", symbol)
            .signed();
        Ok(self.send(request).await?.unwrap_or_default())
    }

    /// Creates a listen key for the account stream
    ///
    /// Needs the API key header but no signature.
    pub async fn create_listen_key(&self) -> Result<String> {
        if !self.has_credentials() {
            return Err(BingxError::InvalidRequest(
                "API key not configured".to_string(),
            ));
        }

        let data = self.call_api(ApiRequest::post(USER_DATA_STREAM)).await?;
        let response: ListenKeyResponse = serde_json::from_slice(&data)?;
        tracing::info!("Account listen key created");
        Ok(response.listen_key)
    }

    /// Extends a listen key's validity (the exchange expires idle keys)
    pub async fn extend_listen_key(&self, listen_key: &str) -> Result<()> {
        self.call_api(ApiRequest::put(USER_DATA_STREAM).param("listenKey", listen_key))
            .await?;
        Ok(())
    }

    pub async fn close_listen_key(&self, listen_key: &str) -> Result<()> {
        self.call_api(ApiRequest::delete(USER_DATA_STREAM).param("listenKey", listen_key))
            .await?;
        Ok(())
    }
}
