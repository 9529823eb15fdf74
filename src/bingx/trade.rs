//! Order endpoints
//!
//! Only market and limit orders are built here; the exchange-side rules for
//! other order types are out of scope.

use crate::bingx::client::BingxClient;
use crate::bingx::request::ApiRequest;
use crate::bingx::types::{
    CancelAllOrdersResponse, CreatedOrder, Order, OrderType, PositionSideType, SideType,
};
use crate::error::{BingxError, Result};
use serde::Deserialize;

const ORDER_ENDPOINT: &str = "/openApi/swap/v2/trade/order";

#[derive(Deserialize)]
struct OrderData<T> {
    order: T,
}

#[derive(Deserialize)]
struct OrdersData {
    #[serde(default)]
    orders: Vec<Order>,
}

/// Parameters for a new order
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub side: SideType,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub position_side: Option<PositionSideType>,
    pub client_order_id: Option<String>,
    pub reduce_only: bool,
}

impl CreateOrderRequest {
    pub fn market(symbol: impl Into<String>, side: SideType, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            position_side: None,
            client_order_id: None,
            reduce_only: false,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: SideType, quantity: f64, price: f64) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn position_side(mut self, position_side: PositionSideType) -> Self {
        self.position_side = Some(position_side);
        self
    }

    pub fn client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(BingxError::InvalidRequest("symbol is required".to_string()));
        }
        if !(self.quantity > 0.0) {
            return Err(BingxError::InvalidRequest(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.order_type == OrderType::Limit && self.price.map_or(true, |p| p <= 0.0) {
            return Err(BingxError::InvalidRequest(
                "limit orders need a positive price".to_string(),
            ));
        }
        Ok(())
    }

    fn into_api_request(self) -> Result<ApiRequest> {
        self.validate()?;
        let request = ApiRequest::post(ORDER_ENDPOINT)
            .param("symbol", &self.symbol)
            .param("side", self.side)
            .param("type", self.order_type)
            .param("quantity", self.quantity)
            .param_opt("price", self.price)
            .param_opt("positionSide", self.position_side)
            .param_opt("clientOrderID", self.client_order_id)
            .param_opt("reduceOnly", self.reduce_only.then_some("true"))
            .signed();
        Ok(request)
    }
}

/// Identifies an existing order by exchange id or client id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    Id(i64),
    ClientId(String),
}

impl OrderRef {
    fn apply(&self, request: ApiRequest) -> Result<ApiRequest> {
        match self {
            OrderRef::Id(id) => Ok(request.param("orderId", id)),
            OrderRef::ClientId(id) if !id.is_empty() => Ok(request.param("clientOrderID", id)),
            OrderRef::ClientId(_) => Err(BingxError::InvalidRequest(
                "either orderId or clientOrderID must be set".to_string(),
            )),
        }
    }
}

impl BingxClient {
    /// POST /openApi/swap/v2/trade/order (signed)
    pub async fn create_order(&self, order: CreateOrderRequest) -> Result<CreatedOrder> {
        let request = order.into_api_request()?;
        let data: OrderData<CreatedOrder> = self.send_required(request).await?;
        tracing::info!(symbol = %data.order.symbol, order_id = data.order.order_id, "Order created");
        Ok(data.order)
    }

    /// DELETE /openApi/swap/v2/trade/order (signed)
    pub async fn cancel_order(&self, symbol: &str, order: &OrderRef) -> Result<Order> {
        let request = order.apply(ApiRequest::delete(ORDER_ENDPOINT).param("symbol", symbol))?;
        let data: OrderData<Order> = self.send_required(request.signed()).await?;
        Ok(data.order)
    }

    /// DELETE /openApi/swap/v2/trade/allOpenOrders (signed)
    pub async fn cancel_all_orders(
        &self,
        symbol: &str,
        order_type: Option<OrderType>,
    ) -> Result<CancelAllOrdersResponse> {
        let request = ApiRequest::delete("/openApi/swap/v2/trade/allOpenOrders")
            .param("symbol", symbol)
            .param_opt("type", order_type)
            .signed();
        Ok(self.send(request).await?.unwrap_or_default())
    }

    /// GET /openApi/swap/v2/trade/order (signed)
    pub async fn get_order(&self, symbol: &str, order: &OrderRef) -> Result<Order> {
        let request = order.apply(ApiRequest::get(ORDER_ENDPOINT).param("symbol", symbol))?;
        let data: OrderData<Order> = self.send_required(request.signed()).await?;
        Ok(data.order)
    }

    /// GET /openApi/swap/v2/trade/openOrders (signed)
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let request = ApiRequest::get("/openApi/swap/v2/trade/openOrders")
            .param_opt("symbol", symbol)
            .signed();
        let data: Option<OrdersData> = self.send(request).await?;
        Ok(data.map(|d| d.orders).unwrap_or_default())
    }
}
