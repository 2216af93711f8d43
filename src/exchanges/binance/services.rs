//! Request builders for a representative set of WebSocket API methods.
//!
//! Builders only collect parameters and pick a method name and auth mode.
use super::types::{
    AccountStatus, Empty, ListenKey, OrderResponse, OrderSide, OrderType, ServerTime,
    TickerPrice, TimeInForce,
};
use crate::core::traits::WsApiService;
use crate::core::types::{AuthMode, Request};

/// `ping`: connectivity check
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

impl WsApiService for Ping {
    type Response = Empty;

    fn into_request(self) -> Request {
        Request::new("ping", AuthMode::None)
    }
}

/// `time`: server clock, useful for `time_offset_ms`
#[derive(Debug, Clone, Copy, Default)]
pub struct Time;

impl WsApiService for Time {
    type Response = ServerTime;

    fn into_request(self) -> Request {
        Request::new("time", AuthMode::None)
    }
}

/// `ticker.price` for one symbol
#[derive(Debug, Clone)]
pub struct TickerPriceService {
    symbol: String,
}

impl TickerPriceService {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

impl WsApiService for TickerPriceService {
    type Response = TickerPrice;

    fn into_request(self) -> Request {
        Request::new("ticker.price", AuthMode::None).param("symbol", self.symbol)
    }
}

/// `ticker.price` for several symbols at once
#[derive(Debug, Clone, Default)]
pub struct TickerPricesService {
    symbols: Vec<String>,
}

impl TickerPricesService {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }
}

impl WsApiService for TickerPricesService {
    type Response = Vec<TickerPrice>;

    fn into_request(self) -> Request {
        let request = Request::new("ticker.price", AuthMode::None);
        if self.symbols.is_empty() {
            request
        } else {
            request.param("symbols", self.symbols)
        }
    }
}

/// `account.status` (signed)
#[derive(Debug, Clone, Default)]
pub struct AccountStatusService {
    omit_zero_balances: Option<bool>,
    recv_window: Option<u64>,
}

impl AccountStatusService {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn omit_zero_balances(mut self, omit: bool) -> Self {
        self.omit_zero_balances = Some(omit);
        self
    }

    #[must_use]
    pub const fn recv_window(mut self, millis: u64) -> Self {
        self.recv_window = Some(millis);
        self
    }
}

impl WsApiService for AccountStatusService {
    type Response = AccountStatus;

    fn into_request(self) -> Request {
        Request::new("account.status", AuthMode::Signed)
            .param_opt("omitZeroBalances", self.omit_zero_balances)
            .param_opt("recvWindow", self.recv_window)
    }
}

/// `order.place` (signed). Prices and quantities are decimal strings.
#[derive(Debug, Clone)]
pub struct PlaceOrderService {
    symbol: String,
    side: OrderSide,
    order_type: OrderType,
    time_in_force: Option<TimeInForce>,
    quantity: Option<String>,
    quote_order_qty: Option<String>,
    price: Option<String>,
    stop_price: Option<String>,
    new_client_order_id: Option<String>,
    recv_window: Option<u64>,
}

impl PlaceOrderService {
    pub fn new(symbol: impl Into<String>, side: OrderSide, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            time_in_force: None,
            quantity: None,
            quote_order_qty: None,
            price: None,
            stop_price: None,
            new_client_order_id: None,
            recv_window: None,
        }
    }

    /// Limit order with GTC time in force
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self::new(symbol, side, OrderType::Limit)
            .time_in_force(TimeInForce::Gtc)
            .quantity(quantity)
            .price(price)
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: impl Into<String>) -> Self {
        Self::new(symbol, side, OrderType::Market).quantity(quantity)
    }

    #[must_use]
    pub const fn time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }

    #[must_use]
    pub fn quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    #[must_use]
    pub fn quote_order_qty(mut self, quote: impl Into<String>) -> Self {
        self.quote_order_qty = Some(quote.into());
        self
    }

    #[must_use]
    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    #[must_use]
    pub fn stop_price(mut self, stop_price: impl Into<String>) -> Self {
        self.stop_price = Some(stop_price.into());
        self
    }

    #[must_use]
    pub fn client_order_id(mut self, id: impl Into<String>) -> Self {
        self.new_client_order_id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn recv_window(mut self, millis: u64) -> Self {
        self.recv_window = Some(millis);
        self
    }

    /// Validate through `order.test` without placing the order
    pub fn test(self) -> TestOrderService {
        TestOrderService(self)
    }

    fn build(self, method: &str) -> Request {
        Request::new(method, AuthMode::Signed)
            .param("symbol", self.symbol)
            .param("side", self.side.to_string())
            .param("type", self.order_type.to_string())
            .param_opt("timeInForce", self.time_in_force.map(|t| t.to_string()))
            .param_opt("quantity", self.quantity)
            .param_opt("quoteOrderQty", self.quote_order_qty)
            .param_opt("price", self.price)
            .param_opt("stopPrice", self.stop_price)
            .param_opt("newClientOrderId", self.new_client_order_id)
            .param_opt("recvWindow", self.recv_window)
    }
}

impl WsApiService for PlaceOrderService {
    type Response = OrderResponse;

    fn into_request(self) -> Request {
        self.build("order.place")
    }
}

/// `order.test` (signed)
#[derive(Debug, Clone)]
pub struct TestOrderService(PlaceOrderService);

impl WsApiService for TestOrderService {
    type Response = Empty;

    fn into_request(self) -> Request {
        self.0.build("order.test")
    }
}

/// `userDataStream.start` (API key only)
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataStreamStart;

impl WsApiService for UserDataStreamStart {
    type Response = ListenKey;

    fn into_request(self) -> Request {
        Request::new("userDataStream.start", AuthMode::ApiKey)
    }
}
