//! REST order gateway
//!
//! Thin adapter over a Binance-style REST API: public endpoints for
//! market data, HMAC-SHA256 signed endpoints for order entry. No engine
//! logic lives here; prices and quantities arrive already aligned.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::warn;
use reqwest::Method;
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::grid::errors::{GridError, GridResult};
use crate::grid::gateway::OrderGateway;
use crate::grid::types::{Candle, InstrumentRules, OrderRecord, OrderSide, OrderStatus};

type HmacSha256 = Hmac<Sha256>;

/// API credential pair for signed endpoints
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// REST gateway for one instrument
pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    symbol: String,
    credentials: Option<Credentials>,
}

impl RestGateway {
    /// Public-data-only gateway; signed calls will fail until
    /// credentials are attached.
    pub fn new(base_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            symbol: symbol.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn credentials(&self) -> GridResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| GridError::Gateway("credentials required for order endpoints".into()))
    }

    fn sign(&self, query: &str) -> GridResult<String> {
        let secret = &self.credentials()?.api_secret;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| GridError::Gateway(format!("invalid API secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }

    async fn public_get(&self, path: &str, query: &str) -> GridResult<reqwest::Response> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self.http.get(&url).send().await?;
        check_status(response).await
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> GridResult<reqwest::Response> {
        let api_key = self.credentials()?.api_key.clone();
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow=5000&timestamp={}",
            chrono::Utc::now().timestamp_millis()
        ));
        let signature = self.sign(&query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl OrderGateway for RestGateway {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn ticker_price(&self) -> GridResult<f64> {
        let response = self
            .public_get("/api/v3/ticker/price", &format!("symbol={}", self.symbol))
            .await?;
        let ticker: TickerResponse = response.json().await?;
        parse_f64(&ticker.price, "ticker price")
    }

    async fn instrument_rules(&self) -> GridResult<InstrumentRules> {
        let response = self
            .public_get("/api/v3/exchangeInfo", &format!("symbol={}", self.symbol))
            .await?;
        let info: ExchangeInfoResponse = response.json().await?;
        let symbol = info
            .symbols
            .first()
            .ok_or_else(|| GridError::Gateway(format!("unknown instrument {}", self.symbol)))?;

        let mut min_quantity = None;
        let mut quantity_step = None;
        let mut price_tick = None;
        for filter in &symbol.filters {
            match filter {
                SymbolFilter::LotSize { min_qty, step_size } => {
                    min_quantity = Some(parse_f64(min_qty, "minQty")?);
                    quantity_step = Some(parse_f64(step_size, "stepSize")?);
                }
                SymbolFilter::PriceFilter { tick_size } => {
                    price_tick = Some(parse_f64(tick_size, "tickSize")?);
                }
                SymbolFilter::Other => {}
            }
        }

        match (min_quantity, quantity_step, price_tick) {
            (Some(min_quantity), Some(quantity_step), Some(price_tick)) => Ok(InstrumentRules {
                min_quantity,
                quantity_step,
                price_tick,
            }),
            _ => Err(GridError::Gateway(format!(
                "incomplete trading rules for {}",
                self.symbol
            ))),
        }
    }

    async fn fetch_candles(&self, limit: usize) -> GridResult<Vec<Candle>> {
        let response = self
            .public_get(
                "/api/v3/klines",
                &format!("symbol={}&interval=1h&limit={}", self.symbol, limit),
            )
            .await?;
        let rows: Vec<Vec<serde_json::Value>> = response.json().await?;

        rows.iter()
            .map(|row| {
                if row.len() < 5 {
                    return Err(GridError::Gateway("short kline row".into()));
                }
                Ok(Candle {
                    timestamp_ms: row[0]
                        .as_i64()
                        .ok_or_else(|| GridError::Gateway("non-numeric kline open time".into()))?,
                    open: parse_value_f64(&row[1], "kline open")?,
                    high: parse_value_f64(&row[2], "kline high")?,
                    low: parse_value_f64(&row[3], "kline low")?,
                    close: parse_value_f64(&row[4], "kline close")?,
                })
            })
            .collect()
    }

    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> GridResult<OrderRecord> {
        let params = [
            ("symbol", self.symbol.clone()),
            ("side", side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", quantity.to_string()),
            ("price", price.to_string()),
            ("newClientOrderId", Uuid::new_v4().simple().to_string()),
        ];
        let response = self
            .signed_request(Method::POST, "/api/v3/order", &params)
            .await?;
        let placed: OrderResponse = response.json().await?;

        let mut record = OrderRecord::new(placed.order_id, self.symbol.clone(), side, price, quantity);
        record.status = map_status(&placed.status);
        if record.status == OrderStatus::Failed {
            return Err(GridError::OrderRejected(format!(
                "order {} returned status {}",
                placed.order_id, placed.status
            )));
        }
        Ok(record)
    }

    async fn cancel_order(&self, order_id: u64) -> GridResult<()> {
        let params = [
            ("symbol", self.symbol.clone()),
            ("orderId", order_id.to_string()),
        ];
        self.signed_request(Method::DELETE, "/api/v3/order", &params)
            .await?;
        Ok(())
    }

    async fn cancel_all_orders(&self) -> GridResult<u32> {
        let params = [("symbol", self.symbol.clone())];
        let response = self
            .signed_request(Method::DELETE, "/api/v3/openOrders", &params)
            .await?;
        let cancelled: Vec<OrderResponse> = response.json().await?;
        Ok(cancelled.len() as u32)
    }

    async fn list_open_orders(&self) -> GridResult<Vec<OrderRecord>> {
        let params = [("symbol", self.symbol.clone())];
        let response = self
            .signed_request(Method::GET, "/api/v3/openOrders", &params)
            .await?;
        let open: Vec<OrderResponse> = response.json().await?;

        open.iter()
            .map(|order| {
                Ok(OrderRecord {
                    order_id: order.order_id,
                    symbol: self.symbol.clone(),
                    side: if order.side == "BUY" { OrderSide::Buy } else { OrderSide::Sell },
                    price: parse_f64(&order.price, "order price")?,
                    quantity: parse_f64(&order.orig_qty, "order quantity")?,
                    status: map_status(&order.status),
                })
            })
            .collect()
    }

    async fn order_status(&self, order_id: u64) -> GridResult<OrderStatus> {
        let params = [
            ("symbol", self.symbol.clone()),
            ("orderId", order_id.to_string()),
        ];
        let response = self
            .signed_request(Method::GET, "/api/v3/order", &params)
            .await?;
        let order: OrderResponse = response.json().await?;
        Ok(map_status(&order.status))
    }
}

async fn check_status(response: reqwest::Response) -> GridResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GridError::Gateway(format!("HTTP {status}: {body}")))
}

fn map_status(status: &str) -> OrderStatus {
    match status {
        "NEW" | "PARTIALLY_FILLED" => OrderStatus::Open,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" | "PENDING_CANCEL" | "EXPIRED" => OrderStatus::Cancelled,
        "REJECTED" => OrderStatus::Failed,
        other => {
            warn!("unknown exchange order status {:?}", other);
            OrderStatus::Failed
        }
    }
}

fn parse_f64(value: &str, what: &str) -> GridResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| GridError::Gateway(format!("non-numeric {what}: {value:?}")))
}

fn parse_value_f64(value: &serde_json::Value, what: &str) -> GridResult<f64> {
    match value {
        serde_json::Value::String(s) => parse_f64(s, what),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| GridError::Gateway(format!("non-numeric {what}"))),
        _ => Err(GridError::Gateway(format!("non-numeric {what}"))),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    status: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    orig_qty: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { min_qty: String, step_size: String },
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter { tick_size: String },
    #[serde(other)]
    Other,
}
