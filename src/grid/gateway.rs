//! Exchange gateway abstraction - enables mocking for tests
//!
//! The reconciliation engine is the only caller. Every operation is
//! fallible and treated as a blocking, bounded-latency step; the engine
//! never issues two gateway calls concurrently for the same instrument.
//! Prices and quantities passed to `place_limit_order` must already be
//! tick/step-aligned - the gateway does not round.

use async_trait::async_trait;

use super::errors::GridResult;
use super::types::{Candle, InstrumentRules, OrderRecord, OrderSide, OrderStatus};

/// Order-entry and market-data operations the engine relies on
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Instrument this gateway trades
    fn symbol(&self) -> &str;

    /// Current ticker price; fresh on every call, no caching beyond a
    /// single reconciliation tick
    async fn ticker_price(&self) -> GridResult<f64>;

    /// Exchange trading rules for the instrument
    async fn instrument_rules(&self) -> GridResult<InstrumentRules>;

    /// Most recent hourly candles, oldest first
    async fn fetch_candles(&self, limit: usize) -> GridResult<Vec<Candle>>;

    /// Place a resting limit order
    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> GridResult<OrderRecord>;

    /// Cancel a single order by id
    async fn cancel_order(&self, order_id: u64) -> GridResult<()>;

    /// Cancel every open order for the instrument, returning the count
    async fn cancel_all_orders(&self) -> GridResult<u32>;

    /// Orders currently open on the exchange
    async fn list_open_orders(&self) -> GridResult<Vec<OrderRecord>>;

    /// Lifecycle state of one order
    async fn order_status(&self, order_id: u64) -> GridResult<OrderStatus>;
}

/// Mock gateway for testing the engine without an exchange connection.
pub mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;
    use crate::grid::errors::GridError;

    /// Scripted in-memory gateway
    pub struct MockGateway {
        symbol: String,
        pub placed: Arc<Mutex<Vec<OrderRecord>>>,
        pub cancelled: Arc<Mutex<Vec<u64>>>,
        ticker: Arc<Mutex<f64>>,
        candles: Arc<Mutex<Vec<Candle>>>,
        rules: Arc<Mutex<InstrumentRules>>,
        statuses: Arc<Mutex<HashMap<u64, OrderStatus>>>,
        next_oid: AtomicU64,
        fail_place: Arc<Mutex<bool>>,
        fail_ticker: Arc<Mutex<bool>>,
    }

    impl MockGateway {
        pub fn new(symbol: impl Into<String>, ticker: f64) -> Self {
            Self {
                symbol: symbol.into(),
                placed: Arc::new(Mutex::new(Vec::new())),
                cancelled: Arc::new(Mutex::new(Vec::new())),
                ticker: Arc::new(Mutex::new(ticker)),
                candles: Arc::new(Mutex::new(Vec::new())),
                rules: Arc::new(Mutex::new(InstrumentRules {
                    min_quantity: 0.0001,
                    quantity_step: 0.0001,
                    price_tick: 0.01,
                })),
                statuses: Arc::new(Mutex::new(HashMap::new())),
                next_oid: AtomicU64::new(1),
                fail_place: Arc::new(Mutex::new(false)),
                fail_ticker: Arc::new(Mutex::new(false)),
            }
        }

        pub async fn set_ticker(&self, price: f64) {
            *self.ticker.lock().await = price;
        }

        pub async fn set_candles(&self, candles: Vec<Candle>) {
            *self.candles.lock().await = candles;
        }

        pub async fn set_rules(&self, rules: InstrumentRules) {
            *self.rules.lock().await = rules;
        }

        pub async fn set_fail_place(&self, fail: bool) {
            *self.fail_place.lock().await = fail;
        }

        pub async fn set_fail_ticker(&self, fail: bool) {
            *self.fail_ticker.lock().await = fail;
        }

        /// Script a fill for an order previously placed
        pub async fn mark_filled(&self, order_id: u64) {
            self.statuses.lock().await.insert(order_id, OrderStatus::Filled);
        }

        pub async fn mark_cancelled(&self, order_id: u64) {
            self.statuses.lock().await.insert(order_id, OrderStatus::Cancelled);
        }

        pub async fn placed_orders(&self) -> Vec<OrderRecord> {
            self.placed.lock().await.clone()
        }
    }

    #[async_trait]
    impl OrderGateway for MockGateway {
        fn symbol(&self) -> &str {
            &self.symbol
        }

        async fn ticker_price(&self) -> GridResult<f64> {
            if *self.fail_ticker.lock().await {
                return Err(GridError::Gateway("mock ticker failure".into()));
            }
            Ok(*self.ticker.lock().await)
        }

        async fn instrument_rules(&self) -> GridResult<InstrumentRules> {
            Ok(*self.rules.lock().await)
        }

        async fn fetch_candles(&self, limit: usize) -> GridResult<Vec<Candle>> {
            let candles = self.candles.lock().await;
            let start = candles.len().saturating_sub(limit);
            Ok(candles[start..].to_vec())
        }

        async fn place_limit_order(
            &self,
            side: OrderSide,
            price: f64,
            quantity: f64,
        ) -> GridResult<OrderRecord> {
            if *self.fail_place.lock().await {
                return Err(GridError::Gateway("mock placement failure".into()));
            }
            let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
            let record = OrderRecord::new(oid, self.symbol.clone(), side, price, quantity);
            self.statuses.lock().await.insert(oid, OrderStatus::Open);
            self.placed.lock().await.push(record.clone());
            Ok(record)
        }

        async fn cancel_order(&self, order_id: u64) -> GridResult<()> {
            self.statuses.lock().await.insert(order_id, OrderStatus::Cancelled);
            self.cancelled.lock().await.push(order_id);
            Ok(())
        }

        async fn cancel_all_orders(&self) -> GridResult<u32> {
            let mut statuses = self.statuses.lock().await;
            let mut count = 0;
            for status in statuses.values_mut() {
                if status.is_active() {
                    *status = OrderStatus::Cancelled;
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn list_open_orders(&self) -> GridResult<Vec<OrderRecord>> {
            let statuses = self.statuses.lock().await;
            let placed = self.placed.lock().await;
            Ok(placed
                .iter()
                .filter(|o| statuses.get(&o.order_id).is_some_and(|s| s.is_active()))
                .cloned()
                .collect())
        }

        async fn order_status(&self, order_id: u64) -> GridResult<OrderStatus> {
            self.statuses
                .lock()
                .await
                .get(&order_id)
                .copied()
                .ok_or(GridError::OrderNotFound(order_id))
        }
    }
}
