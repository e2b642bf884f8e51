//! Paper trading gateway
//!
//! Delegates market data to an inner gateway but simulates order
//! execution locally: a resting buy fills when the ticker trades at or
//! below its limit, a resting sell when the ticker trades at or above.
//! Selected by the dry-run flag so the engine can run unmodified against
//! live prices with no funds at risk.

use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use tokio::sync::Mutex;

use crate::grid::errors::{GridError, GridResult};
use crate::grid::gateway::OrderGateway;
use crate::grid::types::{Candle, InstrumentRules, OrderRecord, OrderSide, OrderStatus};

#[derive(Default)]
struct PaperBook {
    next_oid: u64,
    orders: HashMap<u64, OrderRecord>,
}

impl PaperBook {
    /// Fill every active order the price has crossed
    fn mark_to_market(&mut self, price: f64) {
        for order in self.orders.values_mut() {
            if !order.status.is_active() {
                continue;
            }
            let crossed = match order.side {
                OrderSide::Buy => price <= order.price,
                OrderSide::Sell => price >= order.price,
            };
            if crossed {
                info!(
                    "paper fill: {} {:.8} @ {:.8} (id {})",
                    order.side.as_str(),
                    order.quantity,
                    order.price,
                    order.order_id
                );
                order.status = OrderStatus::Filled;
            }
        }
    }
}

/// Simulated order execution over real market data
pub struct PaperGateway<M: OrderGateway> {
    market: M,
    book: Mutex<PaperBook>,
}

impl<M: OrderGateway> PaperGateway<M> {
    pub fn new(market: M) -> Self {
        Self {
            market,
            book: Mutex::new(PaperBook::default()),
        }
    }

    async fn sync_book(&self) -> GridResult<()> {
        let price = self.market.ticker_price().await?;
        self.book.lock().await.mark_to_market(price);
        Ok(())
    }
}

#[async_trait]
impl<M: OrderGateway> OrderGateway for PaperGateway<M> {
    fn symbol(&self) -> &str {
        self.market.symbol()
    }

    async fn ticker_price(&self) -> GridResult<f64> {
        self.market.ticker_price().await
    }

    async fn instrument_rules(&self) -> GridResult<InstrumentRules> {
        self.market.instrument_rules().await
    }

    async fn fetch_candles(&self, limit: usize) -> GridResult<Vec<Candle>> {
        self.market.fetch_candles(limit).await
    }

    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> GridResult<OrderRecord> {
        let mut book = self.book.lock().await;
        book.next_oid += 1;
        let record = OrderRecord::new(book.next_oid, self.market.symbol(), side, price, quantity);
        book.orders.insert(record.order_id, record.clone());
        Ok(record)
    }

    async fn cancel_order(&self, order_id: u64) -> GridResult<()> {
        let mut book = self.book.lock().await;
        let order = book
            .orders
            .get_mut(&order_id)
            .ok_or(GridError::OrderNotFound(order_id))?;
        if order.status.is_active() {
            order.status = OrderStatus::Cancelled;
        }
        Ok(())
    }

    async fn cancel_all_orders(&self) -> GridResult<u32> {
        let mut book = self.book.lock().await;
        let mut count = 0;
        for order in book.orders.values_mut() {
            if order.status.is_active() {
                order.status = OrderStatus::Cancelled;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_open_orders(&self) -> GridResult<Vec<OrderRecord>> {
        self.sync_book().await?;
        let book = self.book.lock().await;
        Ok(book
            .orders
            .values()
            .filter(|o| o.status.is_active())
            .cloned()
            .collect())
    }

    async fn order_status(&self, order_id: u64) -> GridResult<OrderStatus> {
        self.sync_book().await?;
        let book = self.book.lock().await;
        book.orders
            .get(&order_id)
            .map(|o| o.status)
            .ok_or(GridError::OrderNotFound(order_id))
    }
}
