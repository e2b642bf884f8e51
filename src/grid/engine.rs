//! Reconciliation engine - the grid state machine
//!
//! One logical actor owns the ladder, the tracked orders, and the profit
//! counters. It loops forever through
//! `Initializing -> BuildingLadder -> PlacingOrders -> Monitoring ->
//! Rebalancing -> (PlacingOrders)`, persisting a full state snapshot on
//! every transition that changes what rests on the exchange. The only
//! suspension points are the poll sleep and retry backoffs; gateway calls
//! are awaited one at a time, so exchange-side order races are avoided by
//! construction.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use super::builder::GridBuilder;
use super::errors::{GridError, GridResult};
use super::gateway::OrderGateway;
use super::state::{EngineState, StateStore};
use super::stats::{realized_profit, AverageEntry, EntryPriceSource, ProfitStats};
use super::types::{InstrumentRules, Ladder, OrderRecord, OrderSide, OrderStatus};
use super::volatility::average_true_range;

/// Reconciliation knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total quote-currency investment spread across the ladder
    pub investment: f64,
    /// ATR window in candles
    pub atr_window: usize,
    /// Candles fetched per ladder build
    pub candle_lookback: usize,
    /// Relative offset of a compensating order from its fill price
    pub compensation_offset: f64,
    /// Maximum relative price drift for resuming a persisted ladder
    pub max_resume_drift: f64,
    /// Wall-clock interval between full rebalances
    pub rebalance_interval: Duration,
    /// Sleep between monitoring iterations
    pub poll_interval: Duration,
    /// Retry delay after a data error during ladder building
    pub build_retry_delay: Duration,
    /// Sleep after an unexpected error before resuming the loop
    pub error_backoff: Duration,
    /// Taker/maker fee rate applied per leg when realizing profit
    pub fee_rate: f64,
    /// Ignore any persisted state on startup
    pub discard_state: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            investment: 1_000.0,
            atr_window: 24,
            candle_lookback: 720,
            compensation_offset: 0.01,
            max_resume_drift: 0.05,
            rebalance_interval: Duration::from_secs(24 * 3600),
            poll_interval: Duration::from_secs(5),
            build_retry_delay: Duration::from_secs(10),
            error_backoff: Duration::from_secs(5),
            fee_rate: 0.001,
            discard_state: false,
        }
    }
}

/// Phases of the reconciliation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Initializing,
    BuildingLadder,
    PlacingOrders,
    Monitoring,
    Rebalancing,
}

/// The grid reconciliation engine
///
/// Single writer of the ladder, the tracked orders, and the profit stats;
/// everything else it touches is a pure function over inputs it provides.
pub struct ReconcileEngine<G: OrderGateway> {
    config: EngineConfig,
    builder: GridBuilder,
    gateway: G,
    store: StateStore,
    phase: EnginePhase,
    ladder: Option<Ladder>,
    /// Orders believed open on the exchange
    orders: Vec<OrderRecord>,
    rules: Option<InstrumentRules>,
    stats: ProfitStats,
    entry_source: Box<dyn EntryPriceSource>,
    last_rebalance: DateTime<Utc>,
    /// Mid price at ladder creation, the drift reference
    last_known_price: f64,
}

impl<G: OrderGateway> ReconcileEngine<G> {
    pub fn new(config: EngineConfig, builder: GridBuilder, gateway: G, store: StateStore) -> Self {
        Self {
            config,
            builder,
            gateway,
            store,
            phase: EnginePhase::Initializing,
            ladder: None,
            orders: Vec::new(),
            rules: None,
            stats: ProfitStats::default(),
            entry_source: Box::new(AverageEntry::default()),
            last_rebalance: Utc::now(),
            last_known_price: 0.0,
        }
    }

    /// Swap the entry-price sourcing strategy
    pub fn with_entry_source(mut self, source: Box<dyn EntryPriceSource>) -> Self {
        self.entry_source = source;
        self
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn stats(&self) -> &ProfitStats {
        &self.stats
    }

    pub fn open_orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    pub fn ladder(&self) -> Option<&Ladder> {
        self.ladder.as_ref()
    }

    /// Drive the state machine forever.
    ///
    /// Any error inside a step is logged, the state is persisted
    /// defensively, and the loop resumes after a fixed backoff; the
    /// process never exits on a recoverable error.
    pub async fn run(&mut self) -> GridResult<()> {
        info!("starting reconciliation engine for {}", self.gateway.symbol());
        loop {
            if let Err(e) = self.step().await {
                error!("engine step failed in {:?}: {}", self.phase, e);
                if let Err(save_err) = self.persist() {
                    warn!("defensive state save failed: {}", save_err);
                }
                tokio::time::sleep(self.config.error_backoff).await;
                self.phase = match self.phase {
                    // Keep retrying startup until the resume decision is made
                    EnginePhase::Initializing => EnginePhase::Initializing,
                    _ if self.ladder.is_some() => EnginePhase::Monitoring,
                    _ => EnginePhase::BuildingLadder,
                };
            }
        }
    }

    /// Execute one state-machine transition
    pub async fn step(&mut self) -> GridResult<()> {
        match self.phase {
            EnginePhase::Initializing => self.initialize().await,
            EnginePhase::BuildingLadder => self.build_ladder().await,
            EnginePhase::PlacingOrders => self.place_orders().await,
            EnginePhase::Monitoring => self.monitor().await,
            EnginePhase::Rebalancing => self.rebalance().await,
        }
    }

    /// Load persisted state and decide between resuming and rebuilding
    async fn initialize(&mut self) -> GridResult<()> {
        if self.config.discard_state {
            info!("ignoring persisted state on request; clearing the book");
            self.phase = EnginePhase::Rebalancing;
            return Ok(());
        }

        let prior = match self.store.load() {
            Ok(found) => found,
            Err(e) => {
                warn!("persisted state unreadable, cold-starting: {}", e);
                None
            }
        };

        let Some(state) = prior else {
            info!("no persisted state, building a fresh ladder");
            self.phase = EnginePhase::BuildingLadder;
            return Ok(());
        };

        self.stats = state.profit_stats.clone();
        self.last_rebalance = state.last_rebalance_time;

        if !state.has_resumable_ladder() {
            info!("persisted state has no resumable ladder");
            self.phase = EnginePhase::Rebalancing;
            return Ok(());
        }

        let current = self.gateway.ticker_price().await?;
        let drift = state.drift(current);
        if drift <= self.config.max_resume_drift {
            let rules = self.gateway.instrument_rules().await?;
            let ladder = match Ladder::from_prices(&state.current_grid_prices, state.investment, &rules) {
                Ok(ladder) => ladder,
                Err(e) => {
                    warn!("persisted ladder unusable ({}), rebuilding", e);
                    self.phase = EnginePhase::Rebalancing;
                    return Ok(());
                }
            };
            info!(
                "resuming persisted ladder ({} levels, drift {:.2}% <= {:.2}%), orders stay on the book",
                ladder.len(),
                drift * 100.0,
                self.config.max_resume_drift * 100.0
            );
            self.rules = Some(rules);
            self.ladder = Some(ladder);
            self.orders = state
                .active_orders
                .into_iter()
                .filter(|o| o.status.is_active())
                .collect();
            self.last_known_price = state.last_known_price;
            self.phase = EnginePhase::Monitoring;
        } else {
            info!(
                "price drift {:.2}% exceeds {:.2}%, discarding persisted ladder",
                drift * 100.0,
                self.config.max_resume_drift * 100.0
            );
            // Stale orders may still rest on the exchange; clear them
            // before rebuilding instead of stacking a second ladder.
            self.phase = EnginePhase::Rebalancing;
        }
        Ok(())
    }

    /// Fetch candles, estimate volatility, and build the next ladder
    async fn build_ladder(&mut self) -> GridResult<()> {
        let candles = self.gateway.fetch_candles(self.config.candle_lookback).await?;

        let sample = match average_true_range(&candles, self.config.atr_window) {
            Ok(sample) => sample,
            Err(e @ (GridError::InsufficientData { .. } | GridError::InvalidCandles(_))) => {
                warn!(
                    "cannot estimate volatility: {}; retrying in {:?}",
                    e, self.config.build_retry_delay
                );
                tokio::time::sleep(self.config.build_retry_delay).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let current = self.gateway.ticker_price().await?;
        let rules = self.gateway.instrument_rules().await?;

        match self.builder.build(current, &sample, &rules, self.config.investment) {
            Ok(ladder) => {
                info!(
                    "built {}-level ladder [{:.8}, {:.8}] at price {:.8} (atr {:.8})",
                    ladder.len(),
                    ladder.floor_price(),
                    ladder.ceil_price(),
                    current,
                    sample.atr
                );
                self.rules = Some(rules);
                self.ladder = Some(ladder);
                self.last_known_price = current;
                self.phase = EnginePhase::PlacingOrders;
                Ok(())
            }
            Err(e @ GridError::DegenerateLadder { .. }) => {
                warn!(
                    "ladder build failed: {}; retrying in {:?}",
                    e, self.config.build_retry_delay
                );
                tokio::time::sleep(self.config.build_retry_delay).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Submit the ladder as resting orders, sides decided against the
    /// current ticker price
    async fn place_orders(&mut self) -> GridResult<()> {
        let ladder = self
            .ladder
            .clone()
            .ok_or_else(|| GridError::InvalidConfig("no ladder to place".into()))?;
        let rules = self.rules()?;
        let current = self.gateway.ticker_price().await?;
        let half_tick = rules.price_tick / 2.0;

        let mut placed = 0usize;
        for level in ladder.levels() {
            let side = if level.price < current - half_tick {
                OrderSide::Buy
            } else if level.price > current + half_tick {
                OrderSide::Sell
            } else {
                debug!("skipping level at market price {:.8}", level.price);
                continue;
            };

            // Individual failures are skipped, never abort the batch
            match self
                .gateway
                .place_limit_order(side, level.price, level.quantity)
                .await
            {
                Ok(record) => {
                    debug!(
                        "placed {} {:.8} @ {:.8} (id {})",
                        side.as_str(),
                        record.quantity,
                        record.price,
                        record.order_id
                    );
                    self.orders.push(record);
                    placed += 1;
                }
                Err(e) => {
                    warn!("failed to place {} at {:.8}: {}", side.as_str(), level.price, e);
                }
            }
        }

        info!("placed {}/{} grid orders", placed, ladder.len());
        self.persist()?;
        self.phase = EnginePhase::Monitoring;
        Ok(())
    }

    /// One monitoring iteration: poll, reconcile fills, check the
    /// rebalance timer
    async fn monitor(&mut self) -> GridResult<()> {
        tokio::time::sleep(self.config.poll_interval).await;

        let open = self.gateway.list_open_orders().await?;
        let open_ids: HashSet<u64> = open.iter().map(|o| o.order_id).collect();

        let mut dirty = false;
        for record in self.orders.clone() {
            if open_ids.contains(&record.order_id) {
                continue;
            }
            match self.gateway.order_status(record.order_id).await? {
                OrderStatus::Filled => {
                    self.handle_fill(&record).await?;
                    dirty = true;
                }
                status @ (OrderStatus::Cancelled | OrderStatus::Failed) => {
                    info!("order {} left the book as {:?}", record.order_id, status);
                    self.forget_order(record.order_id);
                    dirty = true;
                }
                // The listing raced the status query; keep tracking
                OrderStatus::Pending | OrderStatus::Open => {}
            }
        }
        if dirty {
            self.persist()?;
        }

        let elapsed = Utc::now()
            .signed_duration_since(self.last_rebalance)
            .to_std()
            .unwrap_or_default();
        if elapsed >= self.config.rebalance_interval {
            info!("rebalance interval elapsed ({:?})", elapsed);
            self.phase = EnginePhase::Rebalancing;
        }
        Ok(())
    }

    /// Update statistics for a fill and place the compensating order
    async fn handle_fill(&mut self, record: &OrderRecord) -> GridResult<()> {
        info!(
            "fill: {} {:.8} @ {:.8} (id {})",
            record.side.as_str(),
            record.quantity,
            record.price,
            record.order_id
        );

        match record.side {
            OrderSide::Buy => {
                self.entry_source.record_buy(record.price, record.quantity);
                self.stats.record_buy();
            }
            OrderSide::Sell => {
                let entry = self.entry_source.entry_price(record.price, record.quantity);
                let profit =
                    realized_profit(entry, record.price, record.quantity, self.config.fee_rate);
                self.stats.record_sell(profit);
                info!("realized {:.8} against entry {:.8}", profit, entry);
            }
        }
        self.forget_order(record.order_id);

        let rules = self.rules()?;
        let (side, raw_price) = match record.side {
            OrderSide::Buy => (OrderSide::Sell, record.price * (1.0 + self.config.compensation_offset)),
            OrderSide::Sell => (OrderSide::Buy, record.price * (1.0 - self.config.compensation_offset)),
        };
        let price = rules.align_price(raw_price);
        let quantity = rules.align_quantity(record.quantity);

        match self.gateway.place_limit_order(side, price, quantity).await {
            Ok(new_record) => {
                info!(
                    "compensating {} {:.8} @ {:.8} (id {})",
                    side.as_str(),
                    quantity,
                    price,
                    new_record.order_id
                );
                self.orders.push(new_record);
            }
            Err(e) => {
                warn!("failed to place compensating {} at {:.8}: {}", side.as_str(), price, e);
            }
        }

        self.persist()?;
        Ok(())
    }

    /// Cancel everything, reset the timer, and rebuild from scratch
    async fn rebalance(&mut self) -> GridResult<()> {
        info!("rebalancing {}: cancelling open orders", self.gateway.symbol());
        match self.gateway.cancel_all_orders().await {
            Ok(count) => info!("cancelled {} orders", count),
            Err(e) => warn!("cancel-all failed, continuing: {}", e),
        }
        self.orders.clear();
        self.ladder = None;
        self.last_rebalance = Utc::now();
        self.persist()?;
        self.phase = EnginePhase::BuildingLadder;
        Ok(())
    }

    fn forget_order(&mut self, order_id: u64) {
        self.orders.retain(|o| o.order_id != order_id);
    }

    fn rules(&self) -> GridResult<InstrumentRules> {
        self.rules
            .ok_or_else(|| GridError::InvalidConfig("instrument rules not fetched".into()))
    }

    /// Snapshot the full engine state to durable storage
    fn persist(&self) -> GridResult<()> {
        let state = EngineState {
            profit_stats: self.stats.clone(),
            last_rebalance_time: self.last_rebalance,
            active_orders: self.orders.clone(),
            current_grid_prices: self.ladder.as_ref().map(Ladder::prices).unwrap_or_default(),
            investment: self.config.investment,
            last_known_price: self.last_known_price,
        };
        self.store.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::gateway::mock::MockGateway;
    use crate::grid::types::Candle;

    fn test_config() -> EngineConfig {
        EngineConfig {
            investment: 1_600.0,
            atr_window: 24,
            candle_lookback: 48,
            fee_rate: 0.0,
            poll_interval: Duration::from_millis(0),
            build_retry_delay: Duration::from_millis(0),
            error_backoff: Duration::from_millis(0),
            ..EngineConfig::default()
        }
    }

    fn test_builder() -> GridBuilder {
        GridBuilder::with_default_tiers(100.0, 200.0).unwrap()
    }

    fn test_store(name: &str) -> StateStore {
        let path = std::env::temp_dir().join(format!(
            "gridbot_engine_{}_{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        StateStore::new(path)
    }

    fn candles(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| {
                let base = 148.0 + (i % 3) as f64;
                Candle {
                    timestamp_ms: i * 3_600_000,
                    open: base,
                    high: base + 2.0,
                    low: base - 1.0,
                    close: base + 1.0,
                }
            })
            .collect()
    }

    async fn gateway_at(price: f64) -> MockGateway {
        let gw = MockGateway::new("BTCUSDT", price);
        gw.set_candles(candles(48)).await;
        gw
    }

    async fn engine_through_placement(
        name: &str,
    ) -> (ReconcileEngine<MockGateway>, usize) {
        let gw = gateway_at(150.0).await;
        let mut engine =
            ReconcileEngine::new(test_config(), test_builder(), gw, test_store(name));

        engine.step().await.unwrap(); // Initializing -> BuildingLadder
        assert_eq!(engine.phase(), EnginePhase::BuildingLadder);
        engine.step().await.unwrap(); // -> PlacingOrders
        assert_eq!(engine.phase(), EnginePhase::PlacingOrders);
        engine.step().await.unwrap(); // -> Monitoring
        assert_eq!(engine.phase(), EnginePhase::Monitoring);

        let placed = engine.open_orders().len();
        (engine, placed)
    }

    #[tokio::test]
    async fn test_cold_start_places_ladder() {
        let (engine, placed) = engine_through_placement("cold_start").await;

        // ATR 10/3 at price 150 => ratio ~0.022 => the 15-level tier,
        // 16 prices; none coincides with the market, so all are placed.
        let ladder = engine.ladder().unwrap();
        assert_eq!(ladder.len(), 16);
        assert_eq!(placed, 16);

        for order in engine.open_orders() {
            if order.price < 150.0 {
                assert_eq!(order.side, OrderSide::Buy);
            } else {
                assert_eq!(order.side, OrderSide::Sell);
            }
        }
    }

    #[tokio::test]
    async fn test_level_at_market_price_is_skipped() {
        // Calm candles: TR = 1 at 150 => ratio < 0.02 => 20 levels, step
        // 5 over [100, 200], so one price lands exactly on the market.
        let calm: Vec<Candle> = (0..48)
            .map(|i| Candle {
                timestamp_ms: i * 3_600_000,
                open: 150.0,
                high: 150.5,
                low: 149.5,
                close: 150.0,
            })
            .collect();
        let gw = MockGateway::new("BTCUSDT", 150.0);
        gw.set_candles(calm).await;
        let mut engine =
            ReconcileEngine::new(test_config(), test_builder(), gw, test_store("at_market"));

        engine.step().await.unwrap();
        engine.step().await.unwrap();
        engine.step().await.unwrap();

        assert_eq!(engine.ladder().unwrap().len(), 21);
        assert_eq!(engine.open_orders().len(), 20);
        let buys = engine.open_orders().iter().filter(|o| o.side == OrderSide::Buy).count();
        assert_eq!(buys, 10);
    }

    #[tokio::test]
    async fn test_buy_fill_places_compensating_sell() {
        let (mut engine, _) = engine_through_placement("buy_fill").await;

        let buy = engine
            .open_orders()
            .iter()
            .find(|o| o.side == OrderSide::Buy && (o.price - 100.0).abs() < 1e-9)
            .cloned()
            .unwrap();
        engine.gateway.mark_filled(buy.order_id).await;

        engine.step().await.unwrap();

        // Offset 1% from the 100.0 fill => SELL at 101.0
        let compensating = engine
            .gateway
            .placed_orders()
            .await
            .into_iter()
            .find(|o| o.side == OrderSide::Sell && (o.price - 101.0).abs() < 1e-9)
            .unwrap();
        assert!((compensating.quantity - buy.quantity).abs() < 1e-9);
        assert_eq!(engine.stats().buy_count, 1);
        // The filled order is no longer tracked
        assert!(!engine.open_orders().iter().any(|o| o.order_id == buy.order_id));
    }

    #[tokio::test]
    async fn test_sell_fill_realizes_profit_from_entry() {
        let (mut engine, _) = engine_through_placement("sell_fill").await;

        let buy = engine
            .open_orders()
            .iter()
            .find(|o| o.side == OrderSide::Buy && (o.price - 100.0).abs() < 1e-9)
            .cloned()
            .unwrap();
        engine.gateway.mark_filled(buy.order_id).await;
        engine.step().await.unwrap();

        let sell = engine
            .open_orders()
            .iter()
            .find(|o| o.side == OrderSide::Sell && (o.price - 101.0).abs() < 1e-9)
            .cloned()
            .unwrap();
        engine.gateway.mark_filled(sell.order_id).await;
        engine.step().await.unwrap();

        // Entry 100, exit 101, zero fees
        let expected = (101.0 - 100.0) * sell.quantity;
        assert!((engine.stats().total_profit - expected).abs() < 1e-9);
        assert_eq!(engine.stats().sell_count, 1);
        assert_eq!(engine.stats().realizations.len(), 1);
    }

    #[tokio::test]
    async fn test_small_drift_resumes_without_placing() {
        let store = test_store("resume_small_drift");
        let mut state = EngineState::new(1_600.0);
        state.last_known_price = 150.0;
        state.current_grid_prices = (0..=15).map(|i| 100.0 + i as f64 * 6.25).collect();
        state.active_orders.push(OrderRecord::new(7, "BTCUSDT", OrderSide::Buy, 100.0, 0.1));
        store.save(&state).unwrap();

        // 152 vs 150 => 1.3% drift, within the 5% limit
        let gw = gateway_at(152.0).await;
        let mut engine = ReconcileEngine::new(test_config(), test_builder(), gw, store);

        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::Monitoring);
        assert_eq!(engine.open_orders().len(), 1);
        assert!(engine.gateway.placed_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_large_drift_rebuilds() {
        let store = test_store("resume_large_drift");
        let mut state = EngineState::new(1_600.0);
        state.last_known_price = 150.0;
        state.current_grid_prices = (0..=15).map(|i| 100.0 + i as f64 * 6.25).collect();
        store.save(&state).unwrap();

        // 190 vs 150 => 26.7% drift
        let gw = gateway_at(190.0).await;
        let mut engine = ReconcileEngine::new(test_config(), test_builder(), gw, store);

        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::Rebalancing);
        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::BuildingLadder);
    }

    #[tokio::test]
    async fn test_discard_flag_clears_book_and_rebuilds() {
        let store = test_store("discard_flag");
        let mut state = EngineState::new(1_600.0);
        state.last_known_price = 150.0;
        state.current_grid_prices = vec![100.0, 110.0, 120.0];
        store.save(&state).unwrap();

        let gw = gateway_at(150.0).await;
        let config = EngineConfig {
            discard_state: true,
            ..test_config()
        };
        let mut engine = ReconcileEngine::new(config, test_builder(), gw, store);

        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::Rebalancing);
    }

    #[tokio::test]
    async fn test_rebalance_cancels_and_rebuilds() {
        let config = EngineConfig {
            rebalance_interval: Duration::from_millis(0),
            ..test_config()
        };
        let gw = gateway_at(150.0).await;
        let mut engine =
            ReconcileEngine::new(config, test_builder(), gw, test_store("rebalance"));

        engine.step().await.unwrap();
        engine.step().await.unwrap();
        engine.step().await.unwrap();
        let placed = engine.open_orders().len();
        assert!(placed > 0);

        // The interval already elapsed, so monitoring trips the timer
        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::Rebalancing);

        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::BuildingLadder);
        assert!(engine.open_orders().is_empty());
        assert!(engine.gateway.list_open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_candles_stays_in_building() {
        let gw = MockGateway::new("BTCUSDT", 150.0);
        gw.set_candles(candles(10)).await;
        let mut engine =
            ReconcileEngine::new(test_config(), test_builder(), gw, test_store("few_candles"));

        engine.step().await.unwrap();
        engine.step().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::BuildingLadder);
        assert!(engine.ladder().is_none());
    }

    #[tokio::test]
    async fn test_placement_failures_are_skipped() {
        let gw = gateway_at(150.0).await;
        gw.set_fail_place(true).await;
        let mut engine =
            ReconcileEngine::new(test_config(), test_builder(), gw, test_store("place_fail"));

        engine.step().await.unwrap();
        engine.step().await.unwrap();
        engine.step().await.unwrap();

        // Every placement failed, but the batch completed and the engine
        // moved on to monitoring.
        assert_eq!(engine.phase(), EnginePhase::Monitoring);
        assert!(engine.open_orders().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_orders_are_forgotten() {
        let (mut engine, placed) = engine_through_placement("cancelled").await;

        let victim = engine.open_orders()[0].clone();
        engine.gateway.mark_cancelled(victim.order_id).await;

        engine.step().await.unwrap();
        assert_eq!(engine.open_orders().len(), placed - 1);
        assert_eq!(engine.stats().trade_count, 0);
    }
}
