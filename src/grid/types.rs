//! Core data types for grid trading

use serde::{Deserialize, Serialize};

use super::errors::{GridError, GridResult};

/// Tolerance for float comparisons on prices and quantities
pub const EPSILON: f64 = 1e-9;

/// Order side for grid levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Convert to exchange side string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Lifecycle state of an order
///
/// Created as `Pending` on submission, `Open` once resting on the book.
/// `Filled`, `Cancelled` and `Failed` are terminal; a terminal order is
/// never resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Open,
    Filled,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Check if the order can still trade
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Open)
    }

    /// Check if the order reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

/// A single tracked exchange order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Exchange-assigned order identifier
    pub order_id: u64,
    /// Instrument symbol (e.g., "BTCUSDT")
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub status: OrderStatus,
}

impl OrderRecord {
    pub fn new(order_id: u64, symbol: impl Into<String>, side: OrderSide, price: f64, quantity: f64) -> Self {
        Self {
            order_id,
            symbol: symbol.into(),
            side,
            price,
            quantity,
            status: OrderStatus::Open,
        }
    }
}

/// One OHLC candle from the market-data feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in epoch milliseconds
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Exchange trading rules for one instrument
///
/// All prices and quantities submitted to the gateway must already be
/// aligned to these increments; the gateway does not round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRules {
    /// Smallest order quantity the exchange accepts
    pub min_quantity: f64,
    /// Quantity increment
    pub quantity_step: f64,
    /// Price increment
    pub price_tick: f64,
}

impl InstrumentRules {
    /// Align a quantity to the exchange step, clamped to the minimum.
    ///
    /// `max(min_quantity, quantity - (quantity mod quantity_step))` — the
    /// result is never below the exchange minimum and always an integer
    /// multiple of the step. Dust quantities are silently raised to the
    /// floor (documented bias, not a bug). Idempotent.
    pub fn align_quantity(&self, quantity: f64) -> f64 {
        let steps = (quantity / self.quantity_step + EPSILON).floor();
        let stepped = steps * self.quantity_step;
        if stepped < self.min_quantity {
            self.min_quantity
        } else {
            stepped
        }
    }

    /// Round a price to the nearest tick
    pub fn align_price(&self, price: f64) -> f64 {
        (price / self.price_tick).round() * self.price_tick
    }
}

/// One price point of the ladder, with its resting quantity
///
/// Immutable once placed; levels are regenerated wholesale on rebalance,
/// never mutated individually.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Ordered ladder of price levels
///
/// Invariant: at least two levels, strictly increasing prices, no
/// duplicates. Enforced at construction; the engine replaces the whole
/// ladder atomically on rebalance.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    levels: Vec<PriceLevel>,
}

impl Ladder {
    /// Build a ladder, validating the ordering invariant
    pub fn new(levels: Vec<PriceLevel>) -> GridResult<Self> {
        if levels.len() < 2 {
            return Err(GridError::InvalidConfig(format!(
                "ladder needs at least 2 levels, got {}",
                levels.len()
            )));
        }
        for pair in levels.windows(2) {
            if pair[1].price - pair[0].price <= EPSILON {
                return Err(GridError::InvalidConfig(format!(
                    "ladder prices not strictly increasing: {} then {}",
                    pair[0].price, pair[1].price
                )));
            }
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Lowest ladder price
    pub fn floor_price(&self) -> f64 {
        self.levels[0].price
    }

    /// Highest ladder price
    pub fn ceil_price(&self) -> f64 {
        self.levels[self.levels.len() - 1].price
    }

    /// Prices only, in ascending order (persisted form)
    pub fn prices(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.price).collect()
    }

    /// Rebuild a ladder from persisted prices, re-deriving per-level
    /// quantities from the invested amount.
    pub fn from_prices(prices: &[f64], investment: f64, rules: &InstrumentRules) -> GridResult<Self> {
        let per_level = investment / prices.len() as f64;
        let levels = prices
            .iter()
            .map(|&price| PriceLevel::new(price, rules.align_quantity(per_level / price)))
            .collect();
        Self::new(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> InstrumentRules {
        InstrumentRules {
            min_quantity: 0.001,
            quantity_step: 0.001,
            price_tick: 0.01,
        }
    }

    #[test]
    fn test_align_quantity_floors_to_step() {
        let r = rules();
        let aligned = r.align_quantity(0.0123456);
        assert!((aligned - 0.012).abs() < EPSILON);
    }

    #[test]
    fn test_align_quantity_idempotent() {
        let r = rules();
        let once = r.align_quantity(0.0123456);
        let twice = r.align_quantity(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_align_quantity_clamps_to_minimum() {
        let r = rules();
        // Dust below the minimum is raised to min_quantity
        assert!((r.align_quantity(0.0001) - 0.001).abs() < EPSILON);
        assert!((r.align_quantity(0.0) - 0.001).abs() < EPSILON);
    }

    #[test]
    fn test_align_price() {
        let r = rules();
        assert!((r.align_price(100.456) - 100.46).abs() < EPSILON);
        assert!((r.align_price(100.454) - 100.45).abs() < EPSILON);
    }

    #[test]
    fn test_ladder_rejects_short_and_unsorted() {
        assert!(Ladder::new(vec![PriceLevel::new(100.0, 1.0)]).is_err());

        let unsorted = vec![
            PriceLevel::new(110.0, 1.0),
            PriceLevel::new(100.0, 1.0),
        ];
        assert!(Ladder::new(unsorted).is_err());

        let duplicate = vec![
            PriceLevel::new(100.0, 1.0),
            PriceLevel::new(100.0, 1.0),
        ];
        assert!(Ladder::new(duplicate).is_err());
    }

    #[test]
    fn test_ladder_from_prices_round_trips() {
        let r = rules();
        let prices = vec![100.0, 110.0, 120.0];
        let ladder = Ladder::from_prices(&prices, 300.0, &r).unwrap();
        assert_eq!(ladder.prices(), prices);
        // 100 USD per level at price 100 => 1.0
        assert!((ladder.levels()[0].quantity - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Open.is_active());
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }
}
