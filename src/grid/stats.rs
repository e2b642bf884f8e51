//! Trade and profit accounting
//!
//! A pure accumulator keyed off FILLED order events. Realized profit is
//! recorded on SELL fills only; BUY fills feed the entry-price source.

use serde::{Deserialize, Serialize};

use super::types::EPSILON;

/// Cumulative trade and profit counters
///
/// Monotonically growing for the process lifetime; reset only by deleting
/// persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitStats {
    pub total_profit: f64,
    pub trade_count: u64,
    pub buy_count: u64,
    pub sell_count: u64,
    /// Realized profit per SELL fill, in fill order
    pub realizations: Vec<f64>,
}

impl ProfitStats {
    pub fn record_buy(&mut self) {
        self.trade_count += 1;
        self.buy_count += 1;
    }

    pub fn record_sell(&mut self, profit: f64) {
        self.trade_count += 1;
        self.sell_count += 1;
        self.total_profit += profit;
        self.realizations.push(profit);
    }

    /// Point-in-time report
    pub fn report(&self, investment: f64) -> StatsReport {
        let average = if self.realizations.is_empty() {
            0.0
        } else {
            self.total_profit / self.realizations.len() as f64
        };
        let roi = if investment > 0.0 {
            self.total_profit / investment * 100.0
        } else {
            0.0
        };
        StatsReport {
            total_profit: self.total_profit,
            trade_count: self.trade_count,
            buy_count: self.buy_count,
            sell_count: self.sell_count,
            average_profit_per_realization: average,
            return_on_investment: roi,
        }
    }
}

/// Snapshot of the accumulated statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub total_profit: f64,
    pub trade_count: u64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub average_profit_per_realization: f64,
    /// `total_profit / investment * 100`
    pub return_on_investment: f64,
}

/// Source of the entry price used when realizing profit on a SELL fill.
///
/// Entry attribution is ambiguous when inventory predates the bot or
/// spans restarts, so the sourcing strategy is pluggable rather than
/// baked in.
pub trait EntryPriceSource: Send {
    /// Observe a BUY fill
    fn record_buy(&mut self, price: f64, quantity: f64);

    /// Entry price to realize a SELL fill against. Consumes tracked
    /// inventory when the source maintains any.
    fn entry_price(&mut self, sell_price: f64, quantity: f64) -> f64;
}

/// Running average entry price over tracked BUY inventory.
///
/// A SELL with no tracked inventory falls back to the fill price itself,
/// which realizes zero profit — the documented simplification, surfaced
/// rather than hidden.
#[derive(Debug, Clone, Default)]
pub struct AverageEntry {
    position: f64,
    avg_price: f64,
}

impl EntryPriceSource for AverageEntry {
    fn record_buy(&mut self, price: f64, quantity: f64) {
        let total = self.avg_price * self.position + price * quantity;
        self.position += quantity;
        if self.position > EPSILON {
            self.avg_price = total / self.position;
        }
    }

    fn entry_price(&mut self, sell_price: f64, quantity: f64) -> f64 {
        if self.position <= EPSILON {
            return sell_price;
        }
        let entry = self.avg_price;
        self.position = (self.position - quantity).max(0.0);
        if self.position <= EPSILON {
            self.avg_price = 0.0;
        }
        entry
    }
}

/// Always realizes against the fill price (zero recorded profit).
///
/// Reproduces the original fallback-only accounting for comparison runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillPrice;

impl EntryPriceSource for FillPrice {
    fn record_buy(&mut self, _price: f64, _quantity: f64) {}

    fn entry_price(&mut self, sell_price: f64, _quantity: f64) -> f64 {
        sell_price
    }
}

/// Realized profit for a SELL fill, net of fees on both legs
pub fn realized_profit(entry_price: f64, sell_price: f64, quantity: f64, fee_rate: f64) -> f64 {
    let gross = (sell_price - entry_price) * quantity;
    let fees = fee_rate * (entry_price + sell_price) * quantity;
    gross - fees
}
