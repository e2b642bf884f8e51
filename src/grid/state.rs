//! Durable engine state with JSON persistence
//!
//! Every save is a complete snapshot, written to a temp file and renamed
//! into place so a crash mid-write never leaves a truncated state file.
//! There are no partial or merge semantics: the latest snapshot wins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::errors::GridResult;
use super::stats::ProfitStats;
use super::types::OrderRecord;

/// Persisted snapshot of the reconciliation engine
///
/// Overwritten on every state-affecting transition (order placement, fill,
/// rebalance); loaded once at startup to avoid cold-start order
/// duplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub profit_stats: ProfitStats,
    /// Last full rebalance, ISO-8601
    pub last_rebalance_time: DateTime<Utc>,
    /// Orders believed open on the exchange
    pub active_orders: Vec<OrderRecord>,
    /// Ladder prices in ascending order
    pub current_grid_prices: Vec<f64>,
    pub investment: f64,
    /// Mid price at ladder creation, used for the resume drift check
    pub last_known_price: f64,
}

impl EngineState {
    pub fn new(investment: f64) -> Self {
        Self {
            profit_stats: ProfitStats::default(),
            last_rebalance_time: Utc::now(),
            active_orders: Vec::new(),
            current_grid_prices: Vec::new(),
            investment,
            last_known_price: 0.0,
        }
    }

    /// Whether the snapshot carries a ladder worth resuming
    pub fn has_resumable_ladder(&self) -> bool {
        self.current_grid_prices.len() >= 2 && self.last_known_price > 0.0
    }

    /// Relative price drift since the ladder was created
    pub fn drift(&self, current_price: f64) -> f64 {
        if self.last_known_price <= 0.0 {
            return f64::INFINITY;
        }
        (current_price - self.last_known_price).abs() / self.last_known_price
    }
}

/// File-backed store for [`EngineState`]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot.
    ///
    /// `Ok(None)` when no state file exists (first run); an error when the
    /// file exists but cannot be read or parsed — the caller degrades to a
    /// cold start rather than treating that as fatal.
    pub fn load(&self) -> GridResult<Option<EngineState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let state: EngineState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    /// Save a snapshot atomically (write to temp, then rename)
    pub fn save(&self, state: &EngineState) -> GridResult<()> {
        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;
        debug!("state saved to {:?}", self.path);
        Ok(())
    }
}
