//! Startup configuration
//!
//! Loaded once from a file plus `GRID_`-prefixed environment overrides
//! (e.g. `GRID_API__KEY=...`); never hot-reloaded. Validation failures
//! are startup-fatal — the engine treats everything after `run()` as
//! recoverable, so this is the one place allowed to refuse to start.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::grid::builder::{default_tiers, GridBuilder, VolatilityTier, DEFAULT_FALLBACK_LEVELS};
use crate::grid::engine::EngineConfig;
use crate::grid::errors::{GridError, GridResult};
use crate::grid::volatility::DEFAULT_ATR_WINDOW;

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Exchange API endpoint and credentials
    #[serde(default)]
    pub api: ApiConfig,
    /// Instrument, bounds, and capital
    pub trading: TradingConfig,
    /// Reconciliation knobs
    #[serde(default)]
    pub engine: EngineSection,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// State persistence
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// REST endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key; required unless dry_run is set.
    /// Prefer the GRID_API__KEY environment variable over the file.
    #[serde(default)]
    pub key: String,
    /// API secret; required unless dry_run is set
    #[serde(default)]
    pub secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key: String::new(),
            secret: String::new(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TradingConfig {
    /// Instrument symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Total quote-currency investment
    pub investment: f64,
    /// Lower grid price bound
    pub lower_bound: f64,
    /// Upper grid price bound
    pub upper_bound: f64,
    /// Historical lookback for volatility, in days of hourly candles
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Hours between full rebalances
    #[serde(default = "default_rebalance_hours")]
    pub rebalance_interval_hours: u32,
    /// Per-leg fee rate
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Simulate execution instead of trading live
    #[serde(default)]
    pub dry_run: bool,
    /// Ignore persisted state on startup
    #[serde(default)]
    pub ignore_saved_state: bool,
}

fn default_lookback_days() -> u32 {
    30
}

fn default_rebalance_hours() -> u32 {
    24
}

fn default_fee_rate() -> f64 {
    0.001
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_build_retry_secs")]
    pub build_retry_secs: u64,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Relative offset of compensating orders from their fill price
    #[serde(default = "default_compensation_offset")]
    pub compensation_offset: f64,
    /// Maximum relative drift for resuming a persisted ladder
    #[serde(default = "default_max_resume_drift")]
    pub max_resume_drift: f64,
    #[serde(default = "default_atr_window")]
    pub atr_window: usize,
    /// Volatility tier table, ascending by max_ratio
    #[serde(default = "default_tiers")]
    pub tiers: Vec<VolatilityTier>,
    /// Level count when no tier matches
    #[serde(default = "default_fallback_levels")]
    pub fallback_levels: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
            build_retry_secs: default_build_retry_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            compensation_offset: default_compensation_offset(),
            max_resume_drift: default_max_resume_drift(),
            atr_window: default_atr_window(),
            tiers: default_tiers(),
            fallback_levels: default_fallback_levels(),
        }
    }
}

fn default_poll_secs() -> u64 {
    5
}

fn default_build_retry_secs() -> u64 {
    10
}

fn default_error_backoff_secs() -> u64 {
    5
}

fn default_compensation_offset() -> f64 {
    0.01
}

fn default_max_resume_drift() -> f64 {
    0.05
}

fn default_atr_window() -> usize {
    DEFAULT_ATR_WINDOW
}

fn default_fallback_levels() -> u32 {
    DEFAULT_FALLBACK_LEVELS
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct StateConfig {
    /// State file path; defaults to `grid_state_{symbol}.json` in the
    /// working directory. Must stay stable across restarts for the
    /// resume path to find its snapshot.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a configuration file plus environment overrides
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment variables override the file,
            // e.g. GRID_API__SECRET=..., GRID_TRADING__DRY_RUN=true
            .add_source(config::Environment::with_prefix("GRID").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Reject configurations the engine cannot safely start with
    pub fn validate(&self) -> GridResult<()> {
        let t = &self.trading;
        if t.symbol.is_empty() {
            return Err(GridError::InvalidConfig("trading.symbol is required".into()));
        }
        if t.investment <= 0.0 {
            return Err(GridError::InvalidConfig("trading.investment must be positive".into()));
        }
        if t.lower_bound <= 0.0 || t.lower_bound >= t.upper_bound {
            return Err(GridError::InvalidConfig(format!(
                "invalid price bounds [{}, {}]",
                t.lower_bound, t.upper_bound
            )));
        }
        if !(0.0..1.0).contains(&t.fee_rate) {
            return Err(GridError::InvalidConfig("trading.fee_rate must be in [0, 1)".into()));
        }
        if self.engine.atr_window == 0 {
            return Err(GridError::InvalidConfig("engine.atr_window must be positive".into()));
        }
        if self.engine.compensation_offset <= 0.0 {
            return Err(GridError::InvalidConfig(
                "engine.compensation_offset must be positive".into(),
            ));
        }
        if !t.dry_run && (self.api.key.is_empty() || self.api.secret.is_empty()) {
            return Err(GridError::InvalidConfig(
                "api.key and api.secret are required for live trading".into(),
            ));
        }
        // Tier table problems surface here rather than mid-run
        self.grid_builder()?;
        Ok(())
    }

    /// Builder configured from the trading bounds and tier table
    pub fn grid_builder(&self) -> GridResult<GridBuilder> {
        GridBuilder::new(
            self.trading.lower_bound,
            self.trading.upper_bound,
            self.engine.tiers.clone(),
            self.engine.fallback_levels,
        )
    }

    /// Engine knobs derived from the settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            investment: self.trading.investment,
            atr_window: self.engine.atr_window,
            candle_lookback: self.trading.lookback_days as usize * 24,
            compensation_offset: self.engine.compensation_offset,
            max_resume_drift: self.engine.max_resume_drift,
            rebalance_interval: Duration::from_secs(
                self.trading.rebalance_interval_hours as u64 * 3600,
            ),
            poll_interval: Duration::from_secs(self.engine.poll_interval_secs),
            build_retry_delay: Duration::from_secs(self.engine.build_retry_secs),
            error_backoff: Duration::from_secs(self.engine.error_backoff_secs),
            fee_rate: self.trading.fee_rate,
            discard_state: self.trading.ignore_saved_state,
        }
    }

    /// Resolved state-file path
    pub fn state_file(&self) -> PathBuf {
        self.state
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("grid_state_{}.json", self.trading.symbol)))
    }
}
