//! Grid trading engine
//!
//! Derives a ladder of resting limit orders from recent volatility and
//! configured price bounds, then perpetually reconciles exchange fills
//! against it, re-centering the ladder on a wall-clock interval.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (PriceLevel, Ladder, OrderRecord, etc.)
//! - [`errors`] - Error taxonomy
//! - [`volatility`] - ATR estimation from OHLC candles
//! - [`builder`] - Volatility-tiered ladder construction
//! - [`gateway`] - Exchange abstraction (mockable for testing)
//! - [`stats`] - Trade/profit accounting and entry-price sourcing
//! - [`state`] - Durable state snapshots with atomic JSON persistence
//! - [`engine`] - The reconciliation state machine and its run loop
//!
//! # Example
//!
//! ```rust,ignore
//! use gridbot::grid::{EngineConfig, GridBuilder, ReconcileEngine, StateStore};
//!
//! let builder = GridBuilder::with_default_tiers(1500.0, 3500.0)?;
//! let store = StateStore::new("grid_state_ETHUSDT.json");
//! let mut engine = ReconcileEngine::new(EngineConfig::default(), builder, gateway, store);
//! engine.run().await?;
//! ```
//!
//! # Testing
//!
//! [`gateway::mock::MockGateway`] drives the engine without an exchange
//! connection; fills and cancellations are scripted by the test.

pub mod builder;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod state;
pub mod stats;
pub mod types;
pub mod volatility;

// Re-export commonly used types
pub use builder::{default_tiers, GridBuilder, VolatilityTier, DEFAULT_FALLBACK_LEVELS};
pub use engine::{EngineConfig, EnginePhase, ReconcileEngine};
pub use errors::{GridError, GridResult};
pub use gateway::OrderGateway;
pub use state::{EngineState, StateStore};
pub use stats::{AverageEntry, EntryPriceSource, FillPrice, ProfitStats, StatsReport};
pub use types::{
    Candle, InstrumentRules, Ladder, OrderRecord, OrderSide, OrderStatus, PriceLevel, EPSILON,
};
pub use volatility::{average_true_range, VolatilitySample, DEFAULT_ATR_WINDOW};
