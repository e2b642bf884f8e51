#![deny(unreachable_pub)]
pub mod config;
pub mod grid;
pub mod market;

pub use config::Settings;
pub use grid::{
    average_true_range, default_tiers, Candle, EngineConfig, EnginePhase, EngineState, GridBuilder,
    GridError, GridResult, InstrumentRules, Ladder, OrderGateway, OrderRecord, OrderSide,
    OrderStatus, PriceLevel, ProfitStats, ReconcileEngine, StateStore, StatsReport,
    VolatilitySample, VolatilityTier,
};
pub use market::{Credentials, PaperGateway, RestGateway};
