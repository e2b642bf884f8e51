//! Ladder construction from volatility and configured price bounds
//!
//! The builder picks a level count from the volatility tier table, centers
//! the grid on the current price clamped into the configured bounds, and
//! emits `level_count + 1` tick-aligned prices with step-aligned
//! quantities. Levels are equally funded: each receives
//! `investment / (level_count + 1)` of quote currency.

use log::debug;

use super::errors::{GridError, GridResult};
use super::types::{InstrumentRules, Ladder, PriceLevel, EPSILON};
use super::volatility::VolatilitySample;

/// One row of the volatility tier table
///
/// A tier matches when `atr / price < max_ratio`. Tiers are checked in
/// ascending `max_ratio` order; no match falls through to the builder's
/// fallback level count.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolatilityTier {
    pub max_ratio: f64,
    pub levels: u32,
}

/// Default tier table: calm markets get dense grids, volatile markets
/// get sparse ones.
pub fn default_tiers() -> Vec<VolatilityTier> {
    vec![
        VolatilityTier { max_ratio: 0.02, levels: 20 },
        VolatilityTier { max_ratio: 0.05, levels: 15 },
    ]
}

/// Fallback level count when no tier matches
pub const DEFAULT_FALLBACK_LEVELS: u32 = 10;

/// Grid ladder builder
#[derive(Debug, Clone)]
pub struct GridBuilder {
    lower_bound: f64,
    upper_bound: f64,
    tiers: Vec<VolatilityTier>,
    fallback_levels: u32,
}

impl GridBuilder {
    pub fn new(
        lower_bound: f64,
        upper_bound: f64,
        tiers: Vec<VolatilityTier>,
        fallback_levels: u32,
    ) -> GridResult<Self> {
        if lower_bound <= 0.0 || lower_bound >= upper_bound {
            return Err(GridError::InvalidConfig(format!(
                "invalid price bounds [{lower_bound}, {upper_bound}]"
            )));
        }
        if fallback_levels < 2 {
            return Err(GridError::InvalidConfig(
                "fallback level count must be at least 2".into(),
            ));
        }
        for tier in &tiers {
            if tier.levels < 2 || tier.max_ratio <= 0.0 {
                return Err(GridError::InvalidConfig(format!(
                    "invalid volatility tier: ratio {} levels {}",
                    tier.max_ratio, tier.levels
                )));
            }
        }
        if tiers.windows(2).any(|p| p[1].max_ratio <= p[0].max_ratio) {
            return Err(GridError::InvalidConfig(
                "volatility tiers must have ascending max_ratio".into(),
            ));
        }
        Ok(Self {
            lower_bound,
            upper_bound,
            tiers,
            fallback_levels,
        })
    }

    /// Builder with the default tier table
    pub fn with_default_tiers(lower_bound: f64, upper_bound: f64) -> GridResult<Self> {
        Self::new(lower_bound, upper_bound, default_tiers(), DEFAULT_FALLBACK_LEVELS)
    }

    /// Pick the level count for a volatility ratio
    pub fn select_levels(&self, ratio: f64) -> u32 {
        for tier in &self.tiers {
            if ratio < tier.max_ratio {
                return tier.levels;
            }
        }
        self.fallback_levels
    }

    /// Build a ladder for the current market.
    ///
    /// A zero ATR selects the densest tier (ratio 0 matches the first row);
    /// the ladder geometry itself comes from the configured bounds, so the
    /// build still succeeds. When the clamp pushes the grid center to a
    /// bound the resulting ladder is valid but one-sided: the caller must
    /// not assume `floor <= current_price <= ceil`.
    pub fn build(
        &self,
        current_price: f64,
        sample: &VolatilitySample,
        rules: &InstrumentRules,
        investment: f64,
    ) -> GridResult<Ladder> {
        if !sample.atr.is_finite() || sample.atr < 0.0 {
            return Err(GridError::InvalidCandles(format!(
                "unusable ATR value {}",
                sample.atr
            )));
        }
        if current_price <= 0.0 {
            return Err(GridError::InvalidConfig(format!(
                "non-positive current price {current_price}"
            )));
        }

        let ratio = sample.ratio(current_price);
        let level_count = self.select_levels(ratio);
        let n = level_count as f64;

        let center = current_price.clamp(self.lower_bound, self.upper_bound);
        let step = (self.upper_bound - self.lower_bound) / n;
        let half_range = n * step / 2.0;
        let start = (center - half_range).clamp(self.lower_bound, self.upper_bound);
        let end = (center + half_range).clamp(self.lower_bound, self.upper_bound);
        // Recompute from the clamped range so the ladder always spans
        // exactly level_count + 1 prices inside the bounds.
        let step = (end - start) / n;

        debug!(
            "building ladder: ratio={:.4} levels={} span=[{:.8}, {:.8}] step={:.8}",
            ratio, level_count, start, end, step
        );

        let per_level_quote = investment / (level_count + 1) as f64;
        let mut levels = Vec::with_capacity(level_count as usize + 1);
        let mut prev_price = f64::NEG_INFINITY;
        for i in 0..=level_count {
            let price = rules.align_price(start + step * i as f64);
            if price - prev_price <= EPSILON {
                return Err(GridError::DegenerateLadder {
                    tick: rules.price_tick,
                    index: i as usize - 1,
                    index_next: i as usize,
                    price,
                });
            }
            let quantity = rules.align_quantity(per_level_quote / price);
            levels.push(PriceLevel::new(price, quantity));
            prev_price = price;
        }

        Ladder::new(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> InstrumentRules {
        InstrumentRules {
            min_quantity: 0.0001,
            quantity_step: 0.0001,
            price_tick: 0.01,
        }
    }

    fn sample(atr: f64) -> VolatilitySample {
        VolatilitySample { atr, window: 24 }
    }

    #[test]
    fn test_tier_selection_edges() {
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();

        assert_eq!(b.select_levels(0.019), 20);
        // Exactly 0.02 is not < 0.02: falls to the next tier
        assert_eq!(b.select_levels(0.02), 15);
        assert_eq!(b.select_levels(0.049), 15);
        // Exactly 0.05 falls through to the fallback
        assert_eq!(b.select_levels(0.05), 10);
        assert_eq!(b.select_levels(0.20), 10);
    }

    #[test]
    fn test_mid_tier_scenario() {
        // ratio = 5 / 250 = 0.02 => 15-level tier => 16 prices
        let b = GridBuilder::with_default_tiers(150.0, 350.0).unwrap();
        let ladder = b.build(250.0, &sample(5.0), &rules(), 1000.0).unwrap();

        assert_eq!(ladder.len(), 16);
        assert!(ladder.floor_price() >= 150.0 - 1e-9);
        assert!(ladder.ceil_price() <= 350.0 + 1e-9);
        for pair in ladder.levels().windows(2) {
            assert!(pair[1].price > pair[0].price);
        }
    }

    #[test]
    fn test_centered_ladder_spans_bounds() {
        // Half-range equals half the configured range, so a centered grid
        // covers the full [lower, upper] span.
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        let ladder = b.build(150.0, &sample(1.0), &rules(), 2100.0).unwrap();

        assert_eq!(ladder.len(), 21); // ratio < 0.02 => 20 levels => 21 prices
        assert!((ladder.floor_price() - 100.0).abs() < 0.011);
        assert!((ladder.ceil_price() - 200.0).abs() < 0.011);
    }

    #[test]
    fn test_clamped_center_is_one_sided() {
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        // Price far above the band: center clamps to the upper bound
        let ladder = b.build(500.0, &sample(1.0), &rules(), 1000.0).unwrap();

        assert!(ladder.ceil_price() <= 200.0 + 1e-9);
        // The whole ladder sits below the market
        assert!(ladder.ceil_price() < 500.0);
    }

    #[test]
    fn test_zero_atr_builds_densest_grid() {
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        let ladder = b.build(150.0, &sample(0.0), &rules(), 1000.0).unwrap();
        assert_eq!(ladder.len(), 21);
    }

    #[test]
    fn test_non_finite_atr_rejected() {
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        assert!(b.build(150.0, &sample(f64::NAN), &rules(), 1000.0).is_err());
    }

    #[test]
    fn test_coarse_tick_degenerates() {
        let coarse = InstrumentRules {
            min_quantity: 0.0001,
            quantity_step: 0.0001,
            price_tick: 50.0,
        };
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        let err = b.build(150.0, &sample(1.0), &coarse, 1000.0).unwrap_err();
        assert!(matches!(err, GridError::DegenerateLadder { .. }));
    }

    #[test]
    fn test_quantities_step_aligned_and_funded_equally() {
        let b = GridBuilder::with_default_tiers(100.0, 200.0).unwrap();
        let r = rules();
        let investment = 2100.0;
        let ladder = b.build(150.0, &sample(1.0), &r, investment).unwrap();

        let per_level = investment / ladder.len() as f64;
        for level in ladder.levels() {
            assert_eq!(level.quantity, r.align_quantity(level.quantity));
            // Quantity approximates per-level quote value, modulo step flooring
            let value = level.quantity * level.price;
            assert!((value - per_level).abs() < per_level * 0.01 + level.price * r.quantity_step);
        }
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(GridBuilder::with_default_tiers(200.0, 100.0).is_err());
        assert!(GridBuilder::with_default_tiers(0.0, 100.0).is_err());
        assert!(GridBuilder::new(100.0, 200.0, default_tiers(), 1).is_err());

        let unsorted = vec![
            VolatilityTier { max_ratio: 0.05, levels: 15 },
            VolatilityTier { max_ratio: 0.02, levels: 20 },
        ];
        assert!(GridBuilder::new(100.0, 200.0, unsorted, 10).is_err());
    }
}
