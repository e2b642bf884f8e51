//! Volatility estimation from OHLC candles
//!
//! True Range per candle is `max(high-low, |high-prevClose|, |low-prevClose|)`;
//! the estimator returns the simple moving average of True Range over the
//! trailing window. Pure function of the input series.

use super::errors::{GridError, GridResult};
use super::types::Candle;

/// Default ATR window (hourly candles)
pub const DEFAULT_ATR_WINDOW: usize = 24;

/// A point-in-time volatility measurement
///
/// Ephemeral; tied to the candle series it was computed from and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilitySample {
    /// Average True Range over `window` candles
    pub atr: f64,
    /// Number of true-range observations averaged
    pub window: usize,
}

impl VolatilitySample {
    /// Volatility relative to a reference price (`atr / price`)
    pub fn ratio(&self, price: f64) -> f64 {
        self.atr / price
    }
}

/// Compute the Average True Range over the trailing `window` candles.
///
/// Requires at least `window + 1` candles (the first candle only seeds the
/// previous close) with strictly increasing timestamps. A flat series
/// yields an ATR of zero; rejecting or tolerating that is the ladder
/// builder's decision, not the estimator's.
pub fn average_true_range(candles: &[Candle], window: usize) -> GridResult<VolatilitySample> {
    if window == 0 {
        return Err(GridError::InvalidConfig("ATR window must be positive".into()));
    }
    if candles.len() < window + 1 {
        return Err(GridError::InsufficientData {
            required: window + 1,
            actual: candles.len(),
        });
    }
    for pair in candles.windows(2) {
        if pair[1].timestamp_ms <= pair[0].timestamp_ms {
            return Err(GridError::InvalidCandles(format!(
                "timestamps not strictly increasing: {} then {}",
                pair[0].timestamp_ms, pair[1].timestamp_ms
            )));
        }
    }

    let tail = &candles[candles.len() - (window + 1)..];
    let sum: f64 = tail
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .sum();

    Ok(VolatilitySample {
        atr: sum / window as f64,
        window,
    })
}

fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let hl = candle.high - candle.low;
    let hc = (candle.high - prev_close).abs();
    let lc = (candle.low - prev_close).abs();
    hl.max(hc).max(lc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp_ms: i * 3_600_000,
            open,
            high,
            low,
            close,
        }
    }

    fn trending_series(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(i, base, base + 2.0, base - 1.0, base + 1.0)
            })
            .collect()
    }

    #[test]
    fn test_atr_positive_and_deterministic() {
        let candles = trending_series(30);
        let a = average_true_range(&candles, 24).unwrap();
        let b = average_true_range(&candles, 24).unwrap();
        assert!(a.atr > 0.0);
        assert_eq!(a, b);
        assert_eq!(a.window, 24);
    }

    #[test]
    fn test_atr_known_value() {
        // Constant range of 3.0 (high - low) dominates every candle:
        // close[i-1] = base+1, high[i] = base+3, low[i] = base,
        // so TR = max(3, 2, 1) = 3 for every candle.
        let candles: Vec<Candle> = (0..5)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(i, base, base + 3.0, base, base + 1.0)
            })
            .collect();
        let sample = average_true_range(&candles, 4).unwrap();
        assert!((sample.atr - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_gap_dominates() {
        // A gap from prev close makes |high - prevClose| the true range.
        let candles = vec![
            candle(0, 100.0, 101.0, 99.0, 100.0),
            candle(1, 110.0, 111.0, 109.0, 110.0),
        ];
        let sample = average_true_range(&candles, 1).unwrap();
        // TR = max(2, |111-100|, |109-100|) = 11
        assert!((sample.atr - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = trending_series(24);
        let err = average_true_range(&candles, 24).unwrap_err();
        assert!(matches!(
            err,
            GridError::InsufficientData { required: 25, actual: 24 }
        ));
    }

    #[test]
    fn test_flat_series_yields_zero() {
        let candles: Vec<Candle> = (0..25)
            .map(|i| candle(i, 100.0, 100.0, 100.0, 100.0))
            .collect();
        let sample = average_true_range(&candles, 24).unwrap();
        assert_eq!(sample.atr, 0.0);
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let mut candles = trending_series(26);
        candles.swap(3, 4);
        assert!(matches!(
            average_true_range(&candles, 24),
            Err(GridError::InvalidCandles(_))
        ));
    }
}
