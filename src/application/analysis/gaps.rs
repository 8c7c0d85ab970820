//! Fair value gap detection from 3-candle imbalances.

use crate::application::analysis::indicators::atr_series;
use crate::domain::errors::AnalysisError;
use crate::domain::market::analysis::{Bias, Gap, GapReport, GapStatus};
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};

pub const MIN_CANDLES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Minimum gap size as a multiple of ATR at the gap bar.
    /// 0.0 disables the filter.
    pub min_size_atr: f64,
    pub atr_period: usize,
    /// Reported gaps per direction.
    pub max_reported: usize,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_size_atr: 0.0,
            atr_period: 14,
            max_reported: 10,
        }
    }
}

pub struct GapDetector {
    cfg: GapConfig,
}

impl GapDetector {
    pub fn new(cfg: GapConfig) -> Self {
        Self { cfg }
    }

    /// Scan the whole series for unfilled gaps, nearest to `current_price`
    /// first.
    pub fn analyze(
        &self,
        candles: &[Candle],
        current_price: f64,
    ) -> Result<GapReport, AnalysisError> {
        if candles.len() < MIN_CANDLES {
            return Err(AnalysisError::insufficient_candles(
                MIN_CANDLES,
                candles.len(),
            ));
        }

        let atr = atr_series(candles, self.cfg.atr_period);
        let mut bullish = Vec::new();
        let mut bearish = Vec::new();

        for i in 2..candles.len() {
            let first_high = candles[i - 2].high_f64();
            let first_low = candles[i - 2].low_f64();
            let last_high = candles[i].high_f64();
            let last_low = candles[i].low_f64();

            // Bullish imbalance: candle i opened clear above the bar two back.
            if last_low > first_high {
                if let Some(gap) =
                    self.build_gap(candles, i, Bias::Bullish, last_low, first_high, atr[i])
                {
                    bullish.push(gap);
                }
            }
            // Bearish imbalance.
            if first_low > last_high {
                if let Some(gap) =
                    self.build_gap(candles, i, Bias::Bearish, first_low, last_high, atr[i])
                {
                    bearish.push(gap);
                }
            }
        }

        let sort_key = |g: &Gap| (g.midpoint - current_price).abs();
        bullish.retain(|g| g.status == GapStatus::Active);
        bearish.retain(|g| g.status == GapStatus::Active);
        bullish.sort_by(|a, b| {
            sort_key(a)
                .partial_cmp(&sort_key(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        bearish.sort_by(|a, b| {
            sort_key(a)
                .partial_cmp(&sort_key(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        bullish.truncate(self.cfg.max_reported);
        bearish.truncate(self.cfg.max_reported);

        Ok(GapReport { bullish, bearish })
    }

    fn build_gap(
        &self,
        candles: &[Candle],
        index: usize,
        direction: Bias,
        top: f64,
        bottom: f64,
        atr: f64,
    ) -> Option<Gap> {
        let size = top - bottom;
        if size <= 0.0 {
            return None;
        }
        if self.cfg.min_size_atr > 0.0 && size < atr * self.cfg.min_size_atr {
            return None;
        }

        let midpoint = (top + bottom) / 2.0;
        let size_pct = if midpoint > 0.0 {
            size / midpoint * 100.0
        } else {
            0.0
        };

        // Forward scan: the gap is FILLED the first time price re-enters
        // its range. The transition is one-way.
        let mut status = GapStatus::Active;
        for candle in candles.iter().skip(index + 1) {
            let entered = match direction {
                Bias::Bullish => candle.low_f64() < top,
                Bias::Bearish => candle.high_f64() > bottom,
            };
            if entered {
                status = GapStatus::Filled;
                break;
            }
        }

        Some(Gap {
            direction,
            top,
            bottom,
            midpoint,
            size_pct,
            bar_index: index,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(open: f64, high: f64, low: f64, close: f64, ts: i64) -> Candle {
        Candle {
            open: Decimal::from_f64_retain(open).unwrap(),
            high: Decimal::from_f64_retain(high).unwrap(),
            low: Decimal::from_f64_retain(low).unwrap(),
            close: Decimal::from_f64_retain(close).unwrap(),
            volume: Decimal::from_f64_retain(1000.0).unwrap(),
            timestamp: ts,
        }
    }

    fn flat(ts: i64) -> Candle {
        candle(100.0, 100.5, 99.5, 100.0, ts)
    }

    fn detector() -> GapDetector {
        GapDetector::new(GapConfig::default())
    }

    #[test]
    fn test_rejects_short_series() {
        let candles: Vec<Candle> = (0..5).map(flat).collect();
        let err = detector().analyze(&candles, 100.0).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_bullish_gap_recorded_active() {
        // candle[i-2].high = 100, candle[i].low = 102: gap (100, 102).
        let mut candles: Vec<Candle> = (0..8).map(flat).collect();
        candles.push(candle(99.5, 100.0, 99.0, 100.0, 8)); // i-2
        candles.push(candle(100.0, 103.0, 100.0, 103.0, 9)); // impulse
        candles.push(candle(103.0, 104.0, 102.0, 103.5, 10)); // i, low=102
        let report = detector().analyze(&candles, 103.5).unwrap();

        assert_eq!(report.bullish.len(), 1);
        let gap = &report.bullish[0];
        assert_eq!(gap.top, 102.0);
        assert_eq!(gap.bottom, 100.0);
        assert_eq!(gap.status, GapStatus::Active);
        assert_eq!(gap.bar_index, 10);
        assert!((gap.midpoint - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_filled_on_reentry() {
        let mut candles: Vec<Candle> = (0..8).map(flat).collect();
        candles.push(candle(99.5, 100.0, 99.0, 100.0, 8));
        candles.push(candle(100.0, 103.0, 100.0, 103.0, 9));
        candles.push(candle(103.0, 104.0, 102.0, 103.5, 10));
        // Price dips back into the gap range.
        candles.push(candle(103.5, 103.5, 101.0, 102.5, 11));
        let report = detector().analyze(&candles, 102.5).unwrap();
        assert!(report.bullish.is_empty(), "filled gaps are not reported");
    }

    #[test]
    fn test_bearish_gap() {
        let mut candles: Vec<Candle> = (0..8).map(flat).collect();
        candles.push(candle(100.5, 100.5, 99.5, 99.5, 8)); // i-2, low=99.5
        candles.push(candle(99.5, 99.5, 96.0, 96.0, 9));
        candles.push(candle(96.0, 97.0, 95.0, 95.5, 10)); // i, high=97
        let report = detector().analyze(&candles, 95.5).unwrap();

        assert_eq!(report.bearish.len(), 1);
        let gap = &report.bearish[0];
        assert_eq!(gap.top, 99.5);
        assert_eq!(gap.bottom, 97.0);
        assert_eq!(gap.status, GapStatus::Active);
    }

    #[test]
    fn test_atr_filter_skips_small_gaps() {
        let cfg = GapConfig {
            min_size_atr: 5.0,
            ..GapConfig::default()
        };
        let small = GapDetector::new(cfg);
        let mut candles: Vec<Candle> = (0..8).map(flat).collect();
        candles.push(candle(99.5, 100.0, 99.0, 100.0, 8));
        candles.push(candle(100.0, 103.0, 100.0, 103.0, 9));
        candles.push(candle(103.0, 104.0, 102.0, 103.5, 10));
        let report = small.analyze(&candles, 103.5).unwrap();
        assert!(report.bullish.is_empty(), "gap below ATR threshold skipped");
    }

    #[test]
    fn test_sorted_by_distance_and_capped() {
        let cfg = GapConfig {
            max_reported: 1,
            ..GapConfig::default()
        };
        let capped = GapDetector::new(cfg);
        let mut candles: Vec<Candle> = (0..8).map(flat).collect();
        // First gap far below current price.
        candles.push(candle(99.5, 100.0, 99.0, 100.0, 8));
        candles.push(candle(100.0, 103.0, 100.0, 103.0, 9));
        candles.push(candle(103.5, 104.0, 102.5, 103.5, 10));
        // Second gap higher up.
        candles.push(candle(103.5, 104.0, 103.2, 104.0, 11));
        candles.push(candle(104.0, 108.0, 104.0, 108.0, 12));
        candles.push(candle(108.0, 109.0, 107.0, 108.5, 13));
        let report = capped.analyze(&candles, 108.5).unwrap();
        assert_eq!(report.bullish.len(), 1);
        // The nearer gap (104..107) wins the single slot.
        assert!(report.bullish[0].midpoint > 104.0);
    }
}
