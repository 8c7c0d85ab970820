//! EMA/ATR/volume-trend based market regime classification.
//!
//! Independent of the microstructure detectors; callers merge its output
//! with the aggregated signal at their own discretion.

use crate::domain::errors::AnalysisError;
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use ta::Next;
use ta::indicators::ExponentialMovingAverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Bull,
    Bear,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityBand {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegimeReport {
    pub regime: MarketRegime,
    /// One of {0.0, 0.2, 0.5, 0.8, 1.0} from the strict price/EMA ordering.
    pub trend_score: f64,
    pub volatility: VolatilityBand,
    pub volume_trend: VolumeTrend,
    /// 0-100.
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Only consulted when the series is long enough.
    pub ema_long: usize,
    pub atr_period: usize,
    /// ATR/price pct below which volatility is LOW.
    pub volatility_low_pct: f64,
    /// ATR/price pct above which volatility is HIGH.
    pub volatility_high_pct: f64,
    /// Recent/prior average-volume ratio above which volume is INCREASING.
    pub volume_increase_ratio: f64,
    /// Ratio below which volume is DECREASING.
    pub volume_decrease_ratio: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_slow: 50,
            ema_long: 200,
            atr_period: 14,
            volatility_low_pct: 1.0,
            volatility_high_pct: 3.0,
            volume_increase_ratio: 1.2,
            volume_decrease_ratio: 0.8,
        }
    }
}

pub struct MarketRegimeClassifier {
    cfg: RegimeConfig,
}

impl MarketRegimeClassifier {
    pub fn new(cfg: RegimeConfig) -> Self {
        Self { cfg }
    }

    pub fn classify(&self, candles: &[Candle]) -> Result<RegimeReport, AnalysisError> {
        let min_len = self.cfg.ema_slow;
        if candles.len() < min_len {
            return Err(AnalysisError::insufficient_candles(min_len, candles.len()));
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close_f64()).collect();
        let price = *closes.last().expect("length checked above");
        if price <= 0.0 {
            return Err(AnalysisError::degenerate("non-positive last close"));
        }

        let ema_fast = stream_ema(&closes, self.cfg.ema_fast);
        let ema_slow = stream_ema(&closes, self.cfg.ema_slow);
        let ema_long = if candles.len() >= self.cfg.ema_long {
            Some(stream_ema(&closes, self.cfg.ema_long))
        } else {
            None
        };

        let trend_score = trend_score(price, ema_fast, ema_slow, ema_long);

        let atr = average_true_range(candles, self.cfg.atr_period);
        let avg_price = Data::new(closes.clone()).mean().unwrap_or(price);
        let vol_pct = if avg_price > 0.0 {
            atr / avg_price * 100.0
        } else {
            0.0
        };
        let volatility = if vol_pct < self.cfg.volatility_low_pct {
            VolatilityBand::Low
        } else if vol_pct > self.cfg.volatility_high_pct {
            VolatilityBand::High
        } else {
            VolatilityBand::Normal
        };

        let volume_trend = self.volume_trend(candles);

        let regime = if trend_score >= 0.7 {
            MarketRegime::Bull
        } else if trend_score <= 0.3 {
            MarketRegime::Bear
        } else {
            MarketRegime::Sideways
        };

        // Confidence grows with trend-score extremity; a supporting volume
        // trend adds a bonus.
        let mut confidence = 50.0 + (trend_score - 0.5).abs() * 100.0;
        let volume_supports = matches!(
            (regime, volume_trend),
            (MarketRegime::Bull, VolumeTrend::Increasing)
                | (MarketRegime::Bear, VolumeTrend::Decreasing)
        );
        if volume_supports {
            confidence += 10.0;
        }

        Ok(RegimeReport {
            regime,
            trend_score,
            volatility,
            volume_trend,
            confidence: confidence.clamp(0.0, 100.0),
        })
    }

    /// Average volume of the last 10 candles against the prior 20.
    fn volume_trend(&self, candles: &[Candle]) -> VolumeTrend {
        if candles.len() < 30 {
            return VolumeTrend::Stable;
        }
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume_f64()).collect();
        let n = volumes.len();
        let recent: f64 = volumes[n - 10..].iter().sum::<f64>() / 10.0;
        let prior: f64 = volumes[n - 30..n - 10].iter().sum::<f64>() / 20.0;
        if prior <= 0.0 {
            return VolumeTrend::Stable;
        }
        let ratio = recent / prior;
        if ratio > self.cfg.volume_increase_ratio {
            VolumeTrend::Increasing
        } else if ratio < self.cfg.volume_decrease_ratio {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Stable
        }
    }
}

/// Strict price/EMA ordering mapped onto the discrete trend scale.
fn trend_score(price: f64, ema_fast: f64, ema_slow: f64, ema_long: Option<f64>) -> f64 {
    let fully_bull = price > ema_fast && ema_fast > ema_slow;
    let fully_bear = price < ema_fast && ema_fast < ema_slow;

    if fully_bull {
        match ema_long {
            Some(long) if ema_slow > long => 1.0,
            Some(_) => 0.8,
            None => 1.0,
        }
    } else if fully_bear {
        match ema_long {
            Some(long) if ema_slow < long => 0.0,
            Some(_) => 0.2,
            None => 0.0,
        }
    } else if price > ema_slow {
        0.8
    } else if price < ema_slow {
        0.2
    } else {
        0.5
    }
}

/// Final value of a streaming EMA over the whole series.
fn stream_ema(values: &[f64], period: usize) -> f64 {
    let mut ema = ExponentialMovingAverage::new(period)
        .expect("period validated by config defaults (non-zero)");
    let mut last = 0.0;
    for &v in values {
        last = ema.next(v);
    }
    last
}

/// Simple average of true ranges over the trailing `period` bars.
pub fn average_true_range(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < 2 || period == 0 {
        return 0.0;
    }
    let mut tr_sum = 0.0;
    let mut count = 0usize;
    let start = candles.len().saturating_sub(period);
    for i in start.max(1)..candles.len() {
        let high = candles[i].high_f64();
        let low = candles[i].low_f64();
        let prev_close = candles[i - 1].close_f64();
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        tr_sum += tr;
        count += 1;
    }
    if count == 0 { 0.0 } else { tr_sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(price: f64, volume: f64, ts: i64) -> Candle {
        Candle {
            open: Decimal::from_f64_retain(price).unwrap(),
            high: Decimal::from_f64_retain(price + 1.0).unwrap(),
            low: Decimal::from_f64_retain(price - 1.0).unwrap(),
            close: Decimal::from_f64_retain(price).unwrap(),
            volume: Decimal::from_f64_retain(volume).unwrap(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_insufficient_data_is_typed() {
        let classifier = MarketRegimeClassifier::new(RegimeConfig::default());
        let candles: Vec<Candle> = (0..10).map(|i| candle(100.0, 1000.0, i)).collect();
        let err = classifier.classify(&candles).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_strong_uptrend_is_bull() {
        let classifier = MarketRegimeClassifier::new(RegimeConfig::default());
        let candles: Vec<Candle> = (0..80)
            .map(|i| candle(100.0 + i as f64 * 2.0, 1000.0, i))
            .collect();
        let report = classifier.classify(&candles).unwrap();
        assert_eq!(report.regime, MarketRegime::Bull);
        assert!(report.trend_score >= 0.8);
        assert!(report.confidence >= 50.0);
    }

    #[test]
    fn test_strong_downtrend_is_bear() {
        let classifier = MarketRegimeClassifier::new(RegimeConfig::default());
        let candles: Vec<Candle> = (0..80)
            .map(|i| candle(300.0 - i as f64 * 2.0, 1000.0, i))
            .collect();
        let report = classifier.classify(&candles).unwrap();
        assert_eq!(report.regime, MarketRegime::Bear);
        assert!(report.trend_score <= 0.2);
    }

    #[test]
    fn test_flat_series_is_sideways() {
        let classifier = MarketRegimeClassifier::new(RegimeConfig::default());
        // A perfectly flat series leaves price equal to every EMA.
        let candles: Vec<Candle> = (0..80).map(|i| candle(100.0, 1000.0, i)).collect();
        let report = classifier.classify(&candles).unwrap();
        assert_eq!(report.regime, MarketRegime::Sideways);
    }

    #[test]
    fn test_volume_trend_increasing() {
        let classifier = MarketRegimeClassifier::new(RegimeConfig::default());
        let mut candles: Vec<Candle> = (0..70).map(|i| candle(100.0, 1000.0, i)).collect();
        for i in 70..80 {
            candles.push(candle(100.0, 5000.0, i));
        }
        let report = classifier.classify(&candles).unwrap();
        assert_eq!(report.volume_trend, VolumeTrend::Increasing);
    }
}
