//! High-volume support/resistance boxes anchored at pivot points.

use crate::application::analysis::indicators::{atr_series, pivot_indices};
use crate::domain::errors::AnalysisError;
use crate::domain::market::analysis::{Zone, ZoneKind, ZoneReport, ZoneStatus};
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub pivot_length: usize,
    /// Pivot-candle volume must exceed this multiple of average volume.
    pub volume_threshold_multiplier: f64,
    /// Box width as a multiple of ATR at the pivot.
    pub box_width_multiplier: f64,
    pub atr_period: usize,
    /// Reported zones per side.
    pub max_reported: usize,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            pivot_length: 10,
            volume_threshold_multiplier: 1.5,
            box_width_multiplier: 0.5,
            atr_period: 14,
            max_reported: 5,
        }
    }
}

impl ZoneConfig {
    pub fn min_candles(&self) -> usize {
        self.pivot_length * 2 + 10
    }
}

pub struct ZoneEngine {
    cfg: ZoneConfig,
}

impl ZoneEngine {
    pub fn new(cfg: ZoneConfig) -> Self {
        Self { cfg }
    }

    /// Per-candle signed volume estimate: body fraction of the range
    /// times volume. Zero when the range is zero.
    pub fn delta_volume(candle: &Candle) -> f64 {
        let range = candle.high_f64() - candle.low_f64();
        if range <= 0.0 {
            return 0.0;
        }
        (candle.close_f64() - candle.open_f64()) / range * candle.volume_f64()
    }

    pub fn analyze(
        &self,
        candles: &[Candle],
        current_price: f64,
    ) -> Result<ZoneReport, AnalysisError> {
        let min = self.cfg.min_candles();
        if candles.len() < min {
            return Err(AnalysisError::insufficient_candles(min, candles.len()));
        }

        let volumes: Vec<f64> = candles.iter().map(|c| c.volume_f64()).collect();
        let avg_volume = volumes.iter().sum::<f64>() / volumes.len() as f64;
        if avg_volume <= 0.0 {
            return Err(AnalysisError::degenerate("zero average volume"));
        }

        let atr = atr_series(candles, self.cfg.atr_period);
        let mut support = Vec::new();
        let mut resistance = Vec::new();

        for &p in &pivot_indices(candles, self.cfg.pivot_length, false) {
            if let Some(zone) =
                self.build_zone(candles, p, ZoneKind::Support, atr[p], avg_volume)
            {
                support.push(zone);
            }
        }
        for &p in &pivot_indices(candles, self.cfg.pivot_length, true) {
            if let Some(zone) =
                self.build_zone(candles, p, ZoneKind::Resistance, atr[p], avg_volume)
            {
                resistance.push(zone);
            }
        }

        let key = |z: &Zone| (z.price - current_price).abs();
        support.retain(|z| z.status == ZoneStatus::Active);
        resistance.retain(|z| z.status == ZoneStatus::Active);
        support.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal));
        resistance
            .sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal));
        support.truncate(self.cfg.max_reported);
        resistance.truncate(self.cfg.max_reported);

        Ok(ZoneReport {
            support,
            resistance,
        })
    }

    fn build_zone(
        &self,
        candles: &[Candle],
        pivot: usize,
        kind: ZoneKind,
        atr: f64,
        avg_volume: f64,
    ) -> Option<Zone> {
        let pivot_volume = candles[pivot].volume_f64();
        let volume_ratio = pivot_volume / avg_volume;
        if volume_ratio < self.cfg.volume_threshold_multiplier {
            return None;
        }

        let price = match kind {
            ZoneKind::Support => candles[pivot].low_f64(),
            ZoneKind::Resistance => candles[pivot].high_f64(),
        };
        let width = atr * self.cfg.box_width_multiplier;
        if width <= 0.0 {
            return None;
        }
        let top = price + width / 2.0;
        let bottom = price - width / 2.0;

        // Break/retest tracking starts once the pivot is confirmed.
        let mut status = ZoneStatus::Active;
        for candle in candles.iter().skip(pivot + self.cfg.pivot_length + 1) {
            match status {
                ZoneStatus::Active => {
                    let broken = match kind {
                        // Support breaks when a close clears the box downward.
                        ZoneKind::Support => candle.close_f64() < bottom,
                        ZoneKind::Resistance => candle.close_f64() > top,
                    };
                    if broken {
                        status = ZoneStatus::Broken;
                    }
                }
                ZoneStatus::Broken => {
                    // Retest: price range re-enters the broken box.
                    let reentered = candle.low_f64() <= top && candle.high_f64() >= bottom;
                    if reentered {
                        status = ZoneStatus::BrokenRetested;
                    }
                }
                ZoneStatus::BrokenRetested => break,
            }
        }

        Some(Zone {
            kind,
            price,
            top,
            bottom,
            volume_ratio,
            delta_volume: Self::delta_volume(&candles[pivot]),
            bar_index: pivot,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64, ts: i64) -> Candle {
        Candle {
            open: Decimal::from_f64_retain(open).unwrap(),
            high: Decimal::from_f64_retain(high).unwrap(),
            low: Decimal::from_f64_retain(low).unwrap(),
            close: Decimal::from_f64_retain(close).unwrap(),
            volume: Decimal::from_f64_retain(volume).unwrap(),
            timestamp: ts,
        }
    }

    fn engine() -> ZoneEngine {
        ZoneEngine::new(ZoneConfig::default())
    }

    /// 40 quiet candles with one high-volume pivot low at index 15.
    fn support_series() -> Vec<Candle> {
        let mut candles = Vec::new();
        for i in 0..40i64 {
            let jitter = (i % 5) as f64 * 0.05;
            candles.push(candle(
                100.0 + jitter,
                100.6 + jitter,
                99.4 + jitter,
                100.1 + jitter,
                1000.0,
                i,
            ));
        }
        // Pivot low with a volume spike.
        candles[15] = candle(100.0, 100.3, 96.0, 100.2, 5000.0, 15);
        candles
    }

    #[test]
    fn test_rejects_short_series() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| candle(100.0, 101.0, 99.0, 100.0, 1000.0, i))
            .collect();
        let err = engine().analyze(&candles, 100.0).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_delta_volume_sign_and_degenerate_range() {
        let bullish = candle(100.0, 102.0, 98.0, 101.5, 1000.0, 0);
        assert!(ZoneEngine::delta_volume(&bullish) > 0.0);
        let bearish = candle(101.5, 102.0, 98.0, 100.0, 1000.0, 0);
        assert!(ZoneEngine::delta_volume(&bearish) < 0.0);
        let flat = candle(100.0, 100.0, 100.0, 100.0, 1000.0, 0);
        assert_eq!(ZoneEngine::delta_volume(&flat), 0.0);
    }

    #[test]
    fn test_high_volume_pivot_creates_support_zone() {
        let candles = support_series();
        let report = engine().analyze(&candles, 100.0).unwrap();
        assert_eq!(report.support.len(), 1);
        let zone = &report.support[0];
        assert_eq!(zone.kind, ZoneKind::Support);
        assert_eq!(zone.bar_index, 15);
        assert_eq!(zone.price, 96.0);
        assert!(zone.volume_ratio > 1.5);
        assert!(zone.top > zone.bottom);
        assert_eq!(zone.status, ZoneStatus::Active);
    }

    #[test]
    fn test_low_volume_pivot_is_ignored() {
        let mut candles = support_series();
        // Same shape, ordinary volume.
        candles[15] = candle(100.0, 100.3, 96.0, 100.2, 1000.0, 15);
        let report = engine().analyze(&candles, 100.0).unwrap();
        assert!(report.support.is_empty());
    }

    #[test]
    fn test_broken_zone_not_reported() {
        let mut candles = support_series();
        // Close far below the zone box after confirmation.
        let n = candles.len() as i64;
        candles.push(candle(99.0, 99.2, 90.0, 90.5, 1000.0, n));
        let report = engine().analyze(&candles, 90.5).unwrap();
        assert!(report.support.is_empty(), "broken zones are not active");
    }

    #[test]
    fn test_idempotent() {
        let candles = support_series();
        let a = engine().analyze(&candles, 100.0).unwrap();
        let b = engine().analyze(&candles, 100.0).unwrap();
        assert_eq!(a, b);
    }
}
