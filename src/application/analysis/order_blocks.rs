//! Institutional order blocks: the last opposite candle before a
//! structure break, tracked at two lookback scales.

use crate::application::analysis::indicators::{atr_series, pivot_indices};
use crate::domain::errors::AnalysisError;
use crate::domain::market::analysis::{
    Bias, Computed, OrderBlock, OrderBlockReport, OrderBlockStatus, Scale,
};
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};

/// How far back to look for the opposite-colored candle once a break fires.
const BACKSCAN_BARS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBlockConfig {
    pub swing_length: usize,
    pub internal_length: usize,
    /// Minimum block height as a multiple of ATR. 0.0 disables the filter.
    pub min_size_atr: f64,
    pub atr_period: usize,
    /// Reported blocks per scale.
    pub max_reported: usize,
}

impl Default for OrderBlockConfig {
    fn default() -> Self {
        Self {
            swing_length: 50,
            internal_length: 5,
            min_size_atr: 0.0,
            atr_period: 14,
            max_reported: 5,
        }
    }
}

impl OrderBlockConfig {
    pub fn min_candles(length: usize) -> usize {
        length * 2 + 10
    }
}

pub struct OrderBlockEngine {
    cfg: OrderBlockConfig,
}

impl OrderBlockEngine {
    pub fn new(cfg: OrderBlockConfig) -> Self {
        Self { cfg }
    }

    /// Run both scales. Errs only when even the internal scale lacks data;
    /// a swing scale that cannot run is reported as not-computed.
    pub fn analyze(
        &self,
        candles: &[Candle],
        current_price: f64,
    ) -> Result<OrderBlockReport, AnalysisError> {
        let internal_min = OrderBlockConfig::min_candles(self.cfg.internal_length);
        if candles.len() < internal_min {
            return Err(AnalysisError::insufficient_candles(
                internal_min,
                candles.len(),
            ));
        }

        let internal = Computed::from_result(self.run_scale(
            candles,
            current_price,
            Scale::Internal,
            self.cfg.internal_length,
        ));
        let swing = Computed::from_result(self.run_scale(
            candles,
            current_price,
            Scale::Swing,
            self.cfg.swing_length,
        ));

        Ok(OrderBlockReport { swing, internal })
    }

    fn run_scale(
        &self,
        candles: &[Candle],
        current_price: f64,
        scale: Scale,
        length: usize,
    ) -> Result<Vec<OrderBlock>, AnalysisError> {
        let min = OrderBlockConfig::min_candles(length);
        if candles.len() < min {
            return Err(AnalysisError::insufficient_candles(min, candles.len()));
        }

        let atr = atr_series(candles, self.cfg.atr_period);
        let pivot_highs = pivot_indices(candles, length, true);
        let pivot_lows = pivot_indices(candles, length, false);

        // Walk the bars replaying swing confirmations as they became
        // knowable: a pivot at p is usable only from bar p + length on.
        let mut next_high = 0usize;
        let mut next_low = 0usize;
        let mut last_high: Option<f64> = None;
        let mut last_low: Option<f64> = None;
        let mut blocks: Vec<(OrderBlock, usize)> = Vec::new();

        for i in length..candles.len() {
            let confirm_at = i.saturating_sub(length);
            while next_high < pivot_highs.len() && pivot_highs[next_high] <= confirm_at {
                last_high = Some(candles[pivot_highs[next_high]].high_f64());
                next_high += 1;
            }
            while next_low < pivot_lows.len() && pivot_lows[next_low] <= confirm_at {
                last_low = Some(candles[pivot_lows[next_low]].low_f64());
                next_low += 1;
            }

            let close = candles[i].close_f64();

            if let Some(level) = last_high {
                if close > level {
                    if let Some(block) =
                        self.block_from_break(candles, i, Bias::Bullish, scale, atr[i])
                    {
                        blocks.push((block, i));
                    }
                    // Consume the level so one break yields one block.
                    last_high = None;
                }
            }
            if let Some(level) = last_low {
                if close < level {
                    if let Some(block) =
                        self.block_from_break(candles, i, Bias::Bearish, scale, atr[i])
                    {
                        blocks.push((block, i));
                    }
                    last_low = None;
                }
            }
        }

        let mut active: Vec<OrderBlock> = blocks
            .into_iter()
            .map(|(b, break_index)| mark_mitigation(b, candles, break_index))
            .filter(|b| b.status == OrderBlockStatus::Active)
            .collect();
        let key = |b: &OrderBlock| (((b.top + b.bottom) / 2.0) - current_price).abs();
        active.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal));
        active.truncate(self.cfg.max_reported);
        Ok(active)
    }

    /// Scan backward from the break bar for the most recent opposite-colored
    /// candle; that candle's range becomes the block.
    fn block_from_break(
        &self,
        candles: &[Candle],
        break_index: usize,
        bias: Bias,
        scale: Scale,
        atr: f64,
    ) -> Option<OrderBlock> {
        let start = break_index.saturating_sub(BACKSCAN_BARS);
        for b in (start..break_index).rev() {
            let opposite = match bias {
                Bias::Bullish => candles[b].is_bearish(),
                Bias::Bearish => candles[b].is_bullish(),
            };
            if !opposite {
                continue;
            }
            let top = candles[b].high_f64();
            let bottom = candles[b].low_f64();
            let height = top - bottom;
            if height <= 0.0 {
                return None;
            }
            if self.cfg.min_size_atr > 0.0 && height < atr * self.cfg.min_size_atr {
                return None;
            }
            return Some(OrderBlock {
                scale,
                bias,
                top,
                bottom,
                bar_index: b,
                status: OrderBlockStatus::Active,
            });
        }
        None
    }
}

/// A block is MITIGATED the first time price trades back through it after
/// the break. Bars between the block candle and the break are part of the
/// block's formation and do not count. One-way transition.
fn mark_mitigation(mut block: OrderBlock, candles: &[Candle], break_index: usize) -> OrderBlock {
    for candle in candles.iter().skip(break_index + 1) {
        let mitigated = match block.bias {
            // A bullish block sits below price; a wick under its bottom
            // invalidates it.
            Bias::Bullish => candle.low_f64() < block.bottom,
            Bias::Bearish => candle.high_f64() > block.top,
        };
        if mitigated {
            block.status = OrderBlockStatus::Mitigated;
            break;
        }
    }
    block
}
