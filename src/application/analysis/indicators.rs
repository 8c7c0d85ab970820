//! Shared numeric primitives for the detectors.
//!
//! All helpers are total: degenerate inputs (empty slices, zero means,
//! zero ranges) yield 0.0 or `None`, never NaN/Inf.

use crate::domain::market::types::{Candle, Trade};
use statrs::statistics::{Data, Distribution};

/// Per-index ATR: simple average of true ranges over the trailing
/// `period` bars ending at each index. Index 0 is always 0.0.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut out = vec![0.0; n];
    if n < 2 || period == 0 {
        return out;
    }

    let mut true_ranges = vec![0.0; n];
    for i in 1..n {
        let high = candles[i].high_f64();
        let low = candles[i].low_f64();
        let prev_close = candles[i - 1].close_f64();
        true_ranges[i] = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
    }

    let mut window_sum = 0.0;
    for i in 1..n {
        window_sum += true_ranges[i];
        if i > period {
            window_sum -= true_ranges[i - period];
        }
        let count = (i.min(period)) as f64;
        out[i] = window_sum / count;
    }
    out
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values.to_vec()).mean().unwrap_or(0.0)
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    Data::new(values.to_vec()).std_dev().unwrap_or(0.0)
}

/// Coefficient of variation (std dev / mean). `None` when the sample is
/// too small or the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    if m.abs() < f64::EPSILON {
        return None;
    }
    Some(std_dev(values) / m)
}

/// Least-squares slope of values against their indices.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_sum: f64 = (0..n).map(|i| i as f64).sum();
    let y_sum: f64 = values.iter().sum();
    let xy_sum: f64 = values.iter().enumerate().map(|(i, &v)| i as f64 * v).sum();
    let x2_sum: f64 = (0..n).map(|i| (i * i) as f64).sum();

    let denominator = n_f * x2_sum - x_sum * x_sum;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    (n_f * xy_sum - x_sum * y_sum) / denominator
}

/// Volume-weighted average price of the tape. `None` on empty/zero volume.
pub fn vwap(trades: &[Trade]) -> Option<f64> {
    let mut qty_sum = 0.0;
    let mut notional = 0.0;
    for trade in trades {
        let qty = trade.qty_f64();
        qty_sum += qty;
        notional += qty * trade.price_f64();
    }
    if qty_sum <= 0.0 {
        return None;
    }
    Some(notional / qty_sum)
}

/// Indices of pivot highs/lows: bar `p` is a pivot when it is the strict
/// extreme of the symmetric window of `length` bars on each side. A pivot
/// is only knowable once the full lookahead exists, so the last `length`
/// bars can never produce one; emitted pivots are final and are never
/// revised by appending candles.
pub fn pivot_indices(
    candles: &[Candle],
    length: usize,
    highs: bool,
) -> Vec<usize> {
    let n = candles.len();
    let mut out = Vec::new();
    if length == 0 || n < 2 * length + 1 {
        return out;
    }
    for p in length..n - length {
        let value = if highs {
            candles[p].high_f64()
        } else {
            candles[p].low_f64()
        };
        let mut is_pivot = true;
        for j in p - length..=p + length {
            if j == p {
                continue;
            }
            let other = if highs {
                candles[j].high_f64()
            } else {
                candles[j].low_f64()
            };
            let beaten = if highs { other >= value } else { other <= value };
            if beaten {
                is_pivot = false;
                break;
            }
        }
        if is_pivot {
            out.push(p);
        }
    }
    out
}
