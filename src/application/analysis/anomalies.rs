//! Heuristic microstructure classifiers: wash trading, spoofing,
//! iceberging, market making, dump bots, plus institutional block-flow
//! and the Wyckoff accumulation/distribution read.
//!
//! Every classifier is independent and degrades to a not-detected result
//! when its minimum sample is missing. Thresholds are empirical and
//! deliberately overridable; none of them is calibrated per instrument.

use crate::application::analysis::indicators::{
    coefficient_of_variation, linear_slope, mean,
};
use crate::domain::market::anomaly::{
    AnomalyKind, AnomalyReport, AnomalySignal, FlowDirection, InstitutionalFlow, WyckoffPhase,
};
use crate::domain::market::types::{Candle, OrderBookSnapshot, TakerSide, Trade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    // Wash trading
    pub wash_volume_multiplier: f64,
    pub wash_max_move_pct: f64,
    pub wash_lookback: usize,
    // Spoofing
    pub spoof_depth_levels: usize,
    pub spoof_depth_multiplier: f64,
    pub spoof_min_trades: usize,
    // Iceberg
    pub iceberg_size_cv_max: f64,
    pub iceberg_size_sample: usize,
    pub iceberg_time_cv_max: f64,
    pub iceberg_time_sample: usize,
    // Market maker
    pub mm_max_spread_pct: f64,
    // Dump bot
    pub dump_window: usize,
    pub dump_min_down_candles: usize,
    pub dump_min_lower_highs: usize,
    // Institutional flow
    pub flow_min_trades: usize,
    pub block_size_multiplier: f64,
    pub block_min_count: usize,
    pub block_imbalance_ratio: f64,
    // Wyckoff
    pub wyckoff_window: usize,
    pub wyckoff_compression_multiplier: f64,
    pub spring_volume_multiplier: f64,
    pub distribution_volume_multiplier: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            wash_volume_multiplier: 2.0,
            wash_max_move_pct: 0.5,
            wash_lookback: 20,
            spoof_depth_levels: 10,
            spoof_depth_multiplier: 5.0,
            spoof_min_trades: 50,
            iceberg_size_cv_max: 0.15,
            iceberg_size_sample: 100,
            iceberg_time_cv_max: 0.3,
            iceberg_time_sample: 50,
            mm_max_spread_pct: 0.05,
            dump_window: 20,
            dump_min_down_candles: 14,
            dump_min_lower_highs: 15,
            flow_min_trades: 50,
            block_size_multiplier: 10.0,
            block_min_count: 5,
            block_imbalance_ratio: 1.5,
            wyckoff_window: 50,
            wyckoff_compression_multiplier: 20.0,
            spring_volume_multiplier: 2.0,
            distribution_volume_multiplier: 2.5,
        }
    }
}

pub struct MicrostructureAnomalyDetector {
    cfg: AnomalyConfig,
}

impl MicrostructureAnomalyDetector {
    pub fn new(cfg: AnomalyConfig) -> Self {
        Self { cfg }
    }

    pub fn analyze(
        &self,
        candles: &[Candle],
        trades: &[Trade],
        book: &OrderBookSnapshot,
    ) -> AnomalyReport {
        AnomalyReport {
            wash_trading: self.wash_trading(candles),
            spoofing: self.spoofing(trades, book),
            iceberg: self.iceberg(trades),
            market_maker: self.market_maker(book),
            dump_bot: self.dump_bot(candles),
            institutional_flow: self.institutional_flow(trades),
            wyckoff: self.wyckoff(candles),
        }
    }

    /// Volume spike with no price discovery: last-candle volume well above
    /// the trailing mean while price went nowhere.
    pub fn wash_trading(&self, candles: &[Candle]) -> AnomalySignal {
        let kind = AnomalyKind::WashTrading;
        if candles.len() < 6 {
            return AnomalySignal::not_detected(kind);
        }

        let window = candles.len().min(self.cfg.wash_lookback + 1);
        let recent = &candles[candles.len() - window..];
        let trailing: Vec<f64> = recent[..recent.len() - 1]
            .iter()
            .map(|c| c.volume_f64())
            .collect();
        let trailing_mean = mean(&trailing);
        if trailing_mean <= 0.0 {
            return AnomalySignal::not_detected(kind);
        }

        let last = recent.last().expect("window is non-empty");
        let volume_ratio = last.volume_f64() / trailing_mean;

        let anchor = candles[candles.len() - 5].close_f64();
        if anchor <= 0.0 {
            return AnomalySignal::not_detected(kind);
        }
        let move_pct = ((last.close_f64() - anchor) / anchor).abs() * 100.0;

        if volume_ratio > self.cfg.wash_volume_multiplier && move_pct < self.cfg.wash_max_move_pct
        {
            let confidence = 50.0
                + ((volume_ratio - self.cfg.wash_volume_multiplier) * 10.0).min(30.0)
                + ((self.cfg.wash_max_move_pct - move_pct) * 20.0).min(10.0);
            return AnomalySignal::with_evidence(
                kind,
                confidence,
                vec![
                    format!("volume {:.1}x trailing mean", volume_ratio),
                    format!("price moved {:.2}% over 5 candles", move_pct),
                ],
            );
        }
        AnomalySignal::not_detected(kind)
    }

    /// Resting book depth far out of proportion to what actually trades.
    pub fn spoofing(&self, trades: &[Trade], book: &OrderBookSnapshot) -> AnomalySignal {
        let kind = AnomalyKind::Spoofing;
        if trades.len() < self.cfg.spoof_min_trades || book.bids.is_empty() || book.asks.is_empty()
        {
            return AnomalySignal::not_detected(kind);
        }

        let depth = book.depth_qty(self.cfg.spoof_depth_levels);
        let traded: f64 = trades.iter().map(|t| t.qty_f64()).sum();
        if traded <= 0.0 {
            return AnomalySignal::not_detected(kind);
        }

        let ratio = depth / traded;
        if ratio > self.cfg.spoof_depth_multiplier {
            let confidence = (40.0 + ratio * 5.0).min(95.0);
            return AnomalySignal::with_evidence(
                kind,
                confidence,
                vec![format!(
                    "top-{} depth is {:.1}x recent traded volume",
                    self.cfg.spoof_depth_levels, ratio
                )],
            );
        }
        AnomalySignal::not_detected(kind)
    }

    /// Suspiciously uniform trade sizes arriving on a metronome.
    pub fn iceberg(&self, trades: &[Trade]) -> AnomalySignal {
        let kind = AnomalyKind::Iceberg;
        if trades.len() < self.cfg.iceberg_size_sample {
            return AnomalySignal::not_detected(kind);
        }

        let sizes: Vec<f64> = trades
            .iter()
            .rev()
            .take(self.cfg.iceberg_size_sample)
            .map(|t| t.qty_f64())
            .collect();
        let Some(size_cv) = coefficient_of_variation(&sizes) else {
            return AnomalySignal::not_detected(kind);
        };

        let recent: Vec<&Trade> = trades
            .iter()
            .rev()
            .take(self.cfg.iceberg_time_sample)
            .collect();
        let gaps: Vec<f64> = recent
            .windows(2)
            .map(|w| (w[0].timestamp - w[1].timestamp).abs() as f64)
            .collect();
        let Some(time_cv) = coefficient_of_variation(&gaps) else {
            return AnomalySignal::not_detected(kind);
        };

        if size_cv < self.cfg.iceberg_size_cv_max && time_cv < self.cfg.iceberg_time_cv_max {
            let confidence = (50.0
                + (self.cfg.iceberg_size_cv_max - size_cv) / self.cfg.iceberg_size_cv_max * 25.0
                + (self.cfg.iceberg_time_cv_max - time_cv) / self.cfg.iceberg_time_cv_max * 20.0)
                .min(95.0);
            return AnomalySignal::with_evidence(
                kind,
                confidence,
                vec![
                    format!("trade size CV {:.3}", size_cv),
                    format!("inter-trade time CV {:.3}", time_cv),
                ],
            );
        }
        AnomalySignal::not_detected(kind)
    }

    /// A spread this tight means someone is quoting both sides.
    pub fn market_maker(&self, book: &OrderBookSnapshot) -> AnomalySignal {
        let kind = AnomalyKind::MarketMaker;
        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            return AnomalySignal::not_detected(kind);
        };
        let bid_price = bid.price_f64();
        let ask_price = ask.price_f64();
        if bid_price <= 0.0 || ask_price <= bid_price {
            return AnomalySignal::not_detected(kind);
        }

        let spread_pct = (ask_price - bid_price) / bid_price * 100.0;
        if spread_pct < self.cfg.mm_max_spread_pct {
            return AnomalySignal::with_evidence(
                kind,
                70.0,
                vec![format!("spread {:.4}% of best bid", spread_pct)],
            );
        }
        AnomalySignal::not_detected(kind)
    }

    /// Mechanical distribution: a long run of down candles with fading
    /// volume and relentless lower highs.
    pub fn dump_bot(&self, candles: &[Candle]) -> AnomalySignal {
        let kind = AnomalyKind::DumpBot;
        if candles.len() < self.cfg.dump_window {
            return AnomalySignal::not_detected(kind);
        }

        let window = &candles[candles.len() - self.cfg.dump_window..];
        let down_candles = window.iter().filter(|c| c.is_bearish()).count();
        let volumes: Vec<f64> = window.iter().map(|c| c.volume_f64()).collect();
        let volume_slope = linear_slope(&volumes);
        let lower_highs = window
            .windows(2)
            .filter(|w| w[1].high_f64() < w[0].high_f64())
            .count();

        if down_candles >= self.cfg.dump_min_down_candles
            && volume_slope < 0.0
            && lower_highs >= self.cfg.dump_min_lower_highs
        {
            return AnomalySignal::with_evidence(
                kind,
                80.0,
                vec![
                    format!("{}/{} down candles", down_candles, self.cfg.dump_window),
                    "declining volume trend".to_string(),
                    format!("{}/{} lower highs", lower_highs, self.cfg.dump_window - 1),
                ],
            );
        }
        AnomalySignal::not_detected(kind)
    }

    /// Block trades grouped by taker side; a lopsided count reads as
    /// institutional inflow/outflow.
    pub fn institutional_flow(&self, trades: &[Trade]) -> InstitutionalFlow {
        if trades.len() < self.cfg.flow_min_trades {
            return InstitutionalFlow::neutral();
        }

        let sizes: Vec<f64> = trades.iter().map(|t| t.qty_f64()).collect();
        let mean_size = mean(&sizes);
        if mean_size <= 0.0 {
            return InstitutionalFlow::neutral();
        }

        let threshold = mean_size * self.cfg.block_size_multiplier;
        let mut buy_blocks = 0usize;
        let mut sell_blocks = 0usize;
        for trade in trades {
            if trade.qty_f64() > threshold {
                match trade.taker_side {
                    TakerSide::Buy => buy_blocks += 1,
                    TakerSide::Sell => sell_blocks += 1,
                }
            }
        }
        let total = buy_blocks + sell_blocks;
        if total < self.cfg.block_min_count {
            return InstitutionalFlow {
                direction: FlowDirection::Neutral,
                block_trades: total,
                buy_blocks,
                sell_blocks,
                score: 50.0,
                evidence: Vec::new(),
            };
        }

        let ratio_buy = buy_blocks as f64 / sell_blocks.max(1) as f64;
        let ratio_sell = sell_blocks as f64 / buy_blocks.max(1) as f64;
        let (direction, ratio) = if ratio_buy >= self.cfg.block_imbalance_ratio {
            (FlowDirection::Inflow, ratio_buy)
        } else if ratio_sell >= self.cfg.block_imbalance_ratio {
            (FlowDirection::Outflow, ratio_sell)
        } else {
            (FlowDirection::Neutral, 1.0)
        };

        let score = match direction {
            FlowDirection::Neutral => 50.0,
            _ => (50.0 + total as f64 * 4.0 + (ratio - self.cfg.block_imbalance_ratio) * 10.0)
                .min(100.0),
        };
        let evidence = vec![format!(
            "{} block trades ({} buy / {} sell), >{:.0}x mean size",
            total, buy_blocks, sell_blocks, self.cfg.block_size_multiplier
        )];

        InstitutionalFlow {
            direction,
            block_trades: total,
            buy_blocks,
            sell_blocks,
            score,
            evidence,
        }
    }

    /// Compression plus a spring (or an upthrust) in the Wyckoff sense.
    pub fn wyckoff(&self, candles: &[Candle]) -> WyckoffPhase {
        if candles.len() < self.cfg.wyckoff_window {
            return WyckoffPhase::None;
        }
        let window = &candles[candles.len() - self.cfg.wyckoff_window..];

        let ranges: Vec<f64> = window.iter().map(|c| c.high_f64() - c.low_f64()).collect();
        let avg_range = mean(&ranges);
        if avg_range <= 0.0 {
            return WyckoffPhase::None;
        }
        let max_high = window
            .iter()
            .map(|c| c.high_f64())
            .fold(f64::NEG_INFINITY, f64::max);
        let min_low = window
            .iter()
            .map(|c| c.low_f64())
            .fold(f64::INFINITY, f64::min);
        let compressed =
            (max_high - min_low) < avg_range * self.cfg.wyckoff_compression_multiplier;

        let volumes: Vec<f64> = window.iter().map(|c| c.volume_f64()).collect();
        let declining_volume = linear_slope(&volumes) < 0.0;
        let mean_volume = mean(&volumes);

        if compressed && declining_volume {
            if let Some(spring_idx) = latest_breakout(window, false) {
                let spiked = window
                    .iter()
                    .skip(spring_idx)
                    .take(3)
                    .any(|c| c.volume_f64() >= mean_volume * self.cfg.spring_volume_multiplier);
                if spiked {
                    return WyckoffPhase::Accumulation;
                }
            }
        }

        if let Some(top_idx) = latest_breakout(window, true) {
            let rejected = window.iter().skip(top_idx).take(3).any(|c| {
                c.volume_f64() >= mean_volume * self.cfg.distribution_volume_multiplier
                    && c.close < c.open
            });
            if rejected {
                return WyckoffPhase::Distribution;
            }
        }

        WyckoffPhase::None
    }
}

/// Index of the most recent bar making a new extreme against all bars
/// before it within the window. `None` when no bar does.
fn latest_breakout(window: &[Candle], highs: bool) -> Option<usize> {
    let mut found = None;
    for i in 1..window.len() {
        let is_new_extreme = if highs {
            let prior_max = window[..i]
                .iter()
                .map(|c| c.high_f64())
                .fold(f64::NEG_INFINITY, f64::max);
            window[i].high_f64() > prior_max
        } else {
            let prior_min = window[..i]
                .iter()
                .map(|c| c.low_f64())
                .fold(f64::INFINITY, f64::min);
            window[i].low_f64() < prior_min
        };
        if is_new_extreme {
            found = Some(i);
        }
    }
    found
}
