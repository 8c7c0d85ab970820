//! Configuration loading from environment variables, with detector
//! parameters optionally layered from a TOML file.

mod analysis_config;

pub use analysis_config::AnalysisConfig;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols swept each cycle.
    pub symbols: Vec<String>,
    /// Pause between sweep cycles.
    pub sweep_interval: Duration,
    /// Concurrent per-symbol analyses.
    pub max_concurrency: usize,
    /// Minimum gap between alerts for the same symbol.
    pub alert_cooldown: Duration,
    /// Candles requested per symbol per cycle.
    pub candle_limit: usize,
    /// Trades requested per symbol per cycle.
    pub trade_limit: usize,
    /// Detector tunables.
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            sweep_interval: Duration::from_secs(60),
            max_concurrency: 4,
            alert_cooldown: Duration::from_secs(900),
            candle_limit: 200,
            trade_limit: 500,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to defaults for any
    /// unset value. `ANALYSIS_CONFIG` names an optional TOML file for the
    /// detector parameters.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let symbols = match env::var("SYMBOLS") {
            Ok(raw) => {
                let parsed: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parsed.is_empty() {
                    anyhow::bail!("SYMBOLS is set but contains no symbols: {:?}", raw);
                }
                parsed
            }
            Err(_) => defaults.symbols,
        };

        let sweep_interval = parse_secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval)?;
        let alert_cooldown = parse_secs("ALERT_COOLDOWN_SECS", defaults.alert_cooldown)?;
        let max_concurrency = parse_usize("MAX_CONCURRENCY", defaults.max_concurrency)?;
        if max_concurrency == 0 {
            anyhow::bail!("MAX_CONCURRENCY must be at least 1");
        }
        let candle_limit = parse_usize("CANDLE_LIMIT", defaults.candle_limit)?;
        let trade_limit = parse_usize("TRADE_LIMIT", defaults.trade_limit)?;

        let analysis = match env::var("ANALYSIS_CONFIG") {
            Ok(path) => AnalysisConfig::from_toml_file(&PathBuf::from(path))?,
            Err(_) => AnalysisConfig::default(),
        };

        Ok(Self {
            symbols,
            sweep_interval,
            max_concurrency,
            alert_cooldown,
            candle_limit,
            trade_limit,
            analysis,
        })
    }
}

fn parse_secs(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{} must be an integer number of seconds: {:?}", key, raw))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

fn parse_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be an integer: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.alert_cooldown, Duration::from_secs(900));
    }
}
