//! Detector parameter set, overridable from a TOML file.

use crate::application::analysis::aggregator::AggregatorConfig;
use crate::application::analysis::anomalies::AnomalyConfig;
use crate::application::analysis::gaps::GapConfig;
use crate::application::analysis::order_blocks::OrderBlockConfig;
use crate::application::analysis::structure::StructureConfig;
use crate::application::analysis::volume_profile::VolumeProfileConfig;
use crate::application::analysis::zones::ZoneConfig;
use crate::domain::market::regime::RegimeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tunables of the analysis core in one place. Every field has a
/// working default; a TOML file only needs to name what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub volume_profile: VolumeProfileConfig,
    pub gaps: GapConfig,
    pub order_blocks: OrderBlockConfig,
    pub zones: ZoneConfig,
    pub structure: StructureConfig,
    pub anomalies: AnomalyConfig,
    pub aggregator: AggregatorConfig,
    pub regime: RegimeConfig,
}

impl AnalysisConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading analysis config {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("parsing analysis config {}", path.display()))
    }
}
