//! Configuration management (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::report::ResourceConstraint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherConfig {
    pub sampling: SamplingConfig,
    /// Resource budgets keyed by component name (the part of the entity
    /// display name after the first `/`).
    #[serde(default)]
    pub constraints: HashMap<String, ResourceConstraint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub period_secs: u64,
    pub probe_timeout_secs: u64,
    pub percentiles: Vec<u8>,
}

impl Default for GatherConfig {
    fn default() -> Self {
        GatherConfig {
            sampling: SamplingConfig {
                period_secs: 60,
                probe_timeout_secs: 15,
                percentiles: vec![50, 90, 99],
            },
            constraints: HashMap::new(),
        }
    }
}

impl GatherConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: GatherConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.sampling.period_secs)
    }

    /// Per-probe timeout. Must stay strictly below the sampling period so a
    /// hung host cannot stall the next cycle; misconfigured values are
    /// clamped to half the period.
    pub fn probe_timeout(&self) -> Duration {
        let timeout = Duration::from_secs(self.sampling.probe_timeout_secs);
        if timeout >= self.period() {
            warn!(
                timeout_secs = self.sampling.probe_timeout_secs,
                period_secs = self.sampling.period_secs,
                "probe timeout not below sampling period, clamping to period/2"
            );
            return self.period() / 2;
        }
        timeout
    }
}
