//! ### Config
//! TOML settings holding the feed-in revenue and per-month grid cost overrides.

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::AnalysisError,
    month::MonthKey,
    overrides::{apply_override, CostOverrides, DEFAULT_GRID_REVENUE_PER_KWH},
};

pub const DEFAULT_CONFIG_PATH: &str = "solar-analysis.toml";

fn default_grid_revenue() -> f64 {
    DEFAULT_GRID_REVENUE_PER_KWH
}

/// Settings file, e.g.
///
/// ```toml
/// grid_revenue_per_kwh = 0.082
///
/// [grid_cost_overrides]
/// 2024-Mar = 0.30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_grid_revenue")]
    pub grid_revenue_per_kwh: f64,
    #[serde(default)]
    pub grid_cost_overrides: CostOverrides,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid_revenue_per_kwh: DEFAULT_GRID_REVENUE_PER_KWH,
            grid_cost_overrides: CostOverrides::new(),
        }
    }
}

impl AppConfig {
    /// Loads `path` when given. Otherwise reads `solar-analysis.toml` if it
    /// exists and falls back to the defaults if it does not.
    pub fn load(path: Option<&Path>) -> Result<Self, AnalysisError> {
        match path {
            Some(path) => Self::from_path(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let contents = fs::read_to_string(path)?;
        let cfg = toml::from_str::<AppConfig>(&contents)?.validated()?;
        tracing::debug!(
            path = %path.display(),
            overrides = cfg.grid_cost_overrides.len(),
            "loaded config"
        );
        Ok(cfg)
    }

    // Overrides from the file pass the same checks as ones given on the
    // command line.
    fn validated(self) -> Result<Self, AnalysisError> {
        let mut overrides = CostOverrides::new();
        for (month, rate) in self.grid_cost_overrides.iter() {
            overrides = apply_override(&overrides, month, rate)?;
        }
        Ok(Self {
            grid_cost_overrides: overrides,
            ..self
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Copy of this config with one more month override.
    pub fn with_override(&self, month: MonthKey, rate: f64) -> Result<Self, AnalysisError> {
        Ok(Self {
            grid_cost_overrides: apply_override(&self.grid_cost_overrides, month, rate)?,
            ..self.clone()
        })
    }

    pub fn path_or_default(path: Option<&Path>) -> PathBuf {
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
    }
}
