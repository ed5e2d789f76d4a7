//! ### Overrides
//! Per-month grid cost rates that replace the default tariff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::AnalysisError, month::MonthKey};

/// Grid cost per kWh for any month without an override.
pub const DEFAULT_GRID_COST_PER_KWH: f64 = 0.28;

/// Feed-in revenue per kWh used when nothing else is configured.
pub const DEFAULT_GRID_REVENUE_PER_KWH: f64 = 0.082;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostOverrides(BTreeMap<MonthKey, f64>);

impl CostOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// The override for `month`, or [`DEFAULT_GRID_COST_PER_KWH`].
    pub fn rate_for(&self, month: MonthKey) -> f64 {
        self.0
            .get(&month)
            .copied()
            .unwrap_or(DEFAULT_GRID_COST_PER_KWH)
    }

    pub fn get(&self, month: MonthKey) -> Option<f64> {
        self.0.get(&month).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.0.iter().map(|(month, rate)| (*month, *rate))
    }
}

impl FromIterator<(MonthKey, f64)> for CostOverrides {
    fn from_iter<I: IntoIterator<Item = (MonthKey, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns a copy of `overrides` with `month` set to `rate`; the input is left untouched.
pub fn apply_override(
    overrides: &CostOverrides,
    month: MonthKey,
    rate: f64,
) -> Result<CostOverrides, AnalysisError> {
    if !rate.is_finite() || rate < 0. {
        return Err(AnalysisError::InvalidRate { month, rate });
    }
    let mut updated = overrides.clone();
    updated.0.insert(month, rate);
    Ok(updated)
}

/// Parses a `2024-Mar=0.30` command line pair.
pub fn parse_override_arg(arg: &str) -> Result<(MonthKey, f64), AnalysisError> {
    let (month, rate) = arg
        .split_once('=')
        .ok_or_else(|| AnalysisError::InvalidMonthKey(arg.to_string()))?;
    let month: MonthKey = month.parse()?;
    let rate = rate
        .trim()
        .parse::<f64>()
        .map_err(|_| AnalysisError::InvalidRate { month, rate: f64::NAN })?;
    Ok((month, rate))
}
