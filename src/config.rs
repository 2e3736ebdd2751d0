// ⚙️ Reward Configuration - loaded once at startup, read-only afterwards

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::RewardError;

// ============================================================================
// REWARD CONFIGURATION
// ============================================================================

/// The four tunable parameters of the reward program.
///
/// Constructed through [`RewardConfig::from_toml`] / [`RewardConfig::from_file`]
/// (which validate) or [`Default`]. Nothing mutates it after load; share it by
/// clone or `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardConfig {
    /// Multiplier applied to every dollar above `maximum_range`
    pub points_per_dollar: f64,

    /// Amounts at or below this earn nothing
    pub minimum_range: f64,

    /// Amounts above this earn `points_per_dollar` per dollar over it
    pub maximum_range: f64,

    /// Length of the rolling window, in calendar months
    pub time_period_months: u32,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    reward: RewardConfig,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            points_per_dollar: 2.0,
            minimum_range: 50.0,
            maximum_range: 100.0,
            time_period_months: 3,
        }
    }
}

impl RewardConfig {
    /// Parse a `[reward]` table. All four keys are required.
    pub fn from_toml(input: &str) -> Result<Self, RewardError> {
        let file: ConfigFile = toml::from_str(input)
            .map_err(|e| RewardError::InvalidConfiguration(e.message().to_string()))?;
        file.reward.validate()?;
        Ok(file.reward)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config = RewardConfig::from_toml(&content)
            .with_context(|| format!("Failed to load config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RewardError> {
        let fields = [
            ("points_per_dollar", self.points_per_dollar),
            ("minimum_range", self.minimum_range),
            ("maximum_range", self.maximum_range),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RewardError::InvalidConfiguration(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if self.minimum_range > self.maximum_range {
            return Err(RewardError::InvalidConfiguration(format!(
                "minimum_range ({}) must not exceed maximum_range ({})",
                self.minimum_range, self.maximum_range
            )));
        }

        if self.time_period_months == 0 {
            return Err(RewardError::InvalidConfiguration(
                "time_period_months must be at least 1".to_string(),
            ));
        }

        // Points must not drop when an amount crosses maximum_range
        let standard_tier_cap = (self.maximum_range - self.minimum_range).floor();
        if self.minimum_range.trunc() < standard_tier_cap {
            return Err(RewardError::InvalidConfiguration(format!(
                "upper tier base ({}) is below the standard tier cap ({})",
                self.minimum_range.trunc(),
                standard_tier_cap
            )));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
