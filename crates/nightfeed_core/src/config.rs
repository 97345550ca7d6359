//! Engine configuration.
//!
//! # Responsibility
//! - Carry the tunables of the schedule engine as one explicit structure
//!   passed in at construction, so test suites can use small horizons and
//!   decrements deterministically.
//!
//! # Invariants
//! - `group_days` and both horizons are at least 1.
//! - `decrement_ounces` is finite and >= 0.

use chrono::Weekday;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tunables for the schedule engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Days per elimination group; volume is constant within a group.
    pub group_days: i64,
    /// Ounces removed from the expected volume per elapsed group.
    pub decrement_ounces: f64,
    /// Months of entries materialized when a block is created.
    pub initial_horizon_months: u32,
    /// Months of entries materialized by an explicit forward extension.
    pub extension_horizon_months: u32,
    /// First day of the calendar week for week windows.
    pub week_start: Weekday,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_days: 3,
            decrement_ounces: 0.5,
            initial_horizon_months: 3,
            extension_horizon_months: 1,
            week_start: Weekday::Mon,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidGroupDays(i64),
    InvalidDecrement(f64),
    InvalidHorizon(&'static str, u32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGroupDays(value) => {
                write!(f, "group_days must be >= 1, got {value}")
            }
            Self::InvalidDecrement(value) => {
                write!(f, "decrement_ounces must be finite and >= 0, got {value}")
            }
            Self::InvalidHorizon(name, value) => {
                write!(f, "{name} must be >= 1 month, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl EngineConfig {
    /// Checks that every tunable is usable before the engine accepts it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_days < 1 {
            return Err(ConfigError::InvalidGroupDays(self.group_days));
        }
        if !self.decrement_ounces.is_finite() || self.decrement_ounces < 0.0 {
            return Err(ConfigError::InvalidDecrement(self.decrement_ounces));
        }
        if self.initial_horizon_months < 1 {
            return Err(ConfigError::InvalidHorizon(
                "initial_horizon_months",
                self.initial_horizon_months,
            ));
        }
        if self.extension_horizon_months < 1 {
            return Err(ConfigError::InvalidHorizon(
                "extension_horizon_months",
                self.extension_horizon_months,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};

    #[test]
    fn default_config_validates() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.group_days, 3);
        assert_eq!(config.decrement_ounces, 0.5);
        assert_eq!(config.initial_horizon_months, 3);
        assert_eq!(config.extension_horizon_months, 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.group_days = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidGroupDays(0))
        ));

        let mut config = EngineConfig::default();
        config.decrement_ounces = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDecrement(_))
        ));

        let mut config = EngineConfig::default();
        config.initial_horizon_months = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHorizon("initial_horizon_months", 0))
        ));
    }
}
