//! Combat configuration.
//!
//! Tunable constants of the combat core. Every field has a default, so a
//! config file only needs the values it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use rampart_common::ConfigError;

use crate::cooldown::CooldownFloors;
use crate::scheduler::SweepBudget;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "rampart.toml";

/// How critical damage resistance reduces a critical hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CritResistFormula {
    /// Subtract `damage * (1 + resist)` after the critical multiplier.
    #[default]
    Literal,
    /// Multiply the critical hit by `1 - resist`.
    Scaled,
}

/// Combat configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === Mitigation ===
    /// Incoming damage multiplier on a parry
    pub parry_damage_factor: f64,
    /// Incoming damage multiplier on a reflecting block
    pub reflect_damage_factor: f64,
    /// Largest random rotation applied on parry or reflect, either way
    pub reflection_angle_degrees: f64,
    /// How critical damage resistance applies
    pub crit_resist_formula: CritResistFormula,

    // === Timing Floors ===
    /// Floor for regen intervals and status effect durations
    pub minimum_cooldown_secs: f64,
    /// Floor for parry, block and dodge cooldowns
    pub minimum_defense_delay_secs: f64,
    /// Floor for attack cooldowns
    pub minimum_attack_cooldown_secs: f64,

    // === Attacks ===
    /// Lower bound used in range checks
    pub shortest_attack_range: f64,
    /// Fraction at which count stats round up
    pub int_stat_rounding_threshold: f64,
    /// Share of the starting base added per level
    pub level_up_fraction: f64,

    // === Scheduling ===
    /// Per-category damage-over-time sweep budget in milliseconds (0 = unbounded)
    pub dot_sweep_budget_ms: f64,
    /// Event bus capacity
    pub event_capacity: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            // Mitigation
            parry_damage_factor: 0.65,
            reflect_damage_factor: 0.65,
            reflection_angle_degrees: 45.0,
            crit_resist_formula: CritResistFormula::Literal,

            // Timing floors
            minimum_cooldown_secs: 0.1,
            minimum_defense_delay_secs: 0.05,
            minimum_attack_cooldown_secs: 0.05,

            // Attacks
            shortest_attack_range: 3.0,
            int_stat_rounding_threshold: 0.98,
            level_up_fraction: 0.1,

            // Scheduling
            dot_sweep_budget_ms: 2.0,
            event_capacity: 4096,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded combat config from {}", path.display());
        Ok(config)
    }

    /// Load a config file, falling back to defaults if it is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Write the config as TOML.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, text)?;
        info!("Saved combat config to {}", path.display());
        Ok(())
    }

    /// Reject values the combat core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("parry_damage_factor", self.parry_damage_factor)?;
        check_fraction("reflect_damage_factor", self.reflect_damage_factor)?;
        check_non_negative("reflection_angle_degrees", self.reflection_angle_degrees)?;
        check_positive("minimum_cooldown_secs", self.minimum_cooldown_secs)?;
        check_positive("minimum_defense_delay_secs", self.minimum_defense_delay_secs)?;
        check_positive("minimum_attack_cooldown_secs", self.minimum_attack_cooldown_secs)?;
        check_non_negative("shortest_attack_range", self.shortest_attack_range)?;
        check_non_negative("level_up_fraction", self.level_up_fraction)?;
        check_non_negative("dot_sweep_budget_ms", self.dot_sweep_budget_ms)?;

        if !(self.int_stat_rounding_threshold > 0.0 && self.int_stat_rounding_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "int_stat_rounding_threshold",
                reason: format!("{} is outside (0, 1]", self.int_stat_rounding_threshold),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cooldown floors for the cooldown controller.
    #[must_use]
    pub const fn cooldown_floors(&self) -> CooldownFloors {
        CooldownFloors {
            attack: self.minimum_attack_cooldown_secs,
            defense: self.minimum_defense_delay_secs,
        }
    }

    /// Sweep budget for the damage-over-time scheduler.
    #[must_use]
    pub fn sweep_budget(&self) -> SweepBudget {
        if self.dot_sweep_budget_ms > 0.0 {
            SweepBudget::Millis(self.dot_sweep_budget_ms)
        } else {
            SweepBudget::Unbounded
        }
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is outside [0, 1]"),
        })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} must be positive"),
        })
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} must not be negative"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CombatConfig::default();
        assert_eq!(config.parry_damage_factor, 0.65);
        assert_eq!(config.int_stat_rounding_threshold, 0.98);
        assert_eq!(config.crit_resist_formula, CritResistFormula::Literal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CombatConfig::from_toml_str(
            r#"
                crit_resist_formula = "Scaled"
                dot_sweep_budget_ms = 0.0
            "#,
        )
        .expect("valid config");
        assert_eq!(config.crit_resist_formula, CritResistFormula::Scaled);
        assert_eq!(config.sweep_budget(), SweepBudget::Unbounded);
        assert_eq!(config.event_capacity, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = CombatConfig::from_toml_str("parry_damage_factor = 1.5").expect_err("rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "parry_damage_factor",
                ..
            }
        ));

        let err = CombatConfig::from_toml_str("minimum_cooldown_secs = 0.0").expect_err("rejected");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        assert!(matches!(
            CombatConfig::from_toml_str("event_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let config = CombatConfig {
            shortest_attack_range: 5.0,
            crit_resist_formula: CritResistFormula::Scaled,
            ..CombatConfig::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = CombatConfig::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_on_missing_or_broken_file() {
        let config = CombatConfig::load_or_default("/nonexistent/path/rampart.toml");
        assert_eq!(config, CombatConfig::default());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "level_up_fraction = -1.0").expect("write");
        assert_eq!(CombatConfig::load_or_default(&path), CombatConfig::default());
    }
}
