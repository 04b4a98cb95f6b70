//! Wave scenario files.
//!
//! A scenario places towers and schedules enemy groups along horizontal
//! lanes. Enemies walk from `spawn_x` toward `base_x`; any that arrive leak.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A tower placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSpec {
    /// Catalog entity name
    pub entity: String,
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
}

impl TowerSpec {
    /// Tower position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A group of identical enemies released one after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyGroup {
    /// Catalog entity name
    pub entity: String,
    /// Enemies in the group
    pub count: u32,
    /// Seconds before the first enemy
    #[serde(default)]
    pub start_secs: f64,
    /// Seconds between enemies
    pub interval_secs: f64,
    /// Lane height
    pub lane_y: f32,
    /// Walking speed in units per second
    pub speed: f32,
}

/// A full wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveScenario {
    /// Wave name
    pub name: String,
    /// Simulation steps per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
    /// Hard stop in seconds
    pub max_secs: f64,
    /// Where enemies appear
    pub spawn_x: f32,
    /// Where enemies leak
    pub base_x: f32,
    /// Projectile speed in units per second
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f32,
    /// Tower placements
    pub towers: Vec<TowerSpec>,
    /// Enemy groups
    pub enemies: Vec<EnemyGroup>,
}

fn default_tick_rate() -> f64 {
    30.0
}

fn default_projectile_speed() -> f32 {
    20.0
}

impl WaveScenario {
    /// Parse and validate a RON scenario.
    pub fn from_ron(text: &str) -> Result<Self> {
        let scenario: Self = ron::from_str(text).context("Failed to parse wave scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let scenario = Self::from_ron(&text)?;
        info!(
            "Loaded wave '{}' with {} towers and {} enemies",
            scenario.name,
            scenario.towers.len(),
            scenario.enemy_count()
        );
        Ok(scenario)
    }

    /// Seconds per simulation step.
    #[must_use]
    pub fn step_secs(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    /// Total enemies across every group.
    #[must_use]
    pub fn enemy_count(&self) -> u32 {
        self.enemies.iter().map(|g| g.count).sum()
    }

    /// Spawn times of every enemy, earliest first.
    #[must_use]
    pub fn spawn_schedule(&self) -> Vec<(f64, &EnemyGroup)> {
        let mut schedule: Vec<(f64, &EnemyGroup)> = self
            .enemies
            .iter()
            .flat_map(|group| {
                (0..group.count).map(move |i| (group.start_secs + f64::from(i) * group.interval_secs, group))
            })
            .collect();
        schedule.sort_by(|a, b| a.0.total_cmp(&b.0));
        schedule
    }

    fn validate(&self) -> Result<()> {
        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz.is_finite()) {
            bail!("tick_rate_hz must be positive, got {}", self.tick_rate_hz);
        }
        if self.max_secs <= 0.0 {
            bail!("max_secs must be positive, got {}", self.max_secs);
        }
        if self.spawn_x <= self.base_x {
            bail!("spawn_x ({}) must lie beyond base_x ({})", self.spawn_x, self.base_x);
        }
        if let Some(group) = self.enemies.iter().find(|g| g.speed <= 0.0 || g.interval_secs < 0.0) {
            bail!("Enemy group '{}' needs a positive speed and interval", group.entity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WAVE: &str = r#"(
        name: "test",
        max_secs: 30.0,
        spawn_x: 20.0,
        base_x: 0.0,
        towers: [(entity: "archer", x: 5.0, y: 2.0)],
        enemies: [
            (entity: "grunt", count: 2, interval_secs: 1.0, lane_y: 0.0, speed: 2.0),
            (entity: "brute", count: 1, start_secs: 0.5, interval_secs: 0.0, lane_y: 0.0, speed: 1.0),
        ],
    )"#;

    #[test]
    fn test_parse_with_defaults() {
        let wave = WaveScenario::from_ron(WAVE).expect("valid wave");
        assert_eq!(wave.tick_rate_hz, 30.0);
        assert_eq!(wave.projectile_speed, 20.0);
        assert_eq!(wave.enemy_count(), 3);
        assert_eq!(wave.towers[0].position(), Vec2::new(5.0, 2.0));
    }

    #[test]
    fn test_spawn_schedule_is_sorted() {
        let wave = WaveScenario::from_ron(WAVE).expect("valid wave");
        let times: Vec<f64> = wave.spawn_schedule().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_rejects_backwards_lane() {
        let broken = WAVE.replace("spawn_x: 20.0", "spawn_x: -1.0");
        assert!(WaveScenario::from_ron(&broken).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("wave.ron");
        fs::write(&path, WAVE).expect("write");
        let wave = WaveScenario::load_from(&path).expect("loads");
        assert_eq!(wave.name, "test");
        assert!(WaveScenario::load_from(temp_dir.path().join("missing.ron")).is_err());
    }
}
