//! Attack loadouts and volley planning.
//!
//! This module provides:
//! - Attack loadouts carried by entities
//! - Count-stat rounding
//! - Range checks
//! - Multistrike and multi-projectile volley planning

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::container::StatContainer;
use crate::damage::DamageProfile;
use crate::damaging::AttackState;
use crate::rng::CombatRng;
use crate::stat::StatId;

/// Lateral spacing between projectiles when the count is even.
const EVEN_SPREAD: f32 = 1.5;
/// Lateral spacing between projectiles when the count is odd.
const ODD_SPREAD: f32 = 2.0;
/// Share of the spacing each side step moves.
const SIDE_STEP: f32 = 0.25;

/// Flight settings shared by every instance an attack spawns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackSettings {
    /// Reflections allowed before the attack finishes
    pub max_reflections: u32,
    /// Whether the attack can be reflected
    pub reflectable: bool,
    /// Travel limit as a multiple of attack range
    pub max_travel_distance_multiplier: f64,
    /// Fires without a target and skips the range check
    pub untargeted: bool,
}

impl Default for AttackSettings {
    fn default() -> Self {
        Self {
            max_reflections: 1,
            reflectable: true,
            max_travel_distance_multiplier: 1.5,
            untargeted: false,
        }
    }
}

/// An attack an entity can use, with its own copy of the attack's stats.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackLoadout {
    /// Attack template name
    pub name: String,
    /// Damage profile copied into every spawned instance
    pub profile: DamageProfile,
    /// Flight settings
    pub settings: AttackSettings,
}

impl AttackLoadout {
    /// Create a loadout.
    #[must_use]
    pub fn new(name: impl Into<String>, profile: DamageProfile, settings: AttackSettings) -> Self {
        Self {
            name: name.into(),
            profile,
            settings,
        }
    }

    /// Seconds between uses, floored.
    #[must_use]
    pub fn cooldown_secs(&self, floor: f64) -> f64 {
        self.profile.stats.total(StatId::AttackCooldownTimer).max(floor)
    }

    /// Build flight state for one spawned instance.
    #[must_use]
    pub fn spawn_state(&self, slot: u16, origin: Vec2, rotation_degrees: f32, rounding_threshold: f64) -> AttackState {
        let mut state = AttackState::new(slot, origin, rotation_degrees);
        state.max_reflections = self.settings.max_reflections;
        state.reflectable = self.settings.reflectable;
        state.max_travel_distance_multiplier = self.settings.max_travel_distance_multiplier;
        state.hits_remaining =
            int_stat(self.profile.stats.total(StatId::ProjectilePierceCountValue), rounding_threshold) + 1;
        state
    }
}

/// Round a count stat: truncate, unless the fraction is at least `threshold`.
///
/// Negative and non-finite values count as zero.
#[must_use]
pub fn int_stat(value: f64, threshold: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let whole = value.trunc();
    let rounded = if value - whole >= threshold {
        whole + 1.0
    } else {
        whole
    };
    rounded.min(f64::from(u32::MAX)) as u32
}

/// Check if a target is in range, using `shortest_range` as the floor.
#[must_use]
pub fn in_range(stats: &StatContainer, from: Vec2, to: Vec2, shortest_range: f64) -> bool {
    let range = stats.total(StatId::AttackRangeValue).max(shortest_range);
    f64::from(from.distance(to)) <= range
}

/// One projectile of a planned volley.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    /// Strike number, starting at 0
    pub strike: u32,
    /// Projectile number within the strike, starting at 0
    pub projectile: u32,
    /// Sideways offset from the firing line
    pub lateral_offset: f32,
    /// Only a strike's first projectile keeps its multistrike chance
    pub keeps_multistrike: bool,
}

/// Number of strikes one use of an attack produces.
///
/// The first strike always happens. Each further strike rolls against a
/// multistrike chance that shrinks linearly as the combo grows.
pub fn roll_strikes(stats: &StatContainer, rng: &mut dyn CombatRng, rounding_threshold: f64) -> u32 {
    let max_combo = int_stat(stats.total(StatId::MaxMultistrikeHitsComboValue), rounding_threshold).max(1);
    let base_chance = stats.total(StatId::MultistrikeChancePercent) / 100.0;

    let mut strikes = 1;
    while strikes < max_combo {
        let chance = (base_chance * (1.0 - f64::from(strikes) / f64::from(max_combo))).max(0.0);
        if chance <= 0.0 || rng.next_f64() > chance {
            break;
        }
        strikes += 1;
    }
    strikes
}

/// Lateral offsets for a strike's projectiles: center first, then
/// alternating sides, stepping further out every pair.
#[must_use]
pub fn projectile_offsets(count: u32) -> Vec<f32> {
    let spread = if count % 2 == 1 { ODD_SPREAD } else { EVEN_SPREAD };
    (0..count)
        .map(|i| {
            let direction = if i % 2 == 0 { SIDE_STEP } else { -SIDE_STEP };
            direction * ((i + 1) / 2) as f32 * spread
        })
        .collect()
}

/// Plan every projectile one use of an attack spawns.
pub fn plan_volley(stats: &StatContainer, rng: &mut dyn CombatRng, rounding_threshold: f64) -> Vec<ProjectileSpawn> {
    let strikes = roll_strikes(stats, rng, rounding_threshold);
    let count = int_stat(stats.total(StatId::ProjectileCountValue), rounding_threshold).max(1);
    let offsets = projectile_offsets(count);

    (0..strikes)
        .flat_map(|strike| {
            offsets.iter().enumerate().map(move |(i, offset)| ProjectileSpawn {
                strike,
                projectile: u32::try_from(i).unwrap_or(u32::MAX),
                lateral_offset: *offset,
                keeps_multistrike: i == 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn test_int_stat_rounding() {
        assert_eq!(int_stat(2.0, 0.98), 2);
        assert_eq!(int_stat(2.5, 0.98), 2);
        assert_eq!(int_stat(2.985, 0.98), 3);
        assert_eq!(int_stat(-1.0, 0.98), 0);
        assert_eq!(int_stat(f64::NAN, 0.98), 0);
    }

    #[test]
    fn test_range_floor() {
        let stats = StatContainer::from_values([(StatId::AttackRangeValue, 1.0)]);
        assert!(in_range(&stats, Vec2::ZERO, Vec2::new(3.0, 0.0), 3.0));
        assert!(!in_range(&stats, Vec2::ZERO, Vec2::new(3.5, 0.0), 3.0));

        let long = StatContainer::from_values([(StatId::AttackRangeValue, 10.0)]);
        assert!(in_range(&long, Vec2::ZERO, Vec2::new(9.0, 0.0), 3.0));
    }

    #[test]
    fn test_first_strike_is_guaranteed() {
        let stats = StatContainer::from_values([
            (StatId::MultistrikeChancePercent, 0.0),
            (StatId::MaxMultistrikeHitsComboValue, 5.0),
        ]);
        let mut rng = ScriptedRng::constant(0.0);
        assert_eq!(roll_strikes(&stats, &mut rng, 0.98), 1);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn test_multistrike_chance_decays() {
        let stats = StatContainer::from_values([
            (StatId::MultistrikeChancePercent, 100.0),
            (StatId::MaxMultistrikeHitsComboValue, 4.0),
        ]);
        // Chances: 0.75, 0.5, 0.25
        let mut rng = ScriptedRng::new([0.7, 0.5, 0.3], 0.0);
        assert_eq!(roll_strikes(&stats, &mut rng, 0.98), 3);

        let mut lucky = ScriptedRng::constant(0.0);
        assert_eq!(roll_strikes(&stats, &mut lucky, 0.98), 4);
    }

    #[test]
    fn test_projectile_offsets_alternate() {
        assert_eq!(projectile_offsets(1), vec![0.0]);
        assert_eq!(projectile_offsets(2), vec![0.0, -0.375]);
        assert_eq!(projectile_offsets(3), vec![0.0, -0.5, 0.5]);
    }

    #[test]
    fn test_volley_only_first_projectile_keeps_multistrike() {
        let stats = StatContainer::from_values([
            (StatId::ProjectileCountValue, 3.0),
            (StatId::MultistrikeChancePercent, 100.0),
            (StatId::MaxMultistrikeHitsComboValue, 2.0),
        ]);
        let mut rng = ScriptedRng::constant(0.1);
        let volley = plan_volley(&stats, &mut rng, 0.98);

        assert_eq!(volley.len(), 6);
        assert_eq!(volley.iter().filter(|p| p.keeps_multistrike).count(), 2);
        assert_eq!(volley[3].strike, 1);
        assert_eq!(volley[3].projectile, 0);
    }

    #[test]
    fn test_spawn_state_pierce() {
        let loadout = AttackLoadout::new(
            "spear",
            DamageProfile::new(
                StatContainer::from_values([(StatId::ProjectilePierceCountValue, 1.99)]),
                crate::damage::DamageTypes::PIERCING,
            ),
            AttackSettings::default(),
        );
        let state = loadout.spawn_state(0, Vec2::ZERO, 0.0, 0.98);
        assert_eq!(state.hits_remaining, 3);
        assert!(state.reflectable);
    }
}
