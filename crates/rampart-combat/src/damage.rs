//! Damage descriptions shared by every damaging object.
//!
//! This module provides:
//! - Damage type flags
//! - The damage profile carried by attacks, areas of effect and status effect ticks
//! - Area of effect templates

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::container::StatContainer;
use crate::stat::StatId;
use crate::status::StatusEffectDefinition;
use crate::vitals::Pool;

bitflags! {
    /// Damage types carried by a damaging object.
    ///
    /// An empty set means the type was never configured; resolving such a
    /// source is a no-op.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DamageTypes: u32 {
        const SLASHING  = 1 << 0;
        const PIERCING  = 1 << 1;
        const CRUSHING  = 1 << 2;
        const WIND      = 1 << 3;
        const WATER     = 1 << 4;
        const COLD      = 1 << 5;
        const EARTH     = 1 << 6;
        const POISON    = 1 << 7;
        const ENVENOM   = 1 << 8;
        const FIRE      = 1 << 9;
        const ELECTRIC  = 1 << 10;
        const RADIATION = 1 << 11;
        const EMP       = 1 << 12;
        const SHADOW    = 1 << 13;
        const LIGHT     = 1 << 14;
        const UNHOLY    = 1 << 15;
        const HOLY      = 1 << 16;
        const MAGIC     = 1 << 17;
        const RANGED    = 1 << 18;
        const MELEE     = 1 << 19;
        /// Bypasses parry, block, dodge and armor.
        const TRUE      = 1 << 20;
    }
}

// Content files spell flags out as `"FIRE | MAGIC"`
impl Serialize for DamageTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bitflags::serde::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for DamageTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bitflags::serde::deserialize(deserializer)
    }
}

impl DamageTypes {
    /// Check if this damage skips every mitigation step.
    #[must_use]
    pub const fn is_true_damage(self) -> bool {
        self.contains(Self::TRUE)
    }

    /// Check if no damage type was configured.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.is_empty()
    }
}

// ============================================================================
// Damage Profile
// ============================================================================

/// Everything the resolution pipeline needs to know about a damage source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DamageProfile {
    /// The source's own stats (damage range, crit, pierce, ...)
    pub stats: StatContainer,
    /// Damage types
    pub damage_types: DamageTypes,
    /// Physical damage can be blocked and is reduced by armor
    pub is_physical: bool,
    /// Blockable damage can be parried
    pub is_blockable: bool,
    /// Damage skips the energy shield pool
    pub ignores_shields: bool,
    /// Overlapping targets are ticked by the damage-over-time scheduler
    pub does_damage_over_time: bool,
    /// Heals the target's pool instead of damaging it
    pub heals: Option<Pool>,
    /// Status effects this source may inflict on hit
    pub status_effects: Vec<StatusEffectDefinition>,
    /// Area of effect this source can spawn
    pub area_of_effect: Option<Box<AreaOfEffectTemplate>>,
}

impl DamageProfile {
    /// Create a profile from stats and damage types.
    #[must_use]
    pub fn new(stats: StatContainer, damage_types: DamageTypes) -> Self {
        Self {
            stats,
            damage_types,
            ..Self::default()
        }
    }

    /// Mark the profile as physical and blockable.
    #[must_use]
    pub fn physical(mut self, blockable: bool) -> Self {
        self.is_physical = true;
        self.is_blockable = blockable;
        self
    }

    /// Set whether the profile ticks overlapping targets.
    #[must_use]
    pub fn with_damage_over_time(mut self, enabled: bool) -> Self {
        self.does_damage_over_time = enabled;
        self
    }

    /// Make the profile heal a pool.
    #[must_use]
    pub fn with_heal(mut self, pool: Pool) -> Self {
        self.heals = Some(pool);
        self
    }

    /// Set whether the profile ignores energy shields.
    #[must_use]
    pub fn with_ignores_shields(mut self, ignores: bool) -> Self {
        self.ignores_shields = ignores;
        self
    }

    /// Add a status effect this profile may inflict.
    #[must_use]
    pub fn with_status_effect(mut self, definition: StatusEffectDefinition) -> Self {
        self.status_effects.push(definition);
        self
    }

    /// Attach an area of effect template.
    #[must_use]
    pub fn with_area_of_effect(mut self, template: AreaOfEffectTemplate) -> Self {
        self.area_of_effect = Some(Box::new(template));
        self
    }

    /// Check if the profile can deal damage at all.
    #[must_use]
    pub fn has_damage_range(&self) -> bool {
        self.stats.contains(StatId::MinimumAttackDamageValue)
            && self.stats.contains(StatId::MaximumAttackDamageValue)
    }

    /// Chance of inflicting a carried status effect, as a percentage.
    ///
    /// The effect's own infliction stat wins over the source's.
    #[must_use]
    pub fn infliction_chance_percent(&self, definition: &StatusEffectDefinition) -> f64 {
        definition
            .stats
            .try_total(StatId::StatusEffectInflictionChancePercent)
            .unwrap_or_else(|| self.stats.total(StatId::StatusEffectInflictionChancePercent))
    }

    /// Raise a stat on this profile and everything it carries.
    ///
    /// Touches the profile's stats, each carried status effect, and the
    /// attached area of effect (which recurses the same way). Raising
    /// [`StatId::AreaOfEffectRadiusValue`] also resizes the area template.
    pub fn level_up(&mut self, stat: StatId, levels: u32, fraction: f64) {
        self.stats.level_up(stat, levels, fraction);
        for effect in &mut self.status_effects {
            effect.stats.level_up(stat, levels, fraction);
        }
        let own_radius = self.stats.try_total(StatId::AreaOfEffectRadiusValue);
        if let Some(area) = self.area_of_effect.as_deref_mut() {
            area.profile.level_up(stat, levels, fraction);
            if stat == StatId::AreaOfEffectRadiusValue {
                if let Some(radius) =
                    own_radius.or_else(|| area.profile.stats.try_total(StatId::AreaOfEffectRadiusValue))
                {
                    area.radius = radius;
                }
            }
        }
    }

    /// Restore every stat container to its template.
    pub fn reset(&mut self) {
        self.stats.reset();
        for effect in &mut self.status_effects {
            effect.stats.reset();
        }
        if let Some(area) = self.area_of_effect.as_deref_mut() {
            area.profile.reset();
        }
    }
}

// ============================================================================
// Areas of Effect
// ============================================================================

/// Template for an area of effect an attack can spawn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaOfEffectTemplate {
    /// Template name
    pub name: String,
    /// Damage profile of the spawned area
    pub profile: DamageProfile,
    /// Radius of the spawned area
    pub radius: f64,
    /// Spawn whenever the carrying attack lands a hit
    pub spawns_when_attack_hits: bool,
    /// Seconds until the area despawns; `None` lasts until removed
    pub lifetime_secs: Option<f64>,
}
