//! Status effects and their stacks.
//!
//! This module provides:
//! - Status effect identifiers and immutable definitions
//! - A validated definition library
//! - Per-target stack tracking with exact modifier reversal on expiry
//! - Stack conversion (poison into envenomation, chill into freeze)
//! - Action restriction flags and the paralysis check

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use rampart_common::{EntityId, TemplateError, Timestamp};

use crate::container::{stat_values, StatContainer};
use crate::damage::{DamageProfile, DamageTypes};
use crate::events::{CombatEvent, EventBus};
use crate::rng::CombatRng;
use crate::scheduler::{DotCommand, DotSource, TaskQueue};
use crate::stat::{Modifier, StackIndex, StatId, StatKind};
use crate::world::CombatEntity;

// ============================================================================
// Identifiers
// ============================================================================

/// Every status effect in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusEffectId {
    // Buffs
    /// Raised damage.
    PowerSurge,
    /// Raised armor penetration.
    PiercingStrike,
    /// Raised critical chance.
    CriticalBoost,
    /// Raised armor.
    Fortified,
    /// Raised regeneration.
    Regeneration,
    /// Raised resistances.
    Resistance,
    /// Faster attacks.
    Haste,
    /// Raised accuracy.
    Focus,
    /// Raised status potency.
    Empower,
    /// Raised allied stats.
    Inspiration,
    /// Raised resistance to the last damage type taken.
    Adaptive,
    /// Shorter cooldowns.
    CooldownReduction,

    // Debuffs
    /// Physical damage over time.
    Bleeding,
    /// Lowered movement speed.
    Slowed,
    /// Poison damage over time.
    Poisoning,
    /// Stronger poison, converted from poisoning.
    Envenomation,
    /// Lowered damage.
    Weakened,
    /// Lowered defenses.
    Vulnerability,
    /// Fire damage over time.
    Burning,
    /// Cold damage over time.
    Chilled,
    /// Random stuns.
    Paralyzation,
    /// Lowered accuracy.
    Blinded,
    /// Shadow damage over time.
    Cursed,
    /// Unholy damage over time.
    Hexed,
    /// Cannot move or attack.
    Stun,
    /// Pushed away.
    Knockback,
    /// Frozen in place, converted from chill.
    Freeze,
    /// Flees.
    Fear,
    /// Cannot move.
    Immobilize,
}

impl fmt::Display for StatusEffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether an effect helps or hurts its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Improves the target.
    Buff,
    /// Weakens the target.
    Debuff,
}

/// Stats that parameterize an effect rather than modify its target.
#[must_use]
pub const fn is_effect_parameter(stat: StatId) -> bool {
    matches!(
        stat,
        StatId::StatusEffectInflictionChancePercent
            | StatId::StatusEffectDurationTimer
            | StatId::StatusEffectDamageValue
            | StatId::StatusEffectDamageHitRateTimer
            | StatId::StatusEffectDistanceOrRadiusValue
    )
}

// ============================================================================
// Definitions
// ============================================================================

/// Converts a full stack list into one stack of a stronger effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConversion {
    /// Stacks consumed
    pub threshold: u32,
    /// Effect produced
    pub into: StatusEffectId,
}

/// Immutable description of a status effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDefinition {
    /// Effect id
    pub id: StatusEffectId,
    /// Buff or debuff
    pub kind: EffectKind,
    /// Most stacks a target may carry
    pub max_stack_count: u32,
    /// Ticks damage while active
    #[serde(default)]
    pub applies_damage_over_time: bool,
    /// Lowers the target's stats
    #[serde(default)]
    pub reduces_stats: bool,
    /// Restricts the target's actions
    #[serde(default)]
    pub restricts_actions: bool,
    /// Spawns an area of effect
    #[serde(default)]
    pub causes_area_of_effect: bool,
    /// Blocks movement while active
    #[serde(default)]
    pub blocks_movement: bool,
    /// Blocks attacking while active
    #[serde(default)]
    pub blocks_attack: bool,
    /// Damage types of ticks
    #[serde(default)]
    pub damage_types: DamageTypes,
    /// Conversion into a stronger effect
    #[serde(default)]
    pub conversion: Option<StackConversion>,
    /// Effect parameters and per-stack modifier payload
    #[serde(default, with = "stat_values")]
    pub stats: StatContainer,
}

impl StatusEffectDefinition {
    /// Create a definition with no flags and no stats.
    #[must_use]
    pub fn new(id: StatusEffectId, kind: EffectKind, max_stack_count: u32) -> Self {
        Self {
            id,
            kind,
            max_stack_count,
            applies_damage_over_time: false,
            reduces_stats: false,
            restricts_actions: false,
            causes_area_of_effect: false,
            blocks_movement: false,
            blocks_attack: false,
            damage_types: DamageTypes::empty(),
            conversion: None,
            stats: StatContainer::new(),
        }
    }

    /// Set the stats.
    #[must_use]
    pub fn with_stats(mut self, values: impl IntoIterator<Item = (StatId, f64)>) -> Self {
        self.stats = StatContainer::from_values(values);
        self
    }

    /// Make the effect tick damage of the given types.
    #[must_use]
    pub fn with_damage_over_time(mut self, damage_types: DamageTypes) -> Self {
        self.applies_damage_over_time = true;
        self.damage_types = damage_types;
        self
    }

    /// Make the effect restrict movement and/or attacking.
    #[must_use]
    pub fn restricting(mut self, blocks_movement: bool, blocks_attack: bool) -> Self {
        self.restricts_actions = true;
        self.blocks_movement = blocks_movement;
        self.blocks_attack = blocks_attack;
        self
    }

    /// Convert into another effect at a stack count.
    #[must_use]
    pub fn converting(mut self, threshold: u32, into: StatusEffectId) -> Self {
        self.conversion = Some(StackConversion { threshold, into });
        self
    }

    /// Modifiers one stack contributes to its target.
    ///
    /// Percent stats become percent modifiers, everything else is flat.
    /// Debuffs push each stat in its weakening direction, buffs the other way.
    #[must_use]
    pub fn payload(&self) -> Vec<(StatId, Modifier)> {
        self.stats
            .iter()
            .filter(|entry| !is_effect_parameter(entry.name()))
            .map(|entry| {
                let stat = entry.name();
                let action = match self.kind {
                    EffectKind::Debuff => stat.reduction_action(),
                    EffectKind::Buff => stat.improvement_action(),
                };
                let amount = action.sign() * entry.current_total();
                let modifier = match stat.kind() {
                    StatKind::Percent => Modifier::percent(amount),
                    StatKind::Value | StatKind::Timer | StatKind::Multiplier => Modifier::flat(amount),
                };
                (stat, modifier)
            })
            .collect()
    }

    /// Lifetime of one stack, floored.
    #[must_use]
    pub fn duration_secs(&self, floor: f64) -> f64 {
        self.stats.total(StatId::StatusEffectDurationTimer).max(floor)
    }

    /// Seconds between damage ticks, floored.
    #[must_use]
    pub fn tick_interval(&self, floor: f64) -> f64 {
        self.stats.total(StatId::StatusEffectDamageHitRateTimer).max(floor)
    }

    /// Damage profile for one tick at the given stack count.
    #[must_use]
    pub fn tick_profile(&self, stacks: u32) -> DamageProfile {
        let damage = self.stats.total(StatId::StatusEffectDamageValue) * f64::from(stacks);
        DamageProfile::new(
            StatContainer::from_values([
                (StatId::MinimumAttackDamageValue, damage),
                (StatId::MaximumAttackDamageValue, damage),
            ]),
            self.damage_types,
        )
        .with_damage_over_time(true)
    }
}

// ============================================================================
// Library
// ============================================================================

/// Validated set of status effect definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusEffectLibrary {
    definitions: BTreeMap<StatusEffectId, StatusEffectDefinition>,
}

impl StatusEffectLibrary {
    /// Build a library, rejecting duplicates and dangling conversions.
    pub fn new(definitions: impl IntoIterator<Item = StatusEffectDefinition>) -> Result<Self, TemplateError> {
        let mut map = BTreeMap::new();
        for definition in definitions {
            let id = definition.id;
            if map.insert(id, definition).is_some() {
                return Err(TemplateError::DuplicateStatusEffect(id.to_string()));
            }
        }

        for definition in map.values() {
            let context = format!("status effect {}", definition.id);
            if definition.max_stack_count == 0 {
                return Err(TemplateError::Invalid {
                    context,
                    reason: "max_stack_count must be at least 1".to_string(),
                });
            }
            if definition.applies_damage_over_time && definition.damage_types.is_unset() {
                return Err(TemplateError::Invalid {
                    context,
                    reason: "damage over time needs damage types".to_string(),
                });
            }
            if let Some(conversion) = definition.conversion {
                if !map.contains_key(&conversion.into) {
                    return Err(TemplateError::UnknownStatusEffect {
                        effect: conversion.into.to_string(),
                        referenced_by: context,
                    });
                }
                if conversion.threshold == 0 || conversion.threshold > definition.max_stack_count {
                    return Err(TemplateError::Invalid {
                        context,
                        reason: format!(
                            "conversion threshold {} outside 1..={}",
                            conversion.threshold, definition.max_stack_count
                        ),
                    });
                }
            }
        }

        Ok(Self { definitions: map })
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: StatusEffectId) -> Option<&StatusEffectDefinition> {
        self.definitions.get(&id)
    }

    /// Iterate over definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &StatusEffectDefinition> {
        self.definitions.values()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ============================================================================
// Active Stacks
// ============================================================================

/// One applied stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackInstance {
    /// Stack index
    pub index: StackIndex,
    /// Entity that applied the stack
    pub attacker: Option<EntityId>,
    /// Modifiers registered on the target, reversed on expiry
    pub contributions: Vec<(StatId, Modifier)>,
}

/// Every live stack of one effect on one target, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStatusEffectStack {
    definition: StatusEffectDefinition,
    instances: Vec<StackInstance>,
    next_index: StackIndex,
}

impl ActiveStatusEffectStack {
    fn new(definition: StatusEffectDefinition) -> Self {
        Self {
            definition,
            instances: Vec::new(),
            next_index: StackIndex::new(0),
        }
    }

    /// Definition of the most recent application.
    #[must_use]
    pub const fn definition(&self) -> &StatusEffectDefinition {
        &self.definition
    }

    /// Live stacks, oldest first.
    #[must_use]
    pub fn instances(&self) -> &[StackInstance] {
        &self.instances
    }

    /// Number of live stacks.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::try_from(self.instances.len()).unwrap_or(u32::MAX)
    }

    /// Entity that applied the newest stack.
    #[must_use]
    pub fn latest_attacker(&self) -> Option<EntityId> {
        self.instances.last().and_then(|instance| instance.attacker)
    }
}

/// A stack that was created by [`StatusEffectStackManager::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedStack {
    /// Effect the stack belongs to (the converted effect after a conversion)
    pub effect: StatusEffectId,
    /// Stack index
    pub index: StackIndex,
}

/// Side-effect sinks used while applying and expiring stacks.
#[derive(Debug)]
pub struct StatusOutputs<'a> {
    /// Damage-over-time registrations and removals
    pub dots: &'a mut Vec<DotCommand>,
    /// Event bus
    pub events: &'a EventBus,
}

/// Tracks every active stack on every target and their expiry timers.
#[derive(Debug, Clone)]
pub struct StatusEffectStackManager {
    active: BTreeMap<EntityId, BTreeMap<StatusEffectId, ActiveStatusEffectStack>>,
    expiries: TaskQueue<(EntityId, StatusEffectId, StackIndex)>,
    duration_floor: f64,
}

impl Default for StatusEffectStackManager {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl StatusEffectStackManager {
    /// Create a manager with a minimum stack lifetime.
    #[must_use]
    pub fn new(duration_floor: f64) -> Self {
        Self {
            active: BTreeMap::new(),
            expiries: TaskQueue::new(),
            duration_floor,
        }
    }

    /// Apply one stack of an effect.
    ///
    /// Returns `None` if the target is dead or already at the stack cap.
    /// When the new stack completes a conversion, the consumed stacks are
    /// removed and the returned stack is the converted effect's.
    pub fn apply(
        &mut self,
        target: &mut CombatEntity,
        definition: &StatusEffectDefinition,
        attacker: Option<EntityId>,
        library: &StatusEffectLibrary,
        out: &mut StatusOutputs<'_>,
    ) -> Option<AppliedStack> {
        let upgrade = definition.conversion.and_then(|conversion| {
            if self.stack_count(target.id, definition.id) + 1 < conversion.threshold {
                return None;
            }
            let upgraded = library.get(conversion.into);
            if upgraded.is_none() {
                warn!(
                    "{} converts into {} which has no definition",
                    definition.id, conversion.into
                );
            }
            upgraded.map(|upgraded| (conversion, upgraded))
        });

        // A conversion either completes or leaves every source stack in place
        if let Some((conversion, upgraded)) = upgrade {
            if self.stack_count(target.id, conversion.into) >= upgraded.max_stack_count {
                debug!(
                    "{} cannot convert {} into {}: already at {} stacks",
                    target.id, definition.id, conversion.into, upgraded.max_stack_count
                );
                return None;
            }
        }

        let applied = self.push_stack(target, definition, attacker, out)?;
        let Some((conversion, upgraded)) = upgrade else {
            return Some(applied);
        };

        self.remove_oldest(target, definition.id, conversion.threshold, out);
        info!(
            "{} converted {}x {} into {}",
            target.id, conversion.threshold, definition.id, conversion.into
        );
        out.events.publish(CombatEvent::StatusConverted {
            target: target.id,
            from: definition.id,
            into: conversion.into,
        });
        self.push_stack(target, upgraded, attacker, out)
    }

    /// Expire one stack, reversing exactly what it contributed.
    ///
    /// Expiring a stack that does not exist means a cancellation was missed;
    /// it panics in debug builds and is logged and skipped otherwise.
    pub fn expire(
        &mut self,
        target: &mut CombatEntity,
        effect: StatusEffectId,
        index: StackIndex,
        out: &mut StatusOutputs<'_>,
    ) -> bool {
        let position = self
            .active
            .get(&target.id)
            .and_then(|effects| effects.get(&effect))
            .and_then(|stack| stack.instances.iter().position(|i| i.index == index));
        debug_assert!(
            position.is_some(),
            "expired missing stack {index} of {effect} on {}",
            target.id
        );
        let Some(position) = position else {
            warn!("Ignoring expiry of missing stack {} of {} on {}", index, effect, target.id);
            return false;
        };

        self.remove_at(target, effect, position, out);
        true
    }

    /// Advance expiry timers and return the stacks that ran out.
    pub fn due_expiries(&mut self, now: Timestamp, paused: bool) -> Vec<(EntityId, StatusEffectId, StackIndex)> {
        self.expiries.advance(now, paused)
    }

    /// Remove every stack from a target, reversing their modifiers.
    pub fn clear_target(&mut self, target: &mut CombatEntity, out: &mut StatusOutputs<'_>) {
        let effects: Vec<StatusEffectId> = self
            .active
            .get(&target.id)
            .map(|effects| effects.keys().copied().collect())
            .unwrap_or_default();
        for effect in effects {
            let count = self.stack_count(target.id, effect);
            self.remove_oldest(target, effect, count, out);
        }
        self.active.remove(&target.id);
    }

    /// Drop every record for a target that no longer exists.
    pub fn forget_target(&mut self, target: EntityId) {
        self.active.remove(&target);
        self.expiries.retain(|(owner, _, _)| *owner != target);
    }

    /// Number of live stacks of an effect on a target.
    #[must_use]
    pub fn stack_count(&self, target: EntityId, effect: StatusEffectId) -> u32 {
        self.stacks(target, effect).map_or(0, ActiveStatusEffectStack::count)
    }

    /// Live stacks of an effect on a target.
    #[must_use]
    pub fn stacks(&self, target: EntityId, effect: StatusEffectId) -> Option<&ActiveStatusEffectStack> {
        self.active.get(&target)?.get(&effect)
    }

    /// Effects active on a target.
    #[must_use]
    pub fn active_effects(&self, target: EntityId) -> Vec<StatusEffectId> {
        self.active
            .get(&target)
            .map(|effects| effects.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Tick interval, damage profile and attacker for a damage-over-time effect.
    ///
    /// Returns `None` once the effect is gone from the target.
    #[must_use]
    pub fn dot_tick(&self, target: EntityId, effect: StatusEffectId) -> Option<(f64, DamageProfile, Option<EntityId>)> {
        let stack = self.stacks(target, effect)?;
        if !stack.definition.applies_damage_over_time || stack.instances.is_empty() {
            return None;
        }
        Some((
            stack.definition.tick_interval(self.duration_floor),
            stack.definition.tick_profile(stack.count()),
            stack.latest_attacker(),
        ))
    }

    /// Tick interval of a damage-over-time effect, if still active.
    #[must_use]
    pub fn dot_interval(&self, target: EntityId, effect: StatusEffectId) -> Option<f64> {
        let stack = self.stacks(target, effect)?;
        (stack.definition.applies_damage_over_time && !stack.instances.is_empty())
            .then(|| stack.definition.tick_interval(self.duration_floor))
    }

    /// Recompute `can_move` and `can_attack` from the target's active stacks.
    pub fn refresh_action_flags(&self, target: &mut CombatEntity) {
        let mut can_move = true;
        let mut can_attack = true;
        if let Some(effects) = self.active.get(&target.id) {
            for stack in effects.values().filter(|s| !s.instances.is_empty()) {
                can_move &= !stack.definition.blocks_movement;
                can_attack &= !stack.definition.blocks_attack;
            }
        }
        target.can_move = can_move;
        target.can_attack = can_attack;
    }

    /// Roll for a paralysis stun before the target acts.
    ///
    /// Returns `true` if the target was stunned.
    pub fn paralysis_check(
        &mut self,
        target: &mut CombatEntity,
        rng: &mut dyn CombatRng,
        library: &StatusEffectLibrary,
        out: &mut StatusOutputs<'_>,
    ) -> bool {
        let Some(stack) = self.stacks(target.id, StatusEffectId::Paralyzation) else {
            return false;
        };
        if stack.instances.is_empty() {
            return false;
        }
        let infliction = stack.definition.stats.total(StatId::StatusEffectInflictionChancePercent) / 100.0;
        let resistance = target.stats.total(StatId::StatusEffectInflictionResistanceValue) / 100.0;
        let chance = (infliction - infliction * resistance).max(0.0);
        if rng.next_f64() > chance {
            return false;
        }

        let Some(stun) = library.get(StatusEffectId::Stun) else {
            warn!("Paralysis triggered but no stun definition is loaded");
            return false;
        };
        debug!("{} paralysed into a stun", target.id);
        self.apply(target, stun, None, library, out).is_some()
    }

    fn push_stack(
        &mut self,
        target: &mut CombatEntity,
        definition: &StatusEffectDefinition,
        attacker: Option<EntityId>,
        out: &mut StatusOutputs<'_>,
    ) -> Option<AppliedStack> {
        if target.dead {
            debug!("Not applying {} to dead {}", definition.id, target.id);
            return None;
        }

        let stack = self
            .active
            .entry(target.id)
            .or_default()
            .entry(definition.id)
            .or_insert_with(|| ActiveStatusEffectStack::new(definition.clone()));
        if stack.count() >= definition.max_stack_count {
            debug!("{} already at {} stacks of {}", target.id, stack.count(), definition.id);
            if stack.instances.is_empty() {
                self.remove_effect_entry(target.id, definition.id);
            }
            return None;
        }

        let index = stack.next_index;
        stack.next_index = index.next();
        if stack.definition != *definition {
            stack.definition = definition.clone();
        }
        let contributions = target
            .stats
            .apply_stack_modifiers(definition.id, index, &definition.payload());
        stack.instances.push(StackInstance {
            index,
            attacker,
            contributions,
        });
        let count = stack.count();

        self.expiries.schedule_once(
            (target.id, definition.id, index),
            definition.duration_secs(self.duration_floor),
        );
        if definition.applies_damage_over_time {
            out.dots.push(DotCommand::Register {
                source: DotSource::StatusEffect(definition.id),
                target: target.id,
            });
        }
        if definition.restricts_actions || definition.blocks_movement || definition.blocks_attack {
            self.refresh_action_flags(target);
        }

        out.events.publish(CombatEvent::StatusApplied {
            target: target.id,
            effect: definition.id,
            stack: index,
            stacks: count,
        });
        Some(AppliedStack {
            effect: definition.id,
            index,
        })
    }

    fn remove_oldest(
        &mut self,
        target: &mut CombatEntity,
        effect: StatusEffectId,
        count: u32,
        out: &mut StatusOutputs<'_>,
    ) {
        for _ in 0..count {
            if self.stack_count(target.id, effect) == 0 {
                break;
            }
            self.remove_at(target, effect, 0, out);
        }
    }

    fn remove_at(
        &mut self,
        target: &mut CombatEntity,
        effect: StatusEffectId,
        position: usize,
        out: &mut StatusOutputs<'_>,
    ) {
        let Some(stack) = self
            .active
            .get_mut(&target.id)
            .and_then(|effects| effects.get_mut(&effect))
        else {
            return;
        };
        if position >= stack.instances.len() {
            return;
        }

        let instance = stack.instances.remove(position);
        target.stats.remove_stack_modifiers(
            effect,
            instance.index,
            instance.contributions.iter().map(|(stat, _)| *stat),
        );
        self.expiries.cancel(&(target.id, effect, instance.index));

        let remaining = stack.count();
        let ticks_damage = stack.definition.applies_damage_over_time;
        let restricts = stack.definition.restricts_actions
            || stack.definition.blocks_movement
            || stack.definition.blocks_attack;

        if remaining == 0 {
            self.remove_effect_entry(target.id, effect);
            if ticks_damage {
                out.dots.push(DotCommand::Remove {
                    source: DotSource::StatusEffect(effect),
                    target: target.id,
                });
            }
            if restricts {
                self.refresh_action_flags(target);
            }
        }

        out.events.publish(CombatEvent::StatusExpired {
            target: target.id,
            effect,
            stacks: remaining,
        });
    }

    fn remove_effect_entry(&mut self, target: EntityId, effect: StatusEffectId) {
        if let Some(effects) = self.active.get_mut(&target) {
            effects.remove(&effect);
            if effects.is_empty() {
                self.active.remove(&target);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;
    use proptest::prelude::*;

    struct Fixture {
        manager: StatusEffectStackManager,
        library: StatusEffectLibrary,
        dots: Vec<DotCommand>,
        events: EventBus,
        target: CombatEntity,
    }

    impl Fixture {
        fn new() -> Self {
            let library = StatusEffectLibrary::new([
                StatusEffectDefinition::new(StatusEffectId::Poisoning, EffectKind::Debuff, 10)
                    .with_damage_over_time(DamageTypes::POISON)
                    .converting(10, StatusEffectId::Envenomation)
                    .with_stats([
                        (StatId::StatusEffectDurationTimer, 5.0),
                        (StatId::StatusEffectDamageValue, 1.0),
                    ]),
                StatusEffectDefinition::new(StatusEffectId::Envenomation, EffectKind::Debuff, 3)
                    .with_damage_over_time(DamageTypes::ENVENOM)
                    .with_stats([(StatId::StatusEffectDurationTimer, 5.0)]),
                StatusEffectDefinition::new(StatusEffectId::Slowed, EffectKind::Debuff, 3).with_stats([
                    (StatId::GroundMovementSpeedValue, 0.5),
                    (StatId::AttackCooldownTimer, 0.25),
                    (StatId::DodgeChancePercent, 10.0),
                    (StatId::StatusEffectDurationTimer, 2.0),
                ]),
                StatusEffectDefinition::new(StatusEffectId::Fortified, EffectKind::Buff, 2)
                    .with_stats([(StatId::ArmorValue, 3.0), (StatId::StatusEffectDurationTimer, 2.0)]),
                StatusEffectDefinition::new(StatusEffectId::Stun, EffectKind::Debuff, 1)
                    .restricting(true, true)
                    .with_stats([(StatId::StatusEffectDurationTimer, 1.0)]),
                StatusEffectDefinition::new(StatusEffectId::Paralyzation, EffectKind::Debuff, 5)
                    .with_stats([
                        (StatId::StatusEffectInflictionChancePercent, 50.0),
                        (StatId::StatusEffectDurationTimer, 3.0),
                    ]),
            ])
            .expect("valid library");

            let target = CombatEntity::new(
                "grunt",
                StatContainer::from_values([
                    (StatId::CurrentHealthPointsValue, 100.0),
                    (StatId::GroundMovementSpeedValue, 2.0),
                    (StatId::AttackCooldownTimer, 1.0),
                    (StatId::DodgeChancePercent, 20.0),
                    (StatId::ArmorValue, 4.0),
                ]),
            );

            let mut manager = StatusEffectStackManager::new(0.1);
            manager.due_expiries(Timestamp::ZERO, false);
            Self {
                manager,
                library,
                dots: Vec::new(),
                events: EventBus::default(),
                target,
            }
        }

        fn apply(&mut self, effect: StatusEffectId) -> Option<AppliedStack> {
            let definition = self.library.get(effect).cloned().expect("defined");
            let mut out = StatusOutputs {
                dots: &mut self.dots,
                events: &self.events,
            };
            self.manager
                .apply(&mut self.target, &definition, None, &self.library, &mut out)
        }

        fn expire(&mut self, effect: StatusEffectId, index: StackIndex) -> bool {
            let mut out = StatusOutputs {
                dots: &mut self.dots,
                events: &self.events,
            };
            self.manager.expire(&mut self.target, effect, index, &mut out)
        }

        fn expire_due(&mut self, now: f64) -> usize {
            let due = self.manager.due_expiries(Timestamp::from_secs(now), false);
            for (_, effect, index) in &due {
                self.expire(*effect, *index);
            }
            due.len()
        }
    }

    #[test]
    fn test_debuff_payload_direction() {
        let mut fx = Fixture::new();
        fx.apply(StatusEffectId::Slowed).expect("applied");

        let stats = &fx.target.stats;
        assert!((stats.total(StatId::GroundMovementSpeedValue) - 1.5).abs() < 1e-9);
        assert!((stats.total(StatId::AttackCooldownTimer) - 1.25).abs() < 1e-9);
        // Percent payloads scale the stat: 20 * (1 - 10 / 100)
        assert!((stats.total(StatId::DodgeChancePercent) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_buff_payload_direction() {
        let mut fx = Fixture::new();
        fx.apply(StatusEffectId::Fortified);
        assert_eq!(fx.target.stats.total(StatId::ArmorValue), 7.0);
    }

    #[test]
    fn test_stack_cap_is_noop() {
        let mut fx = Fixture::new();
        assert!(fx.apply(StatusEffectId::Fortified).is_some());
        assert!(fx.apply(StatusEffectId::Fortified).is_some());
        assert!(fx.apply(StatusEffectId::Fortified).is_none());
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Fortified), 2);
        assert_eq!(fx.target.stats.total(StatId::ArmorValue), 10.0);
    }

    #[test]
    fn test_expiry_reverses_exact_contribution() {
        let mut fx = Fixture::new();
        let first = fx.apply(StatusEffectId::Slowed).expect("applied");
        fx.apply(StatusEffectId::Slowed).expect("applied");

        assert!(fx.expire(StatusEffectId::Slowed, first.index));
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Slowed), 1);
        assert!((fx.target.stats.total(StatId::GroundMovementSpeedValue) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_timed_expiry_removes_entry() {
        let mut fx = Fixture::new();
        fx.apply(StatusEffectId::Slowed);
        assert_eq!(fx.expire_due(1.0), 0);
        assert_eq!(fx.expire_due(2.0), 1);
        assert!(fx.manager.active_effects(fx.target.id).is_empty());
        assert_eq!(fx.target.stats.total(StatId::GroundMovementSpeedValue), 2.0);
    }

    #[test]
    fn test_poison_converts_to_envenomation() {
        let mut fx = Fixture::new();
        for _ in 0..9 {
            let applied = fx.apply(StatusEffectId::Poisoning).expect("applied");
            assert_eq!(applied.effect, StatusEffectId::Poisoning);
        }
        let converted = fx.apply(StatusEffectId::Poisoning).expect("converted");

        assert_eq!(converted.effect, StatusEffectId::Envenomation);
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Poisoning), 0);
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Envenomation), 1);
        assert!(fx.manager.stacks(fx.target.id, StatusEffectId::Poisoning).is_none());

        assert!(fx.dots.contains(&DotCommand::Remove {
            source: DotSource::StatusEffect(StatusEffectId::Poisoning),
            target: fx.target.id,
        }));
        assert!(fx.dots.contains(&DotCommand::Register {
            source: DotSource::StatusEffect(StatusEffectId::Envenomation),
            target: fx.target.id,
        }));
        assert!(fx
            .events
            .drain()
            .iter()
            .any(|e| matches!(e, CombatEvent::StatusConverted { .. })));
    }

    #[test]
    fn test_conversion_into_full_effect_keeps_source_stacks() {
        let mut fx = Fixture::new();
        for _ in 0..30 {
            fx.apply(StatusEffectId::Poisoning);
        }
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Envenomation), 3);
        for _ in 0..9 {
            fx.apply(StatusEffectId::Poisoning).expect("applied");
        }

        assert!(fx.apply(StatusEffectId::Poisoning).is_none());
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Poisoning), 9);
        assert_eq!(fx.manager.stack_count(fx.target.id, StatusEffectId::Envenomation), 3);
    }

    #[test]
    fn test_converted_stacks_do_not_expire_later() {
        let mut fx = Fixture::new();
        for _ in 0..10 {
            fx.apply(StatusEffectId::Poisoning);
        }
        // Only the envenomation stack is still scheduled.
        assert_eq!(fx.expire_due(5.0), 1);
        assert!(fx.manager.active_effects(fx.target.id).is_empty());
    }

    #[test]
    fn test_stun_restricts_actions() {
        let mut fx = Fixture::new();
        let stun = fx.apply(StatusEffectId::Stun).expect("applied");
        assert!(!fx.target.can_move);
        assert!(!fx.target.can_attack);

        fx.expire(StatusEffectId::Stun, stun.index);
        assert!(fx.target.can_move);
        assert!(fx.target.can_attack);
    }

    #[test]
    fn test_paralysis_check() {
        let mut fx = Fixture::new();
        fx.target
            .stats
            .add_entry(StatId::StatusEffectInflictionResistanceValue, 50.0);
        fx.apply(StatusEffectId::Paralyzation);

        // 0.5 - 0.5 * 0.5 = 0.25
        let mut out = StatusOutputs {
            dots: &mut fx.dots,
            events: &fx.events,
        };
        let mut miss = ScriptedRng::constant(0.3);
        assert!(!fx
            .manager
            .paralysis_check(&mut fx.target, &mut miss, &fx.library, &mut out));
        let mut hit = ScriptedRng::constant(0.25);
        assert!(fx
            .manager
            .paralysis_check(&mut fx.target, &mut hit, &fx.library, &mut out));
        assert!(!fx.target.can_attack);
    }

    #[test]
    fn test_dead_target_rejected() {
        let mut fx = Fixture::new();
        fx.target.dead = true;
        assert!(fx.apply(StatusEffectId::Slowed).is_none());
        assert!(fx.manager.active_effects(fx.target.id).is_empty());
    }

    #[test]
    fn test_clear_target_reverses_everything() {
        let mut fx = Fixture::new();
        fx.apply(StatusEffectId::Slowed);
        fx.apply(StatusEffectId::Fortified);
        let mut out = StatusOutputs {
            dots: &mut fx.dots,
            events: &fx.events,
        };
        fx.manager.clear_target(&mut fx.target, &mut out);
        assert_eq!(fx.target.stats.total(StatId::ArmorValue), 4.0);
        assert_eq!(fx.target.stats.total(StatId::GroundMovementSpeedValue), 2.0);
        assert_eq!(fx.expire_due(10.0), 0);
    }

    #[test]
    fn test_library_validation() {
        let duplicate = StatusEffectLibrary::new([
            StatusEffectDefinition::new(StatusEffectId::Burning, EffectKind::Debuff, 1)
                .with_damage_over_time(DamageTypes::FIRE),
            StatusEffectDefinition::new(StatusEffectId::Burning, EffectKind::Debuff, 1)
                .with_damage_over_time(DamageTypes::FIRE),
        ]);
        assert!(matches!(duplicate, Err(TemplateError::DuplicateStatusEffect(_))));

        let dangling = StatusEffectLibrary::new([StatusEffectDefinition::new(
            StatusEffectId::Chilled,
            EffectKind::Debuff,
            10,
        )
        .converting(10, StatusEffectId::Freeze)]);
        assert!(matches!(dangling, Err(TemplateError::UnknownStatusEffect { .. })));

        let untyped = StatusEffectLibrary::new([{
            let mut def = StatusEffectDefinition::new(StatusEffectId::Bleeding, EffectKind::Debuff, 1);
            def.applies_damage_over_time = true;
            def
        }]);
        assert!(matches!(untyped, Err(TemplateError::Invalid { .. })));
    }

    #[test]
    fn test_definition_from_ron() {
        let definition: StatusEffectDefinition = ron::from_str(
            r#"(
                id: Chilled,
                kind: Debuff,
                max_stack_count: 10,
                applies_damage_over_time: true,
                damage_types: "COLD",
                conversion: Some((threshold: 10, into: Freeze)),
                stats: [(StatusEffectDamageValue, 2.0), (StatusEffectDamageHitRateTimer, 0.5)],
            )"#,
        )
        .expect("parses");
        assert_eq!(definition.tick_interval(0.1), 0.5);
        assert_eq!(
            definition.tick_profile(3).stats.total(StatId::MaximumAttackDamageValue),
            6.0
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "expired missing stack")]
    fn test_expiring_missing_stack_panics_in_debug() {
        let mut fx = Fixture::new();
        fx.expire(StatusEffectId::Slowed, StackIndex::new(42));
    }

    proptest! {
        #[test]
        fn test_stack_count_never_exceeds_max(applies in 0usize..30, expiries in 0usize..10) {
            let mut fx = Fixture::new();
            for _ in 0..applies {
                fx.apply(StatusEffectId::Slowed);
                prop_assert!(fx.manager.stack_count(fx.target.id, StatusEffectId::Slowed) <= 3);
            }
            for _ in 0..expiries {
                let oldest = fx
                    .manager
                    .stacks(fx.target.id, StatusEffectId::Slowed)
                    .and_then(|s| s.instances().first().map(|i| i.index));
                if let Some(index) = oldest {
                    fx.expire(StatusEffectId::Slowed, index);
                }
                fx.apply(StatusEffectId::Slowed);
                prop_assert!(fx.manager.stack_count(fx.target.id, StatusEffectId::Slowed) <= 3);
            }
        }
    }
}
