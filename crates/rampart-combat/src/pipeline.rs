//! Combat resolution pipeline.
//!
//! This module provides:
//! - The resolution state machine (`NoOp`, `Mitigated`, `Applied`)
//! - Damage and critical rolls
//! - The parry, block and dodge mitigation chain
//! - Armor reduction, pool depletion and life steal
//! - Secondary effects (area spawns, status infliction)

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rampart_common::EntityId;

use crate::config::{CombatConfig, CritResistFormula};
use crate::container::StatContainer;
use crate::cooldown::{CooldownAction, CooldownController};
use crate::damage::{AreaOfEffectTemplate, DamageProfile};
use crate::damaging::DamagingObject;
use crate::events::{CombatEvent, EventBus};
use crate::rng::CombatRng;
use crate::scheduler::DotCommand;
use crate::stat::{ModifyAction, StatId};
use crate::status::{AppliedStack, StatusEffectLibrary, StatusEffectStackManager, StatusOutputs};
use crate::vitals::{deplete_pools, heal, Pool, PoolDamage};
use crate::world::{CombatEntity, EntityArena};

// ============================================================================
// Outcomes
// ============================================================================

/// A defense that reduced or stopped a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mitigation {
    /// Parried.
    Parried,
    /// Blocked and absorbed.
    Blocked,
    /// Blocked and reflected back.
    Reflected,
    /// Dodged entirely.
    Dodged,
    /// Soaked by armor.
    Armor,
}

/// Why a resolution did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoOpReason {
    /// The damage source no longer exists.
    MissingSource,
    /// The target no longer exists.
    MissingTarget,
    /// The target is already dead.
    TargetDead,
    /// The source never had its damage type configured.
    UnsetDamageType,
    /// A stat the resolution needs is missing.
    MissingStat(StatId),
    /// The roll produced no damage.
    ZeroDamage,
}

/// Terminal state of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// Nothing happened and no state changed.
    NoOp(NoOpReason),
    /// A defense stopped the hit.
    Mitigated(Mitigation),
    /// Damage or healing landed.
    Applied,
}

/// Everything one resolution did.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Terminal state
    pub outcome: ResolutionOutcome,
    /// Damage that reached the pools, or the amount healed
    pub damage: f64,
    /// Per-pool damage split
    pub split: PoolDamage,
    /// The hit was critical
    pub critical: bool,
    /// Defense that triggered, even if damage still landed
    pub mitigation: Option<Mitigation>,
    /// Defender that earned a counter attack
    pub counter_attack: Option<EntityId>,
    /// Area of effect to spawn on the target
    pub spawn_area: Option<AreaOfEffectTemplate>,
    /// Status stacks applied to the target
    pub inflicted: Vec<AppliedStack>,
}

impl Resolution {
    fn new(outcome: ResolutionOutcome) -> Self {
        Self {
            outcome,
            damage: 0.0,
            split: PoolDamage::default(),
            critical: false,
            mitigation: None,
            counter_attack: None,
            spawn_area: None,
            inflicted: Vec::new(),
        }
    }

    fn no_op(reason: NoOpReason) -> Self {
        Self::new(ResolutionOutcome::NoOp(reason))
    }

    /// Check if the target died from this hit.
    #[must_use]
    pub const fn killed(&self) -> bool {
        self.split.killed
    }
}

/// Collaborators a resolution reads and writes.
#[derive(Debug)]
pub struct ResolutionContext<'a> {
    /// Every entity
    pub entities: &'a mut EntityArena,
    /// Defense and attack cooldowns
    pub cooldowns: &'a mut CooldownController,
    /// Active status stacks
    pub statuses: &'a mut StatusEffectStackManager,
    /// Status effect definitions
    pub library: &'a StatusEffectLibrary,
    /// Deferred damage-over-time changes
    pub dots: &'a mut Vec<DotCommand>,
    /// Event bus
    pub events: &'a EventBus,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Damage after the roll, before any defense.
#[derive(Debug, Clone, Copy)]
struct Roll {
    damage: f64,
    critical: bool,
}

/// Defender totals read by the mitigation chain.
#[derive(Debug, Clone, Copy)]
struct Defense {
    parry_chance: f64,
    parry_cooldown: f64,
    counter_chance: f64,
    block_chance: f64,
    block_cooldown: f64,
    block_amount: f64,
    reflect_chance: f64,
    dodge_chance: f64,
    dodge_cooldown: f64,
}

impl Defense {
    fn read(stats: &StatContainer) -> Self {
        Self {
            parry_chance: stats.total(StatId::ParryAttackChancePercent),
            parry_cooldown: stats.total(StatId::ParryCooldownTimer),
            counter_chance: stats.total(StatId::CounterAttackChancePercent),
            block_chance: stats.total(StatId::BlockChancePercent),
            block_cooldown: stats.total(StatId::BlockCooldownTimer),
            block_amount: stats.total(StatId::BlockAmountValue),
            reflect_chance: stats.total(StatId::ReflectDamageChancePercent),
            dodge_chance: stats.total(StatId::DodgeChancePercent),
            dodge_cooldown: stats.total(StatId::DodgeCooldownTimer),
        }
    }
}

/// Resolves damage sources against targets.
pub struct CombatResolutionPipeline {
    config: CombatConfig,
    rng: Box<dyn CombatRng>,
}

impl std::fmt::Debug for CombatResolutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatResolutionPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CombatResolutionPipeline {
    /// Create a pipeline drawing from `rng`.
    #[must_use]
    pub fn new(config: CombatConfig, rng: Box<dyn CombatRng>) -> Self {
        Self { config, rng }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Random source, shared with attack planning.
    pub fn rng(&mut self) -> &mut dyn CombatRng {
        self.rng.as_mut()
    }

    /// Resolve one hit of `source` on `target`.
    ///
    /// Missing participants, unset damage types and missing stats end the
    /// attempt as a no-op without touching any state.
    pub fn resolve(
        &mut self,
        source: Option<&mut DamagingObject>,
        target: EntityId,
        ctx: &mut ResolutionContext<'_>,
    ) -> Resolution {
        let Some(source) = source else {
            debug!("Resolution against {} skipped: source is gone", target);
            return Resolution::no_op(NoOpReason::MissingSource);
        };
        if let Err(reason) = precheck(source, target, ctx.entities) {
            debug!("Resolution of {} against {} skipped: {:?}", source.id, target, reason);
            return Resolution::no_op(reason);
        }
        let Some(defender) = ctx.entities.get(target) else {
            return Resolution::no_op(NoOpReason::MissingTarget);
        };

        let roll = self.roll_damage(&source.profile, defender);
        if roll.damage <= 0.0 {
            debug!("{} rolled no damage against {}", source.id, target);
            let mut resolution = Resolution::no_op(NoOpReason::ZeroDamage);
            resolution.critical = roll.critical;
            return resolution;
        }

        if let Some(pool) = source.profile.heals {
            return self.resolve_heal(source, target, pool, roll, ctx);
        }

        let mut resolution = Resolution::new(ResolutionOutcome::Applied);
        resolution.critical = roll.critical;
        let mut damage = roll.damage;

        if !source.profile.damage_types.is_true_damage() {
            match self.mitigate(source, target, damage, &mut resolution, ctx) {
                Some(reduced) => damage = reduced,
                None => return resolution,
            }
            if let Some(mitigation) = resolution.mitigation {
                if damage <= 0.0 {
                    resolution.outcome = ResolutionOutcome::Mitigated(mitigation);
                    return resolution;
                }
            }

            if source.profile.is_physical {
                damage = apply_armor(source, target, damage, ctx.entities);
                if damage <= 0.0 {
                    let mitigation = resolution.mitigation.unwrap_or(Mitigation::Armor);
                    ctx.events.publish(CombatEvent::Mitigated {
                        target,
                        attacker: source.attacker,
                        mitigation,
                    });
                    resolution.outcome = ResolutionOutcome::Mitigated(mitigation);
                    return resolution;
                }
            }
        }

        self.land_damage(source, target, damage, &mut resolution, ctx);
        resolution
    }

    fn roll_damage(&mut self, profile: &DamageProfile, defender: &CombatEntity) -> Roll {
        // Debuffs can drive any of these below zero
        let crit_resist = (defender.stats.total(StatId::CriticalHitResistancePercent) / 100.0).max(0.0);
        let crit_damage_resist = (defender.stats.total(StatId::CriticalDamageResistancePercent) / 100.0).max(0.0);

        let max = profile.stats.total(StatId::MaximumAttackDamageValue).max(0.0);
        let min = profile
            .stats
            .total(StatId::MinimumAttackDamageValue)
            .clamp(0.0, max);
        let mut damage = self.rng.range(min, max);

        let crit_chance = (profile.stats.total(StatId::CriticalHitChancePercent) / 100.0).max(0.0);
        let threshold = crit_chance - crit_resist;
        let critical = threshold > 0.0 && self.rng.next_f64() < threshold;
        if critical {
            damage *= 1.0 + profile.stats.total(StatId::CriticalHitDamageMultiplier).max(0.0) / 100.0;
            match self.config.crit_resist_formula {
                CritResistFormula::Literal => damage -= damage * (1.0 + crit_damage_resist),
                CritResistFormula::Scaled => damage *= (1.0 - crit_damage_resist).max(0.0),
            }
        }

        Roll {
            damage: damage.max(0.0),
            critical,
        }
    }

    fn resolve_heal(
        &mut self,
        source: &DamagingObject,
        target: EntityId,
        pool: Pool,
        roll: Roll,
        ctx: &mut ResolutionContext<'_>,
    ) -> Resolution {
        let Some(entity) = ctx.entities.get_mut(target) else {
            return Resolution::no_op(NoOpReason::MissingTarget);
        };
        if !entity.stats.contains(pool.current_stat()) {
            return Resolution::no_op(NoOpReason::MissingStat(pool.current_stat()));
        }

        let restored = heal(&mut entity.stats, pool, roll.damage);
        if restored > 0.0 {
            ctx.events.publish(CombatEvent::Healed {
                target,
                pool,
                amount: restored,
            });
        }
        debug!("{} healed {} {:?} by {:.2}", source.id, target, pool, restored);

        let mut resolution = Resolution::new(ResolutionOutcome::Applied);
        resolution.critical = roll.critical;
        resolution.damage = restored;
        self.trigger_secondary(source, target, &mut resolution, ctx);
        resolution
    }

    /// Run the mitigation chain. Returns the reduced damage, or `None` if a
    /// dodge ended the resolution.
    fn mitigate(
        &mut self,
        source: &mut DamagingObject,
        target: EntityId,
        mut damage: f64,
        resolution: &mut Resolution,
        ctx: &mut ResolutionContext<'_>,
    ) -> Option<f64> {
        let Some(defense) = ctx.entities.get(target).map(|d| Defense::read(&d.stats)) else {
            return Some(damage);
        };
        let physical = source.profile.is_physical;

        // Parry
        if physical
            && source.profile.is_blockable
            && ctx.cooldowns.is_ready(target, CooldownAction::Parry)
            && self.succeeds(defense.parry_chance, false)
        {
            ctx.cooldowns.start(
                target,
                CooldownAction::Parry,
                defense.parry_cooldown,
            );
            if self.succeeds(defense.counter_chance, false) {
                resolution.counter_attack = Some(target);
                ctx.events.publish(CombatEvent::CounterAttack {
                    entity: target,
                    against: source.attacker,
                });
            }
            let angle = self.reflection_angle();
            if let Some(state) = source.attack_state_mut() {
                state.rotate(angle);
            }
            damage *= self.config.parry_damage_factor;
            record_mitigation(Mitigation::Parried, source, target, resolution, ctx.events);
            return Some(damage);
        }

        // Block
        if physical
            && ctx.cooldowns.is_ready(target, CooldownAction::Block)
            && self.succeeds(defense.block_chance, true)
        {
            ctx.cooldowns.start(
                target,
                CooldownAction::Block,
                defense.block_cooldown,
            );
            let reflects = source.attack_state().is_some()
                && self.succeeds(defense.reflect_chance, true);
            if reflects {
                damage *= self.config.reflect_damage_factor;
                self.reflect(source, target, ctx);
                record_mitigation(Mitigation::Reflected, source, target, resolution, ctx.events);
            } else {
                damage -= defense.block_amount.max(0.0);
                record_mitigation(Mitigation::Blocked, source, target, resolution, ctx.events);
            }
            return Some(damage.max(0.0));
        }

        // Dodge
        if ctx.cooldowns.is_ready(target, CooldownAction::Dodge)
            && self.succeeds(defense.dodge_chance, true)
        {
            ctx.cooldowns.start(
                target,
                CooldownAction::Dodge,
                defense.dodge_cooldown,
            );
            record_mitigation(Mitigation::Dodged, source, target, resolution, ctx.events);
            resolution.outcome = ResolutionOutcome::Mitigated(Mitigation::Dodged);
            return None;
        }

        Some(damage)
    }

    /// Turn a blocked attack around, scaling its damage for the return trip.
    fn reflect(&mut self, source: &mut DamagingObject, defender: EntityId, ctx: &ResolutionContext<'_>) {
        let multiplier = source.profile.stats.total(StatId::ReflectedAttackDamageMultiplier) / 100.0;
        for stat in [StatId::MinimumAttackDamageValue, StatId::MaximumAttackDamageValue] {
            let reflected = source.profile.stats.total(stat) * multiplier;
            source.profile.stats.modify_base(stat, ModifyAction::Set, reflected);
        }

        let angle = self.reflection_angle();
        let object = source.id;
        if let Some(state) = source.attack_state_mut() {
            state.reflect(angle);
            ctx.events.publish(CombatEvent::Reflected {
                object,
                defender,
                reflect_count: state.reflect_count,
            });
        }
    }

    fn land_damage(
        &mut self,
        source: &DamagingObject,
        target: EntityId,
        damage: f64,
        resolution: &mut Resolution,
        ctx: &mut ResolutionContext<'_>,
    ) {
        let Some(entity) = ctx.entities.get_mut(target) else {
            return;
        };
        let split = deplete_pools(&mut entity.stats, damage, source.profile.ignores_shields);
        resolution.damage = split.total();
        resolution.split = split;

        ctx.events.publish(CombatEvent::Damaged {
            target,
            attacker: source.attacker,
            split,
            critical: resolution.critical,
        });

        if split.killed && !entity.dead {
            entity.dead = true;
            info!("{} ({}) was killed by {}", entity.name, target, source.id);
            ctx.events.publish(CombatEvent::Died {
                entity: target,
                killer: source.attacker,
            });
        }

        steal_life(source, split, ctx);
        self.trigger_secondary(source, target, resolution, ctx);
    }

    fn trigger_secondary(
        &mut self,
        source: &DamagingObject,
        target: EntityId,
        resolution: &mut Resolution,
        ctx: &mut ResolutionContext<'_>,
    ) {
        if let Some(area) = source.profile.area_of_effect.as_deref() {
            if area.spawns_when_attack_hits {
                resolution.spawn_area = Some(area.clone());
            }
        }

        let Some(entity) = ctx.entities.get_mut(target) else {
            return;
        };
        if entity.dead {
            return;
        }
        let resistance = entity.stats.total(StatId::StatusEffectInflictionResistanceValue) / 100.0;
        let mut out = StatusOutputs {
            dots: &mut *ctx.dots,
            events: ctx.events,
        };
        for definition in &source.profile.status_effects {
            let chance = (source.profile.infliction_chance_percent(definition) / 100.0 - resistance).max(0.0);
            if chance <= 0.0 || self.rng.next_f64() >= chance {
                continue;
            }
            if let Some(applied) =
                ctx.statuses
                    .apply(entity, definition, source.attacker, ctx.library, &mut out)
            {
                resolution.inflicted.push(applied);
            }
        }
    }

    /// Roll against a percentage chance. A zero chance never succeeds.
    fn succeeds(&mut self, chance_percent: f64, inclusive: bool) -> bool {
        let chance = (chance_percent / 100.0).max(0.0);
        if chance <= 0.0 {
            return false;
        }
        let roll = self.rng.next_f64();
        if inclusive {
            roll <= chance
        } else {
            roll < chance
        }
    }

    fn reflection_angle(&mut self) -> f32 {
        let limit = self.config.reflection_angle_degrees;
        self.rng.range(-limit, limit) as f32
    }
}

fn precheck(source: &DamagingObject, target: EntityId, entities: &EntityArena) -> Result<(), NoOpReason> {
    let entity = entities.get(target).ok_or(NoOpReason::MissingTarget)?;
    if entity.dead {
        return Err(NoOpReason::TargetDead);
    }
    if source.profile.damage_types.is_unset() {
        return Err(NoOpReason::UnsetDamageType);
    }
    for stat in [StatId::MinimumAttackDamageValue, StatId::MaximumAttackDamageValue] {
        if !source.profile.stats.contains(stat) {
            return Err(NoOpReason::MissingStat(stat));
        }
    }
    if source.profile.heals.is_none() && !entity.stats.contains(StatId::CurrentHealthPointsValue) {
        return Err(NoOpReason::MissingStat(StatId::CurrentHealthPointsValue));
    }
    Ok(())
}

fn apply_armor(source: &DamagingObject, target: EntityId, damage: f64, entities: &EntityArena) -> f64 {
    let armor = entities
        .get(target)
        .map_or(0.0, |entity| entity.stats.total(StatId::ArmorValue));
    let ignored = source.profile.stats.total(StatId::IgnoreArmorAmountValue);
    (damage - (armor - ignored).max(0.0)).max(0.0)
}

/// Return a share of the damage dealt to a living attacker.
///
/// Shield damage feeds the attacker's shield; health and overheal damage
/// feed its health. Steal percentages come from the source, falling back
/// to the attacker's own stats.
fn steal_life(source: &DamagingObject, split: PoolDamage, ctx: &mut ResolutionContext<'_>) {
    let Some(id) = source.attacker else {
        return;
    };
    let Some(attacker) = ctx.entities.get_mut(id) else {
        return;
    };
    if attacker.dead {
        return;
    }

    for (pool, dealt) in [
        (Pool::EnergyShield, split.shield),
        (Pool::Health, split.health + split.overheal),
    ] {
        if dealt <= 0.0 {
            continue;
        }
        let stat = pool.steal_on_hit_stat();
        let percent = source
            .profile
            .stats
            .try_total(stat)
            .unwrap_or_else(|| attacker.stats.total(stat));
        let restored = heal(&mut attacker.stats, pool, dealt * percent / 100.0);
        if restored > 0.0 {
            ctx.events.publish(CombatEvent::Healed {
                target: id,
                pool,
                amount: restored,
            });
        }
    }
}

fn record_mitigation(
    mitigation: Mitigation,
    source: &DamagingObject,
    target: EntityId,
    resolution: &mut Resolution,
    events: &EventBus,
) {
    debug!("{} {:?} {}", target, mitigation, source.id);
    resolution.mitigation = Some(mitigation);
    events.publish(CombatEvent::Mitigated {
        target,
        attacker: source.attacker,
        mitigation,
    });
}

// ============================================================================
// Tests
// ============================================================================
