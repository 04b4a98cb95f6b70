//! Combat engine facade.
//!
//! This module provides:
//! - `CombatEngine`, which owns the world and every combat system
//! - Attack usage and the collision feed (`on_overlap_start` / `on_overlap_end`)
//! - The per-frame `tick` that drives cooldowns, expiries, regen and damage over time

use std::collections::BTreeMap;

use glam::Vec2;
use thiserror::Error;
use tracing::{debug, info, warn};

use rampart_common::{ConfigError, EntityId, ObjectId, TemplateError, Timestamp};

use crate::attack::{in_range, plan_volley};
use crate::catalog::CombatCatalog;
use crate::config::CombatConfig;
use crate::cooldown::{CooldownAction, CooldownController};
use crate::damage::AreaOfEffectTemplate;
use crate::damaging::{AreaState, DamagingObject};
use crate::events::{CombatEvent, EventBus};
use crate::pipeline::{CombatResolutionPipeline, Mitigation, Resolution, ResolutionContext, ResolutionOutcome};
use crate::pool::{ObjectPool, Recyclable};
use crate::rng::CombatRng;
use crate::scheduler::{
    DamageOverTimeScheduler, DotCommand, DotHost, DotSource, PauseReason, PauseState, SweepReport, TaskQueue,
};
use crate::stat::{ModifyAction, StatId};
use crate::status::{AppliedStack, StatusEffectDefinition, StatusEffectLibrary, StatusEffectStackManager, StatusOutputs};
use crate::vitals::{heal, is_below_cap, Pool, RegenTracker};
use crate::world::{CombatEntity, CombatWorld};

/// Pools that regenerate on their own.
const REGEN_POOLS: [Pool; 2] = [Pool::Health, Pool::EnergyShield];

/// Why an entity could not use an attack.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AttackError {
    /// The entity does not exist
    #[error("Entity {0} does not exist")]
    UnknownEntity(EntityId),

    /// The entity is dead
    #[error("Entity {0} is dead")]
    Dead(EntityId),

    /// A status effect prevents attacking
    #[error("Entity {0} cannot attack")]
    CannotAttack(EntityId),

    /// Nothing is loaded in the slot
    #[error("Entity {entity} has no attack in slot {slot}")]
    UnknownSlot {
        /// Attacking entity
        entity: EntityId,
        /// Requested slot
        slot: u16,
    },

    /// The slot is still cooling down
    #[error("Attack slot {slot} of {entity} is on cooldown")]
    OnCooldown {
        /// Attacking entity
        entity: EntityId,
        /// Requested slot
        slot: u16,
    },

    /// A targeted attack has no living target
    #[error("Entity {0} has no living target")]
    NoTarget(EntityId),

    /// The target is beyond the attack's range
    #[error("Target of {0} is out of range")]
    OutOfRange(EntityId),
}

/// Counters from one engine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Cooldowns that finished
    pub cooldowns_ready: usize,
    /// Status stacks that expired
    pub expired: usize,
    /// Regen ticks that restored something
    pub regen_ticks: usize,
    /// Damage-over-time sweep counters
    pub sweep: SweepReport,
    /// Objects despawned
    pub despawned: usize,
}

// ============================================================================
// Engine
// ============================================================================

/// Owns the combat world and every system that acts on it.
///
/// The host feeds positions, targets and collisions in, calls [`tick`]
/// once per frame and drains the event bus afterwards.
///
/// [`tick`]: CombatEngine::tick
#[derive(Debug)]
pub struct CombatEngine {
    config: CombatConfig,
    catalog: CombatCatalog,
    world: CombatWorld,
    pipeline: CombatResolutionPipeline,
    cooldowns: CooldownController,
    statuses: StatusEffectStackManager,
    dots: DamageOverTimeScheduler,
    regen: RegenTracker,
    lifetimes: TaskQueue<ObjectId>,
    pause: PauseState,
    events: EventBus,
    entity_pools: BTreeMap<String, ObjectPool<CombatEntity>>,
    pending: Vec<DotCommand>,
    now: Timestamp,
}

impl CombatEngine {
    /// Build an engine and all of its systems.
    pub fn new(config: CombatConfig, catalog: CombatCatalog, rng: Box<dyn CombatRng>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Combat engine ready: {} status effects, {} attacks",
            catalog.library().len(),
            catalog.attack_names().count()
        );
        Ok(Self {
            pipeline: CombatResolutionPipeline::new(config.clone(), rng),
            cooldowns: CooldownController::new(config.cooldown_floors()),
            statuses: StatusEffectStackManager::new(config.minimum_cooldown_secs),
            dots: DamageOverTimeScheduler::new(config.sweep_budget()),
            regen: RegenTracker::new(),
            lifetimes: TaskQueue::new(),
            pause: PauseState::new(),
            events: EventBus::new(config.event_capacity),
            entity_pools: BTreeMap::new(),
            pending: Vec::new(),
            now: Timestamp::ZERO,
            world: CombatWorld::new(),
            catalog,
            config,
        })
    }

    // === Accessors ===

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Loaded content.
    #[must_use]
    pub const fn catalog(&self) -> &CombatCatalog {
        &self.catalog
    }

    /// Entities and damaging objects.
    #[must_use]
    pub const fn world(&self) -> &CombatWorld {
        &self.world
    }

    /// Mutable world, for host updates to positions, targets and movement.
    pub fn world_mut(&mut self) -> &mut CombatWorld {
        &mut self.world
    }

    /// Active status stacks.
    #[must_use]
    pub const fn statuses(&self) -> &StatusEffectStackManager {
        &self.statuses
    }

    /// Attack and defense cooldowns.
    #[must_use]
    pub const fn cooldowns(&self) -> &CooldownController {
        &self.cooldowns
    }

    /// Damage-over-time entries.
    #[must_use]
    pub const fn dot_scheduler(&self) -> &DamageOverTimeScheduler {
        &self.dots
    }

    /// Event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Take every pending event.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Time of the last tick.
    #[must_use]
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    /// Check if a pool is regenerating.
    #[must_use]
    pub fn is_regenerating(&self, entity: EntityId, pool: Pool) -> bool {
        self.regen.is_running(entity, pool)
    }

    // === Pause ===

    /// Pause every timer.
    pub fn pause(&mut self, reason: PauseReason) {
        self.pause.pause(reason);
    }

    /// Resume if paused for `reason`.
    pub fn resume_from(&mut self, reason: PauseReason) {
        self.pause.resume_from(reason);
    }

    /// Resume regardless of reason.
    pub fn resume(&mut self) {
        self.pause.force_resume();
    }

    /// Check if timers are paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    // === Entities ===

    /// Spawn a catalog entity, reusing a pooled one when available.
    pub fn spawn_entity(&mut self, name: &str, position: Vec2) -> Result<EntityId, TemplateError> {
        let mut entity = match self.entity_pools.get_mut(name).and_then(ObjectPool::acquire) {
            Some(mut recycled) => {
                recycled.id = EntityId::new();
                recycled
            },
            None => self.catalog.entity(name)?,
        };
        entity.position = position;
        Ok(self.insert_entity(entity))
    }

    /// Add a prebuilt entity.
    pub fn insert_entity(&mut self, entity: CombatEntity) -> EntityId {
        let id = self.world.insert_entity(entity);
        self.refresh_regen(id);
        debug!("Entity {} joined combat", id);
        id
    }

    /// Remove an entity and everything scheduled for it. Its state returns
    /// to the pool for the next spawn of the same name.
    pub fn despawn_entity(&mut self, id: EntityId) -> bool {
        self.forget_entity(id);
        let Some(entity) = self.world.remove_entity(id) else {
            return false;
        };
        debug!("Entity {} left combat", id);
        self.entity_pools
            .entry(entity.name.clone())
            .or_default()
            .release(entity);
        true
    }

    /// Restore an entity to its freshly spawned state in place.
    ///
    /// Drops its stacks, cooldowns, regen and damage-over-time entries and
    /// resets every stat container it owns from its template.
    pub fn reset(&mut self, id: EntityId) -> bool {
        self.forget_entity(id);
        let Some(entity) = self.world.entity_mut(id) else {
            return false;
        };
        entity.recycle();
        true
    }

    /// Raise stats on an entity, cascading into its attacks.
    ///
    /// Each `(stat, levels)` pair adds `starting_base * levels * level_up_fraction`
    /// in the stat's improving direction.
    pub fn level_up_stats(&mut self, id: EntityId, deltas: &[(StatId, u32)]) -> bool {
        let fraction = self.config.level_up_fraction;
        let Some(entity) = self.world.entity_mut(id) else {
            return false;
        };
        for &(stat, levels) in deltas {
            entity.stats.level_up(stat, levels, fraction);
            for attack in &mut entity.attacks {
                attack.profile.level_up(stat, levels, fraction);
            }
        }
        info!("{} gained {} stat levels", entity.name, deltas.len());
        self.refresh_regen(id);
        true
    }

    // === Combat ===

    /// Resolve one hit of a damaging object on a target and act on the result.
    pub fn resolve_attack(&mut self, source: ObjectId, target: EntityId) -> Resolution {
        let (object, entities) = self.world.split_object_mut(source);
        let attacker = object.as_ref().and_then(|o| o.attacker);
        let mut ctx = ResolutionContext {
            entities,
            cooldowns: &mut self.cooldowns,
            statuses: &mut self.statuses,
            library: self.catalog.library(),
            dots: &mut self.pending,
            events: &self.events,
        };
        let resolution = self.pipeline.resolve(object, target, &mut ctx);
        self.follow_up(attacker, target, &resolution);
        resolution
    }

    /// Apply one stack of a status effect.
    pub fn apply_status_effect(
        &mut self,
        target: EntityId,
        definition: &StatusEffectDefinition,
        attacker: Option<EntityId>,
    ) -> Option<AppliedStack> {
        let library = self.catalog.library();
        let entity = self.world.entity_mut(target)?;
        let mut out = StatusOutputs {
            dots: &mut self.pending,
            events: &self.events,
        };
        let applied = self.statuses.apply(entity, definition, attacker, library, &mut out);
        self.flush_dots();
        applied
    }

    /// Fire the attack in `slot`, spawning every projectile of the volley.
    ///
    /// A paralysed entity rolls for a stun first. Targeted attacks need a
    /// living target in range. On success the slot starts cooling down and
    /// one `AttackSpawned` event is published per projectile.
    pub fn use_attack(&mut self, id: EntityId, slot: u16) -> Result<Vec<ObjectId>, AttackError> {
        {
            let library = self.catalog.library();
            let entity = self.world.entity_mut(id).ok_or(AttackError::UnknownEntity(id))?;
            if entity.dead {
                return Err(AttackError::Dead(id));
            }
            let mut out = StatusOutputs {
                dots: &mut self.pending,
                events: &self.events,
            };
            self.statuses
                .paralysis_check(entity, self.pipeline.rng(), library, &mut out);
        }
        self.flush_dots();

        let entity = self.world.entity(id).ok_or(AttackError::UnknownEntity(id))?;
        if !entity.can_attack {
            return Err(AttackError::CannotAttack(id));
        }
        let loadout = entity.attack(slot).ok_or(AttackError::UnknownSlot { entity: id, slot })?;
        if !self.cooldowns.is_ready(id, CooldownAction::Attack(slot)) {
            return Err(AttackError::OnCooldown { entity: id, slot });
        }

        let origin = entity.position;
        let rotation = if loadout.settings.untargeted {
            entity.facing_degrees
        } else {
            let target = entity
                .target
                .and_then(|t| self.world.entity(t))
                .filter(|t| t.is_alive())
                .ok_or(AttackError::NoTarget(id))?;
            if !in_range(
                &loadout.profile.stats,
                origin,
                target.position,
                self.config.shortest_attack_range,
            ) {
                return Err(AttackError::OutOfRange(id));
            }
            heading(origin, target.position).unwrap_or(entity.facing_degrees)
        };

        let threshold = self.config.int_stat_rounding_threshold;
        let volley = plan_volley(&loadout.profile.stats, self.pipeline.rng(), threshold);
        let cooldown = loadout.cooldown_secs(self.config.minimum_attack_cooldown_secs);
        let side = Vec2::from_angle(rotation.to_radians()).perp();
        let objects: Vec<DamagingObject> = volley
            .iter()
            .map(|shot| {
                let position = origin + side * shot.lateral_offset;
                let state = loadout.spawn_state(slot, position, rotation, threshold);
                let mut profile = loadout.profile.clone();
                if !shot.keeps_multistrike {
                    profile
                        .stats
                        .modify_base(StatId::MultistrikeChancePercent, ModifyAction::Set, 0.0);
                }
                DamagingObject::attack(Some(id), state, profile)
            })
            .collect();

        let mut spawned = Vec::with_capacity(objects.len());
        for object in objects {
            let position = object.position().unwrap_or(origin);
            let object_id = self.world.insert_object(object);
            self.events.publish(CombatEvent::AttackSpawned {
                object: object_id,
                attacker: id,
                slot,
                position,
                rotation_degrees: rotation,
            });
            spawned.push(object_id);
        }
        self.cooldowns.start(id, CooldownAction::Attack(slot), cooldown);
        debug!("{} fired slot {} ({} projectiles)", id, slot, spawned.len());
        Ok(spawned)
    }

    /// Spawn an area of effect.
    pub fn spawn_area_of_effect(
        &mut self,
        template: &AreaOfEffectTemplate,
        attacker: Option<EntityId>,
        position: Vec2,
    ) -> ObjectId {
        let state = AreaState {
            position,
            radius: template.radius,
            lifetime_secs: template.lifetime_secs,
        };
        let id = self
            .world
            .insert_object(DamagingObject::area(attacker, state, template.profile.clone()));
        if let Some(lifetime) = template.lifetime_secs {
            self.lifetimes.schedule_once(id, lifetime);
        }
        self.events.publish(CombatEvent::AreaOfEffectSpawned {
            object: id,
            attacker,
            position,
            radius: template.radius,
        });
        debug!("Spawned area '{}' as {}", template.name, id);
        id
    }

    /// Remove a damaging object and its damage-over-time entries.
    pub fn despawn_object(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.world.remove_object(id) else {
            return false;
        };
        if let Some(source) = object.dot_source() {
            self.dots.remove_source(source);
        }
        self.lifetimes.cancel(&id);
        self.events.publish(CombatEvent::ObjectDespawned { object: id });
        debug!("Despawned {}", id);
        true
    }

    // === Collision feed ===

    /// A damaging object started overlapping a target.
    ///
    /// Damage-over-time sources register an entry and return `None`. Other
    /// sources resolve immediately and use up one hit.
    pub fn on_overlap_start(&mut self, source: ObjectId, target: EntityId) -> Option<Resolution> {
        let Some(object) = self.world.object(source) else {
            debug!("Overlap from unknown object {}", source);
            return None;
        };
        if object.profile.does_damage_over_time {
            if let Some(dot) = object.dot_source() {
                self.dots.register(dot, target, self.now);
            }
            return None;
        }

        let resolution = self.resolve_attack(source, target);
        let consumes_hit = !matches!(resolution.outcome, ResolutionOutcome::NoOp(_))
            && !matches!(resolution.mitigation, Some(Mitigation::Reflected));
        if consumes_hit {
            if let Some(state) = self.world.object_mut(source).and_then(DamagingObject::attack_state_mut) {
                state.consume_hit();
            }
        }
        if self.world.object(source).is_some_and(DamagingObject::is_finished) {
            self.despawn_object(source);
        }
        Some(resolution)
    }

    /// A damaging object stopped overlapping a target.
    pub fn on_overlap_end(&mut self, source: ObjectId, target: EntityId) -> bool {
        let Some(dot) = self.world.object(source).and_then(DamagingObject::dot_source) else {
            return false;
        };
        self.dots.remove(dot, target)
    }

    // === Tick ===

    /// Advance every system to `now`.
    ///
    /// While paused nothing advances; the first tick after resuming only
    /// re-anchors the timers, so paused time never becomes a backlog.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let paused = self.pause.is_paused();
        self.now = now;

        let mut report = TickReport {
            cooldowns_ready: self.cooldowns.tick(now, paused).len(),
            ..TickReport::default()
        };
        report.expired = self.expire_statuses(now, paused);
        report.regen_ticks = self.tick_regen(now, paused);
        report.sweep = self.sweep_damage_over_time(now, paused);
        report.despawned = self.despawn_finished(now, paused);
        report
    }

    fn expire_statuses(&mut self, now: Timestamp, paused: bool) -> usize {
        let due = self.statuses.due_expiries(now, paused);
        let mut expired = 0;
        for (target, effect, index) in due {
            let Some(entity) = self.world.entity_mut(target) else {
                warn!("Stack {} of {} outlived {}", index, effect, target);
                continue;
            };
            let mut out = StatusOutputs {
                dots: &mut self.pending,
                events: &self.events,
            };
            if self.statuses.expire(entity, effect, index, &mut out) {
                expired += 1;
            }
        }
        self.flush_dots();
        expired
    }

    fn tick_regen(&mut self, now: Timestamp, paused: bool) -> usize {
        let mut ticks = 0;
        for (id, pool) in self.regen.tick(now, paused) {
            let Some(entity) = self.world.entity_mut(id).filter(|e| e.is_alive()) else {
                self.regen.stop(id, pool);
                continue;
            };
            let Some((amount, _)) = pool.regen_stats() else {
                continue;
            };
            let amount = entity.stats.total(amount);
            let restored = heal(&mut entity.stats, pool, amount);
            if restored > 0.0 {
                ticks += 1;
                self.events.publish(CombatEvent::Healed {
                    target: id,
                    pool,
                    amount: restored,
                });
            }
            if !is_below_cap(&entity.stats, pool) {
                self.regen.stop(id, pool);
            }
        }
        ticks
    }

    fn sweep_damage_over_time(&mut self, now: Timestamp, paused: bool) -> SweepReport {
        let mut host = SweepHost {
            world: &mut self.world,
            pipeline: &mut self.pipeline,
            cooldowns: &mut self.cooldowns,
            statuses: &mut self.statuses,
            library: self.catalog.library(),
            events: &self.events,
            pending: &mut self.pending,
            floor: self.config.minimum_cooldown_secs,
            landed: Vec::new(),
        };
        let report = self.dots.sweep(now, paused, &mut host);
        let landed = host.landed;

        self.flush_dots();
        for (attacker, target, resolution) in landed {
            self.follow_up(attacker, target, &resolution);
        }
        report
    }

    fn despawn_finished(&mut self, now: Timestamp, paused: bool) -> usize {
        let mut finished = self.lifetimes.advance(now, paused);
        finished.extend(
            self.world
                .objects()
                .filter(|o| o.is_finished())
                .map(|o| o.id),
        );
        finished
            .into_iter()
            .filter(|id| self.despawn_object(*id))
            .count()
    }

    // === Internals ===

    /// Act on what a resolution asked for: area spawns, counters, death
    /// cleanup and regen.
    fn follow_up(&mut self, attacker: Option<EntityId>, target: EntityId, resolution: &Resolution) {
        self.flush_dots();

        if let Some(template) = &resolution.spawn_area {
            if let Some(position) = self.world.entity(target).map(|e| e.position) {
                self.spawn_area_of_effect(template, attacker, position);
            }
        }
        if let Some(defender) = resolution.counter_attack {
            self.counter_attack(defender, attacker);
        }
        if resolution.killed() {
            self.handle_death(target);
        } else if resolution.damage > 0.0 {
            self.refresh_regen(target);
        }
        if let Some(attacker) = attacker {
            self.refresh_regen(attacker);
        }
    }

    /// Fire the defender's first ready attack back at the attacker.
    fn counter_attack(&mut self, defender: EntityId, against: Option<EntityId>) {
        let Some(entity) = self.world.entity_mut(defender) else {
            return;
        };
        if against.is_some() {
            entity.target = against;
        }
        let slots = entity.attacks.len();
        let slot = (0..slots)
            .filter_map(|s| u16::try_from(s).ok())
            .find(|s| self.cooldowns.is_ready(defender, CooldownAction::Attack(*s)));
        let Some(slot) = slot else {
            debug!("{} has no ready attack to counter with", defender);
            return;
        };
        match self.use_attack(defender, slot) {
            Ok(objects) => debug!("{} countered with {} projectiles", defender, objects.len()),
            Err(e) => debug!("Counter attack failed: {e}"),
        }
    }

    fn handle_death(&mut self, id: EntityId) {
        self.dots.remove_target(id);
        self.cooldowns.clear_entity(id);
        self.regen.clear_entity(id);
        if let Some(entity) = self.world.entity_mut(id) {
            let mut out = StatusOutputs {
                dots: &mut self.pending,
                events: &self.events,
            };
            self.statuses.clear_target(entity, &mut out);
        }
        self.flush_dots();
    }

    fn forget_entity(&mut self, id: EntityId) {
        self.dots.remove_target(id);
        self.cooldowns.clear_entity(id);
        self.regen.clear_entity(id);
        self.statuses.forget_target(id);
    }

    /// Start regen for every pool of a living entity that is below its cap.
    fn refresh_regen(&mut self, id: EntityId) {
        let Some(entity) = self.world.entity(id).filter(|e| e.is_alive()) else {
            return;
        };
        for pool in REGEN_POOLS {
            let Some((amount, interval)) = pool.regen_stats() else {
                continue;
            };
            if entity.stats.total(amount) <= 0.0 || !is_below_cap(&entity.stats, pool) {
                continue;
            }
            let interval = entity.stats.total(interval).max(self.config.minimum_cooldown_secs);
            self.regen.ensure(id, pool, interval);
        }
    }

    fn flush_dots(&mut self) {
        if !self.pending.is_empty() {
            self.dots.apply(self.pending.drain(..), self.now);
        }
    }
}

/// Heading in degrees from `from` to `to`, or `None` if they coincide.
fn heading(from: Vec2, to: Vec2) -> Option<f32> {
    let delta = to - from;
    (delta.length_squared() > f32::EPSILON).then(|| delta.y.atan2(delta.x).to_degrees())
}

// ============================================================================
// Damage-over-time host
// ============================================================================

/// Everything a sweep needs, borrowed from the engine apart from the scheduler.
struct SweepHost<'a> {
    world: &'a mut CombatWorld,
    pipeline: &'a mut CombatResolutionPipeline,
    cooldowns: &'a mut CooldownController,
    statuses: &'a mut StatusEffectStackManager,
    library: &'a StatusEffectLibrary,
    events: &'a EventBus,
    pending: &'a mut Vec<DotCommand>,
    floor: f64,
    landed: Vec<(Option<EntityId>, EntityId, Resolution)>,
}

impl DotHost for SweepHost<'_> {
    fn tick_interval(&self, source: DotSource, target: EntityId) -> Option<f64> {
        if !self.world.entities().is_alive(target) {
            return None;
        }
        match source {
            DotSource::Attack(id) | DotSource::AreaOfEffect(id) => self
                .world
                .object(id)
                .filter(|o| !o.is_finished())
                .map(|o| o.tick_interval(self.floor)),
            DotSource::StatusEffect(effect) => self.statuses.dot_interval(target, effect),
        }
    }

    fn fire(&mut self, source: DotSource, target: EntityId) {
        let (attacker, resolution) = match source {
            DotSource::Attack(id) | DotSource::AreaOfEffect(id) => {
                let (object, entities) = self.world.split_object_mut(id);
                let attacker = object.as_ref().and_then(|o| o.attacker);
                let mut ctx = ResolutionContext {
                    entities,
                    cooldowns: &mut *self.cooldowns,
                    statuses: &mut *self.statuses,
                    library: self.library,
                    dots: &mut *self.pending,
                    events: self.events,
                };
                (attacker, self.pipeline.resolve(object, target, &mut ctx))
            },
            DotSource::StatusEffect(effect) => {
                let Some((_, profile, attacker)) = self.statuses.dot_tick(target, effect) else {
                    return;
                };
                let mut tick = DamagingObject::status_tick(effect, attacker, profile);
                let mut ctx = ResolutionContext {
                    entities: self.world.entities_mut(),
                    cooldowns: &mut *self.cooldowns,
                    statuses: &mut *self.statuses,
                    library: self.library,
                    dots: &mut *self.pending,
                    events: self.events,
                };
                (attacker, self.pipeline.resolve(Some(&mut tick), target, &mut ctx))
            },
        };
        if !matches!(resolution.outcome, ResolutionOutcome::NoOp(_)) {
            self.landed.push((attacker, target, resolution));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
