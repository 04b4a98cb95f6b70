//! Runtime damaging objects.
//!
//! Attacks, areas of effect and status effect ticks all resolve through the
//! same pipeline. They share a [`DamageProfile`] and differ only in the
//! per-kind state carried by [`DamagingObjectKind`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use rampart_common::{EntityId, ObjectId};

use crate::damage::DamageProfile;
use crate::scheduler::DotSource;
use crate::stat::StatId;
use crate::status::StatusEffectId;

/// Flight state of a spawned attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackState {
    /// Loadout slot that fired the attack
    pub slot: u16,
    /// Times the attack has been reflected
    pub reflect_count: u32,
    /// Reflections allowed before the attack finishes
    pub max_reflections: u32,
    /// Whether reflections count towards finishing
    pub reflectable: bool,
    /// Set once the attack has used up its hits
    pub has_made_final_hit: bool,
    /// Hits left before the final hit
    pub hits_remaining: u32,
    /// Where travel distance is measured from
    pub origin: Vec2,
    /// Current position, updated by the host
    pub position: Vec2,
    /// Heading in degrees
    pub rotation_degrees: f32,
    /// Travel limit as a multiple of attack range
    pub max_travel_distance_multiplier: f64,
}

impl AttackState {
    /// Create flight state for an attack fired from `origin`.
    #[must_use]
    pub fn new(slot: u16, origin: Vec2, rotation_degrees: f32) -> Self {
        Self {
            slot,
            reflect_count: 0,
            max_reflections: 0,
            reflectable: false,
            has_made_final_hit: false,
            hits_remaining: 1,
            origin,
            position: origin,
            rotation_degrees,
            max_travel_distance_multiplier: 1.0,
        }
    }

    /// Distance travelled since the origin was last reset.
    #[must_use]
    pub fn travel_distance(&self) -> f64 {
        f64::from(self.position.distance(self.origin))
    }

    /// Turn the attack by `delta_degrees`.
    pub fn rotate(&mut self, delta_degrees: f32) {
        self.rotation_degrees = (self.rotation_degrees + delta_degrees).rem_euclid(360.0);
    }

    /// Record a reflection: count it, restart travel and turn.
    pub fn reflect(&mut self, delta_degrees: f32) {
        self.reflect_count += 1;
        self.origin = self.position;
        self.rotate(delta_degrees);
    }

    /// Use up one hit. Returns `true` if that was the final hit.
    pub fn consume_hit(&mut self) -> bool {
        self.hits_remaining = self.hits_remaining.saturating_sub(1);
        if self.hits_remaining == 0 {
            self.has_made_final_hit = true;
        }
        self.has_made_final_hit
    }

    /// Check if the attack should end its lifecycle.
    #[must_use]
    pub fn should_finish(&self, attack_range: f64) -> bool {
        self.has_made_final_hit
            || (self.reflectable && self.reflect_count >= self.max_reflections)
            || self.travel_distance() >= attack_range * self.max_travel_distance_multiplier
    }
}

/// State of a spawned area of effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaState {
    /// Center
    pub position: Vec2,
    /// Radius
    pub radius: f64,
    /// Seconds until despawn, if limited
    pub lifetime_secs: Option<f64>,
}

/// Per-kind state of a damaging object.
#[derive(Debug, Clone, PartialEq)]
pub enum DamagingObjectKind {
    /// A projectile or melee swing.
    Attack(AttackState),
    /// A persistent zone.
    AreaOfEffect(AreaState),
    /// A status effect tick on the entity carrying it.
    StatusEffect(StatusEffectId),
}

/// A combat object that can be resolved against a target.
#[derive(Debug, Clone, PartialEq)]
pub struct DamagingObject {
    /// Object id
    pub id: ObjectId,
    /// Entity that produced the object
    pub attacker: Option<EntityId>,
    /// Kind-specific state
    pub kind: DamagingObjectKind,
    /// Damage description
    pub profile: DamageProfile,
}

impl DamagingObject {
    /// Create an attack object.
    #[must_use]
    pub fn attack(attacker: Option<EntityId>, state: AttackState, profile: DamageProfile) -> Self {
        Self {
            id: ObjectId::new(),
            attacker,
            kind: DamagingObjectKind::Attack(state),
            profile,
        }
    }

    /// Create an area of effect object.
    #[must_use]
    pub fn area(attacker: Option<EntityId>, state: AreaState, profile: DamageProfile) -> Self {
        Self {
            id: ObjectId::new(),
            attacker,
            kind: DamagingObjectKind::AreaOfEffect(state),
            profile,
        }
    }

    /// Create a transient object for one status effect tick.
    #[must_use]
    pub fn status_tick(effect: StatusEffectId, attacker: Option<EntityId>, profile: DamageProfile) -> Self {
        Self {
            id: ObjectId::from_raw(0),
            attacker,
            kind: DamagingObjectKind::StatusEffect(effect),
            profile,
        }
    }

    /// Attack state, if this is an attack.
    #[must_use]
    pub fn attack_state(&self) -> Option<&AttackState> {
        match &self.kind {
            DamagingObjectKind::Attack(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable attack state, if this is an attack.
    pub fn attack_state_mut(&mut self) -> Option<&mut AttackState> {
        match &mut self.kind {
            DamagingObjectKind::Attack(state) => Some(state),
            _ => None,
        }
    }

    /// Area state, if this is an area of effect.
    #[must_use]
    pub fn area_state(&self) -> Option<&AreaState> {
        match &self.kind {
            DamagingObjectKind::AreaOfEffect(state) => Some(state),
            _ => None,
        }
    }

    /// Current position, for objects that have one.
    #[must_use]
    pub fn position(&self) -> Option<Vec2> {
        match &self.kind {
            DamagingObjectKind::Attack(state) => Some(state.position),
            DamagingObjectKind::AreaOfEffect(state) => Some(state.position),
            DamagingObjectKind::StatusEffect(_) => None,
        }
    }

    /// Damage-over-time source key for this object.
    #[must_use]
    pub fn dot_source(&self) -> Option<DotSource> {
        match &self.kind {
            DamagingObjectKind::Attack(_) => Some(DotSource::Attack(self.id)),
            DamagingObjectKind::AreaOfEffect(_) => Some(DotSource::AreaOfEffect(self.id)),
            DamagingObjectKind::StatusEffect(_) => None,
        }
    }

    /// Seconds between damage-over-time ticks, floored.
    #[must_use]
    pub fn tick_interval(&self, floor: f64) -> f64 {
        self.profile.stats.total(StatId::AttackCooldownTimer).max(floor)
    }

    /// Check if the object has finished its lifecycle.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.kind {
            DamagingObjectKind::Attack(state) => {
                state.should_finish(self.profile.stats.total(StatId::AttackRangeValue))
            },
            DamagingObjectKind::AreaOfEffect(_) | DamagingObjectKind::StatusEffect(_) => false,
        }
    }
}
