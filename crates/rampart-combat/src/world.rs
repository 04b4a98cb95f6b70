//! Entity and object arenas.
//!
//! Everything in the combat core refers to participants by id. The world
//! owns the records; a missing id simply means the participant is gone.

use glam::Vec2;
use std::collections::BTreeMap;

use rampart_common::{EntityId, ObjectId};

use crate::attack::AttackLoadout;
use crate::container::StatContainer;
use crate::damaging::DamagingObject;
use crate::stat::StatId;

/// A combat participant (tower, enemy, destructible).
#[derive(Debug, Clone, PartialEq)]
pub struct CombatEntity {
    /// Entity id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Entity stats
    pub stats: StatContainer,
    /// Health reached zero
    pub dead: bool,
    /// Movement is allowed (cleared by restricting status effects)
    pub can_move: bool,
    /// Attacking is allowed (cleared by restricting status effects)
    pub can_attack: bool,
    /// Host-reported movement
    pub is_moving: bool,
    /// Host-selected target
    pub target: Option<EntityId>,
    /// Host-reported position
    pub position: Vec2,
    /// Heading in degrees, used by untargeted attacks
    pub facing_degrees: f32,
    /// Usable attacks, indexed by slot
    pub attacks: Vec<AttackLoadout>,
}

impl CombatEntity {
    /// Create a living entity with the given stats.
    #[must_use]
    pub fn new(name: impl Into<String>, stats: StatContainer) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            stats,
            dead: false,
            can_move: true,
            can_attack: true,
            is_moving: false,
            target: None,
            position: Vec2::ZERO,
            facing_degrees: 0.0,
            attacks: Vec::new(),
        }
    }

    /// Set the position.
    #[must_use]
    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Add an attack loadout.
    #[must_use]
    pub fn with_attack(mut self, attack: AttackLoadout) -> Self {
        self.attacks.push(attack);
        self
    }

    /// Check if the entity is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> f64 {
        self.stats.total(StatId::CurrentHealthPointsValue)
    }

    /// Attack in a slot.
    #[must_use]
    pub fn attack(&self, slot: u16) -> Option<&AttackLoadout> {
        self.attacks.get(usize::from(slot))
    }

    /// Restore stats and flags for reuse from an object pool.
    pub fn reset(&mut self) {
        self.stats.reset();
        for attack in &mut self.attacks {
            attack.profile.reset();
        }
        self.dead = false;
        self.can_move = true;
        self.can_attack = true;
        self.is_moving = false;
        self.target = None;
    }
}

/// Entity arena.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    entities: BTreeMap<EntityId, CombatEntity>,
}

impl EntityArena {
    /// Get an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&CombatEntity> {
        self.entities.get(&id)
    }

    /// Get a mutable entity.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut CombatEntity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(CombatEntity::is_alive)
    }

    /// Iterate over entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CombatEntity> {
        self.entities.values()
    }

    /// Entity ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Arena of every entity and live damaging object.
#[derive(Debug, Clone, Default)]
pub struct CombatWorld {
    entities: EntityArena,
    objects: BTreeMap<ObjectId, DamagingObject>,
}

impl CombatWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    pub fn insert_entity(&mut self, entity: CombatEntity) -> EntityId {
        let id = entity.id;
        self.entities.entities.insert(id, entity);
        id
    }

    /// Remove an entity.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<CombatEntity> {
        self.entities.entities.remove(&id)
    }

    /// Add a damaging object.
    pub fn insert_object(&mut self, object: DamagingObject) -> ObjectId {
        let id = object.id;
        self.objects.insert(id, object);
        id
    }

    /// Remove a damaging object.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<DamagingObject> {
        self.objects.remove(&id)
    }

    /// Entity arena.
    #[must_use]
    pub const fn entities(&self) -> &EntityArena {
        &self.entities
    }

    /// Mutable entity arena.
    pub fn entities_mut(&mut self) -> &mut EntityArena {
        &mut self.entities
    }

    /// Get an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&CombatEntity> {
        self.entities.get(id)
    }

    /// Get a mutable entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut CombatEntity> {
        self.entities.get_mut(id)
    }

    /// Get a damaging object.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&DamagingObject> {
        self.objects.get(&id)
    }

    /// Get a mutable damaging object.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut DamagingObject> {
        self.objects.get_mut(&id)
    }

    /// Borrow one object and every entity at the same time.
    pub fn split_object_mut(&mut self, id: ObjectId) -> (Option<&mut DamagingObject>, &mut EntityArena) {
        (self.objects.get_mut(&id), &mut self.entities)
    }

    /// Object ids in order.
    #[must_use]
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Iterate over objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &DamagingObject> {
        self.objects.values()
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::{DamageProfile, DamageTypes};
    use crate::damaging::AttackState;

    #[test]
    fn test_entity_lifecycle() {
        let mut world = CombatWorld::new();
        let id = world.insert_entity(CombatEntity::new(
            "grunt",
            StatContainer::from_values([(StatId::CurrentHealthPointsValue, 10.0)]),
        ));
        assert!(world.entities().is_alive(id));
        assert_eq!(world.entity(id).map(CombatEntity::health), Some(10.0));

        if let Some(entity) = world.entity_mut(id) {
            entity.dead = true;
        }
        assert!(!world.entities().is_alive(id));
        assert!(world.remove_entity(id).is_some());
        assert!(world.entity(id).is_none());
    }

    #[test]
    fn test_split_borrow() {
        let mut world = CombatWorld::new();
        let target = world.insert_entity(CombatEntity::new("wall", StatContainer::new()));
        let object = world.insert_object(DamagingObject::attack(
            None,
            AttackState::new(0, Vec2::ZERO, 0.0),
            DamageProfile::new(StatContainer::new(), DamageTypes::CRUSHING),
        ));

        let (source, entities) = world.split_object_mut(object);
        let source = source.expect("object");
        let wall = entities.get_mut(target).expect("entity");
        wall.can_move = false;
        source.attacker = Some(target);

        assert_eq!(world.object(object).and_then(|o| o.attacker), Some(target));
        assert_eq!(world.object_count(), 1);
    }

    #[test]
    fn test_entity_reset() {
        let mut entity = CombatEntity::new(
            "grunt",
            StatContainer::from_values([(StatId::CurrentHealthPointsValue, 10.0)]),
        );
        entity.dead = true;
        entity.can_attack = false;
        entity.stats.modify_base(
            StatId::CurrentHealthPointsValue,
            crate::stat::ModifyAction::Set,
            0.0,
        );
        entity.reset();
        assert!(entity.is_alive());
        assert!(entity.can_attack);
        assert_eq!(entity.health(), 10.0);
    }
}
