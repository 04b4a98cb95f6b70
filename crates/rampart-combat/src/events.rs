//! Combat event bus.
//!
//! Resolution, status and spawn outcomes are published here for the host
//! to drain once per frame (floating text, sounds, collider spawns).

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use rampart_common::{EntityId, ObjectId};

use crate::pipeline::Mitigation;
use crate::stat::StackIndex;
use crate::status::StatusEffectId;
use crate::vitals::{Pool, PoolDamage};

/// Event types published by the combat core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Damage landed on a target's pools
    Damaged {
        /// Target entity
        target: EntityId,
        /// Attacking entity (if any)
        attacker: Option<EntityId>,
        /// Amount absorbed by each pool
        split: PoolDamage,
        /// Whether the hit was critical
        critical: bool,
    },
    /// A pool was restored
    Healed {
        /// Healed entity
        target: EntityId,
        /// Pool restored
        pool: Pool,
        /// Amount restored
        amount: f64,
    },
    /// A defense triggered
    Mitigated {
        /// Defending entity
        target: EntityId,
        /// Attacking entity (if any)
        attacker: Option<EntityId>,
        /// Which defense
        mitigation: Mitigation,
    },
    /// An entity's health reached zero
    Died {
        /// Dead entity
        entity: EntityId,
        /// Attacking entity (if any)
        killer: Option<EntityId>,
    },
    /// A status effect stack was applied
    StatusApplied {
        /// Affected entity
        target: EntityId,
        /// Effect applied
        effect: StatusEffectId,
        /// New stack
        stack: StackIndex,
        /// Stack count after applying
        stacks: u32,
    },
    /// A status effect stack expired
    StatusExpired {
        /// Affected entity
        target: EntityId,
        /// Effect expired
        effect: StatusEffectId,
        /// Stacks left
        stacks: u32,
    },
    /// Stacks of one effect converted into another
    StatusConverted {
        /// Affected entity
        target: EntityId,
        /// Consumed effect
        from: StatusEffectId,
        /// Produced effect
        into: StatusEffectId,
    },
    /// An attack instance should be spawned by the host
    AttackSpawned {
        /// Spawned object
        object: ObjectId,
        /// Owning entity
        attacker: EntityId,
        /// Loadout slot
        slot: u16,
        /// Spawn position
        position: Vec2,
        /// Heading in degrees
        rotation_degrees: f32,
    },
    /// An area of effect should be spawned by the host
    AreaOfEffectSpawned {
        /// Spawned object
        object: ObjectId,
        /// Owning entity (if any)
        attacker: Option<EntityId>,
        /// Center
        position: Vec2,
        /// Radius
        radius: f64,
    },
    /// A damaging object finished its lifecycle
    ObjectDespawned {
        /// Despawned object
        object: ObjectId,
    },
    /// A parry earned a counter attack
    CounterAttack {
        /// Countering entity
        entity: EntityId,
        /// Entity being countered (if known)
        against: Option<EntityId>,
    },
    /// A block reflected an attack
    Reflected {
        /// Reflected attack
        object: ObjectId,
        /// Reflecting entity
        defender: EntityId,
        /// Times reflected so far
        reflect_count: u32,
    },
}

/// Bounded event bus shared by every combat system.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Publishes an event. Returns `false` if the bus was full and the event dropped.
    pub fn publish(&self, event: CombatEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events from another thread.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Typed event handler trait.
pub trait EventHandler {
    /// Handles an event.
    fn handle(&mut self, event: &CombatEvent);
}

impl<F: FnMut(&CombatEvent)> EventHandler for F {
    fn handle(&mut self, event: &CombatEvent) {
        self(event);
    }
}

/// Drain the bus into a handler. Returns how many events were handled.
pub fn dispatch(bus: &EventBus, handler: &mut dyn EventHandler) -> usize {
    let mut handled = 0;
    for event in bus.receiver.try_iter() {
        handler.handle(&event);
        handled += 1;
    }
    handled
}
