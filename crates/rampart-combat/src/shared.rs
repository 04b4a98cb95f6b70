//! Thread-safe engine handle.
//!
//! Hosts that feed collisions from several threads share one engine behind
//! a `parking_lot::Mutex`. Each call holds the lock for exactly one
//! operation, so two resolutions never interleave.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use rampart_common::{EntityId, ObjectId, Timestamp};

use crate::engine::{AttackError, CombatEngine, TickReport};
use crate::events::CombatEvent;
use crate::pipeline::Resolution;
use crate::status::{AppliedStack, StatusEffectDefinition};

/// Cloneable handle to a shared engine.
#[derive(Debug, Clone)]
pub struct SharedCombatEngine {
    inner: Arc<Mutex<CombatEngine>>,
}

impl SharedCombatEngine {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: CombatEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, CombatEngine> {
        self.inner.lock()
    }

    /// Run a closure with the engine locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut CombatEngine) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// See [`CombatEngine::resolve_attack`].
    pub fn resolve_attack(&self, source: ObjectId, target: EntityId) -> Resolution {
        self.inner.lock().resolve_attack(source, target)
    }

    /// See [`CombatEngine::on_overlap_start`].
    pub fn on_overlap_start(&self, source: ObjectId, target: EntityId) -> Option<Resolution> {
        self.inner.lock().on_overlap_start(source, target)
    }

    /// See [`CombatEngine::on_overlap_end`].
    pub fn on_overlap_end(&self, source: ObjectId, target: EntityId) -> bool {
        self.inner.lock().on_overlap_end(source, target)
    }

    /// See [`CombatEngine::apply_status_effect`].
    pub fn apply_status_effect(
        &self,
        target: EntityId,
        definition: &StatusEffectDefinition,
        attacker: Option<EntityId>,
    ) -> Option<AppliedStack> {
        self.inner
            .lock()
            .apply_status_effect(target, definition, attacker)
    }

    /// See [`CombatEngine::use_attack`].
    pub fn use_attack(&self, entity: EntityId, slot: u16) -> Result<Vec<ObjectId>, AttackError> {
        self.inner.lock().use_attack(entity, slot)
    }

    /// See [`CombatEngine::tick`].
    pub fn tick(&self, now: Timestamp) -> TickReport {
        self.inner.lock().tick(now)
    }

    /// Take every pending event.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.inner.lock().drain_events()
    }
}
