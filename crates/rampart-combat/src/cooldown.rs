//! Per-entity action cooldowns.
//!
//! This module provides:
//! - Cooldown actions (attack slots and the three defenses)
//! - Idempotent cooldown starts with a positive duration floor
//! - Pause-aware countdowns driven by the shared task queue

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rampart_common::{EntityId, Timestamp};

use crate::scheduler::TaskQueue;

/// An action gated by a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CooldownAction {
    /// Use of one attack loadout slot.
    Attack(u16),
    /// Parrying.
    Parry,
    /// Blocking.
    Block,
    /// Dodging.
    Dodge,
}

impl CooldownAction {
    /// Check if this is one of the defensive actions.
    #[must_use]
    pub const fn is_defense(self) -> bool {
        !matches!(self, Self::Attack(_))
    }
}

/// Cooldown flags for one (entity, action).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownState {
    /// The action may not be used
    pub on_cooldown: bool,
    /// A countdown task is running
    pub timer_running: bool,
}

/// Lower bounds applied to every cooldown duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownFloors {
    /// Floor for attack cooldowns
    pub attack: f64,
    /// Floor for parry, block and dodge cooldowns
    pub defense: f64,
}

impl Default for CooldownFloors {
    fn default() -> Self {
        Self {
            attack: 0.05,
            defense: 0.05,
        }
    }
}

impl CooldownFloors {
    /// Floor for an action, never below a millisecond.
    #[must_use]
    pub fn for_action(&self, action: CooldownAction) -> f64 {
        let floor = if action.is_defense() {
            self.defense
        } else {
            self.attack
        };
        floor.max(1e-3)
    }
}

/// Tracks `Ready -> OnCooldown -> Ready` for every (entity, action).
#[derive(Debug, Clone, Default)]
pub struct CooldownController {
    states: AHashMap<(EntityId, CooldownAction), CooldownState>,
    timers: TaskQueue<(EntityId, CooldownAction)>,
    floors: CooldownFloors,
}

impl CooldownController {
    /// Create a controller with the given floors.
    #[must_use]
    pub fn new(floors: CooldownFloors) -> Self {
        Self {
            states: AHashMap::new(),
            timers: TaskQueue::new(),
            floors,
        }
    }

    /// Put an action on cooldown.
    ///
    /// Returns `false` without restarting anything if a countdown is
    /// already running for that action.
    pub fn start(&mut self, entity: EntityId, action: CooldownAction, duration: f64) -> bool {
        let state = self.states.entry((entity, action)).or_default();
        if state.timer_running {
            return false;
        }
        let duration = if duration.is_finite() {
            duration.max(self.floors.for_action(action))
        } else {
            self.floors.for_action(action)
        };
        state.on_cooldown = true;
        state.timer_running = true;
        self.timers.schedule_once((entity, action), duration);
        true
    }

    /// Check if an action may be used.
    #[must_use]
    pub fn is_ready(&self, entity: EntityId, action: CooldownAction) -> bool {
        !self.state(entity, action).on_cooldown
    }

    /// Current flags for an action.
    #[must_use]
    pub fn state(&self, entity: EntityId, action: CooldownAction) -> CooldownState {
        self.states
            .get(&(entity, action))
            .copied()
            .unwrap_or_default()
    }

    /// Seconds of unpaused time until an action is ready.
    #[must_use]
    pub fn remaining(&self, entity: EntityId, action: CooldownAction) -> Option<f64> {
        self.timers.remaining(&(entity, action))
    }

    /// Advance every countdown. Returns the actions that became ready.
    pub fn tick(&mut self, now: Timestamp, paused: bool) -> Vec<(EntityId, CooldownAction)> {
        let ready = self.timers.advance(now, paused);
        for key in &ready {
            self.states.remove(key);
        }
        if !ready.is_empty() {
            debug!("{} cooldowns finished", ready.len());
        }
        ready
    }

    /// Drop every cooldown an entity holds.
    pub fn clear_entity(&mut self, entity: EntityId) {
        self.states.retain(|(owner, _), _| *owner != entity);
        self.timers.retain(|(owner, _)| *owner != entity);
    }

    /// Number of running countdowns.
    #[must_use]
    pub fn running(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: f64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_ready_then_cooldown_then_ready() {
        let mut cooldowns = CooldownController::default();
        let entity = EntityId::new();
        cooldowns.tick(at(0.0), false);

        assert!(cooldowns.is_ready(entity, CooldownAction::Parry));
        assert!(cooldowns.start(entity, CooldownAction::Parry, 1.0));
        assert_eq!(
            cooldowns.state(entity, CooldownAction::Parry),
            CooldownState {
                on_cooldown: true,
                timer_running: true
            }
        );

        cooldowns.tick(at(0.5), false);
        assert!(!cooldowns.is_ready(entity, CooldownAction::Parry));
        let ready = cooldowns.tick(at(1.0), false);
        assert_eq!(ready, vec![(entity, CooldownAction::Parry)]);
        assert!(cooldowns.is_ready(entity, CooldownAction::Parry));
    }

    #[test]
    fn test_restart_while_running_is_noop() {
        let mut cooldowns = CooldownController::default();
        let entity = EntityId::new();
        cooldowns.tick(at(0.0), false);

        assert!(cooldowns.start(entity, CooldownAction::Block, 1.0));
        assert!(!cooldowns.start(entity, CooldownAction::Block, 10.0));
        assert_eq!(cooldowns.running(), 1);
        cooldowns.tick(at(1.0), false);
        assert!(cooldowns.is_ready(entity, CooldownAction::Block));
    }

    #[test]
    fn test_zero_and_negative_durations_are_floored() {
        let mut cooldowns = CooldownController::new(CooldownFloors {
            attack: 0.05,
            defense: 0.05,
        });
        let entity = EntityId::new();
        cooldowns.tick(at(0.0), false);

        cooldowns.start(entity, CooldownAction::Dodge, -3.0);
        cooldowns.start(entity, CooldownAction::Attack(0), f64::NAN);
        assert!((cooldowns.remaining(entity, CooldownAction::Dodge).unwrap_or(0.0) - 0.05).abs() < 1e-9);
        assert!(!cooldowns.is_ready(entity, CooldownAction::Attack(0)));

        cooldowns.tick(at(0.05), false);
        assert!(cooldowns.is_ready(entity, CooldownAction::Dodge));
        assert!(cooldowns.is_ready(entity, CooldownAction::Attack(0)));
    }

    #[test]
    fn test_actions_are_independent() {
        let mut cooldowns = CooldownController::default();
        let entity = EntityId::new();
        let other = EntityId::new();
        cooldowns.tick(at(0.0), false);

        cooldowns.start(entity, CooldownAction::Parry, 1.0);
        assert!(cooldowns.is_ready(entity, CooldownAction::Block));
        assert!(cooldowns.is_ready(other, CooldownAction::Parry));

        cooldowns.clear_entity(entity);
        assert!(cooldowns.is_ready(entity, CooldownAction::Parry));
        assert_eq!(cooldowns.running(), 0);
    }

    #[test]
    fn test_pause_freezes_countdown() {
        let mut cooldowns = CooldownController::default();
        let entity = EntityId::new();
        cooldowns.tick(at(0.0), false);
        cooldowns.start(entity, CooldownAction::Attack(1), 1.0);

        cooldowns.tick(at(5.0), true);
        cooldowns.tick(at(5.1), false);
        assert!(!cooldowns.is_ready(entity, CooldownAction::Attack(1)));
        cooldowns.tick(at(6.1), false);
        assert!(cooldowns.is_ready(entity, CooldownAction::Attack(1)));
    }
}
