//! Health, overheal and energy shield pools.
//!
//! This module provides:
//! - Pool identifiers and their current/max stat pairs
//! - Ordered pool depletion (shield, overheal, health)
//! - Clamped healing
//! - Regeneration tasks

use serde::{Deserialize, Serialize};

use rampart_common::{EntityId, Timestamp};

use crate::container::StatContainer;
use crate::scheduler::TaskQueue;
use crate::stat::StatId;

/// A depletable pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pool {
    /// Energy shield, depleted first.
    EnergyShield,
    /// Overheal capacity, depleted second.
    Overheal,
    /// Health, depleted last.
    Health,
}

impl Pool {
    /// Pools in depletion order.
    pub const DEPLETION_ORDER: [Self; 3] = [Self::EnergyShield, Self::Overheal, Self::Health];

    /// Stat holding the pool's current value.
    #[must_use]
    pub const fn current_stat(self) -> StatId {
        match self {
            Self::EnergyShield => StatId::CurrentEnergyShieldValue,
            Self::Overheal => StatId::CurrentOverhealCapacityValue,
            Self::Health => StatId::CurrentHealthPointsValue,
        }
    }

    /// Stat holding the pool's cap.
    #[must_use]
    pub const fn max_stat(self) -> StatId {
        match self {
            Self::EnergyShield => StatId::MaxEnergyShieldValue,
            Self::Overheal => StatId::MaxOverhealCapacityValue,
            Self::Health => StatId::MaxHealthPointsValue,
        }
    }

    /// Regen amount and interval stats, for pools that regenerate.
    #[must_use]
    pub const fn regen_stats(self) -> Option<(StatId, StatId)> {
        match self {
            Self::EnergyShield => Some((
                StatId::EnergyShieldRegenAmountValue,
                StatId::EnergyShieldRegenCooldownTimer,
            )),
            Self::Health => Some((StatId::HealthRegenAmountValue, StatId::HealthRegenCooldownTimer)),
            Self::Overheal => None,
        }
    }

    /// Life steal stat feeding this pool.
    #[must_use]
    pub const fn steal_on_hit_stat(self) -> StatId {
        match self {
            Self::EnergyShield => StatId::EnergyShieldStolenOnHitPercent,
            Self::Overheal | Self::Health => StatId::HealthPointsStolenOnHitPercent,
        }
    }
}

/// How much damage each pool absorbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolDamage {
    /// Absorbed by the energy shield
    pub shield: f64,
    /// Absorbed by overheal
    pub overheal: f64,
    /// Absorbed by health
    pub health: f64,
    /// Health ended at zero
    pub killed: bool,
}

impl PoolDamage {
    /// Damage absorbed by a pool.
    #[must_use]
    pub const fn absorbed(&self, pool: Pool) -> f64 {
        match pool {
            Pool::EnergyShield => self.shield,
            Pool::Overheal => self.overheal,
            Pool::Health => self.health,
        }
    }

    /// Total absorbed across pools.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.shield + self.overheal + self.health
    }
}

/// Remove damage from the pools in order, carrying the remainder forward.
///
/// A pool that empties is pinned to exactly zero. The split never exceeds
/// `damage`.
pub fn deplete_pools(stats: &mut StatContainer, damage: f64, ignores_shields: bool) -> PoolDamage {
    let mut split = PoolDamage::default();
    let mut remaining = damage.max(0.0);

    for pool in Pool::DEPLETION_ORDER {
        if pool == Pool::EnergyShield && ignores_shields {
            continue;
        }
        if remaining <= 0.0 {
            break;
        }
        let Some(entry) = stats.get_mut(pool.current_stat()) else {
            continue;
        };
        let available = entry.current_total();
        if available <= 0.0 {
            continue;
        }

        let absorbed = remaining.min(available);
        if available - absorbed <= 0.0 {
            entry.set_total(0.0);
        } else {
            entry.shift_total(-absorbed);
        }
        remaining -= absorbed;

        match pool {
            Pool::EnergyShield => split.shield = absorbed,
            Pool::Overheal => split.overheal = absorbed,
            Pool::Health => split.health = absorbed,
        }
    }

    split.killed = stats
        .try_total(Pool::Health.current_stat())
        .is_some_and(|health| health <= 0.0);
    split
}

/// Add to a pool, clamped to its cap. Returns the amount actually restored.
pub fn heal(stats: &mut StatContainer, pool: Pool, amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let Some(current) = stats.try_total(pool.current_stat()) else {
        return 0.0;
    };
    let cap = stats.try_total(pool.max_stat()).unwrap_or(current);
    let target = (current + amount).min(cap);
    if target <= current {
        return 0.0;
    }
    if let Some(entry) = stats.get_mut(pool.current_stat()) {
        entry.shift_total(target - current);
    }
    target - current
}

/// Check if a pool is below its cap.
#[must_use]
pub fn is_below_cap(stats: &StatContainer, pool: Pool) -> bool {
    match (
        stats.try_total(pool.current_stat()),
        stats.try_total(pool.max_stat()),
    ) {
        (Some(current), Some(cap)) => current < cap,
        _ => false,
    }
}

// ============================================================================
// Regeneration
// ============================================================================

/// Repeating regen tasks, one per (entity, pool) that is below its cap.
#[derive(Debug, Clone, Default)]
pub struct RegenTracker {
    tasks: TaskQueue<(EntityId, Pool)>,
}

impl RegenTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start regenerating a pool if it is not already.
    pub fn ensure(&mut self, entity: EntityId, pool: Pool, interval: f64) -> bool {
        self.tasks.schedule_repeating((entity, pool), interval)
    }

    /// Stop regenerating a pool.
    pub fn stop(&mut self, entity: EntityId, pool: Pool) -> bool {
        self.tasks.cancel(&(entity, pool))
    }

    /// Check if a pool is regenerating.
    #[must_use]
    pub fn is_running(&self, entity: EntityId, pool: Pool) -> bool {
        self.tasks.contains(&(entity, pool))
    }

    /// Drop every regen task of an entity.
    pub fn clear_entity(&mut self, entity: EntityId) {
        self.tasks.retain(|(owner, _)| *owner != entity);
    }

    /// Advance and return the pools due a regen tick.
    pub fn tick(&mut self, now: Timestamp, paused: bool) -> Vec<(EntityId, Pool)> {
        self.tasks.advance(now, paused)
    }
}
