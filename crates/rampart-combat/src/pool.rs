//! Object pool for recycled combat state.
//!
//! Despawned objects hand their stat containers back to a pool so the next
//! spawn of the same template can reuse the allocation.

use crate::container::StatContainer;
use crate::damage::DamageProfile;
use crate::world::CombatEntity;

/// State that can be restored to its freshly spawned form.
pub trait Recyclable {
    /// Restore to the state a fresh instance would have.
    fn recycle(&mut self);
}

impl Recyclable for StatContainer {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl Recyclable for DamageProfile {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl Recyclable for CombatEntity {
    fn recycle(&mut self) {
        self.reset();
    }
}

/// LIFO pool of recyclable values.
#[derive(Debug, Clone)]
pub struct ObjectPool<T> {
    free: Vec<T>,
    capacity: usize,
    reused: u64,
}

impl<T: Recyclable> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl<T: Recyclable> ObjectPool<T> {
    /// Create a pool that keeps at most `capacity` free values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity.min(1024)),
            capacity,
            reused: 0,
        }
    }

    /// Take the most recently released value, if any.
    pub fn acquire(&mut self) -> Option<T> {
        let value = self.free.pop()?;
        self.reused += 1;
        Some(value)
    }

    /// Take a recycled value or build a new one.
    pub fn acquire_or_else(&mut self, make: impl FnOnce() -> T) -> T {
        self.acquire().unwrap_or_else(make)
    }

    /// Recycle a value and keep it for reuse. Returns `false` if the pool
    /// is full and the value was dropped.
    pub fn release(&mut self, mut value: T) -> bool {
        if self.free.len() >= self.capacity {
            return false;
        }
        value.recycle();
        self.free.push(value);
        true
    }

    /// Free values held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Check if the pool holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Values handed out again since creation.
    #[must_use]
    pub const fn reused(&self) -> u64 {
        self.reused
    }

    /// Drop every free value.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::StatTemplate;
    use crate::stat::{ModifyAction, StatId};
    use std::sync::Arc;

    fn template() -> Arc<StatTemplate> {
        Arc::new(
            StatTemplate::new("arrow", [(StatId::MaximumAttackDamageValue, 7.0)]).expect("valid template"),
        )
    }

    #[test]
    fn test_acquire_takes_last_released() {
        let mut pool = ObjectPool::with_capacity(4);
        let mut first = StatContainer::from_values([(StatId::ArmorValue, 1.0)]);
        first.add_entry(StatId::LevelValue, 1.0);
        pool.release(first);
        pool.release(StatContainer::from_values([(StatId::ArmorValue, 2.0)]));

        let value = pool.acquire().expect("pooled");
        assert_eq!(value.total(StatId::ArmorValue), 2.0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.reused(), 1);
    }

    #[test]
    fn test_release_resets_from_template() {
        let mut pool = ObjectPool::default();
        let mut stats = StatContainer::from_template(template());
        stats.modify_base(StatId::MaximumAttackDamageValue, ModifyAction::Set, 99.0);
        stats.add_entry(StatId::ArmorValue, 3.0);
        pool.release(stats);

        let recycled = pool.acquire_or_else(StatContainer::new);
        assert_eq!(recycled, StatContainer::from_template(template()));
    }

    #[test]
    fn test_full_pool_drops() {
        let mut pool: ObjectPool<StatContainer> = ObjectPool::with_capacity(1);
        assert!(pool.release(StatContainer::new()));
        assert!(!pool.release(StatContainer::new()));
        assert_eq!(pool.len(), 1);
        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_none());
        assert!(pool.is_empty());
    }
}
