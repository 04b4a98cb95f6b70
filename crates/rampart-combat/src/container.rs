//! Stat containers and templates.
//!
//! This module provides:
//! - Validated, immutable stat templates
//! - Ordered stat containers seeded from a template
//! - Bulk modifier registration for status effect stacks
//! - Level up and pool-recycle reset

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rampart_common::TemplateError;

use crate::stat::{Modifier, ModifierSourceId, ModifyAction, StackIndex, StatEntry, StatId};

/// Pool stats that are seeded at their cap when a template only names the cap.
const POOL_PAIRS: [(StatId, StatId); 3] = [
    (StatId::MaxHealthPointsValue, StatId::CurrentHealthPointsValue),
    (StatId::MaxEnergyShieldValue, StatId::CurrentEnergyShieldValue),
    (StatId::MaxOverhealCapacityValue, StatId::CurrentOverhealCapacityValue),
];

// ============================================================================
// Templates
// ============================================================================

/// A named list of starting stat values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTemplate {
    /// Template name
    pub name: String,
    /// Starting values, in declaration order
    pub stats: Vec<(StatId, f64)>,
}

impl StatTemplate {
    /// Build a template, rejecting duplicate stats.
    pub fn new(
        name: impl Into<String>,
        stats: impl IntoIterator<Item = (StatId, f64)>,
    ) -> Result<Self, TemplateError> {
        let template = Self {
            name: name.into(),
            stats: stats.into_iter().collect(),
        };
        template.validate()?;
        Ok(template)
    }

    /// Parse and validate a template from RON.
    pub fn from_ron(text: &str) -> Result<Self, TemplateError> {
        let template: Self = ron::from_str(text).map_err(|e| TemplateError::Parse(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    /// Check that no stat is listed twice.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut seen = BTreeSet::new();
        for (stat, _) in &self.stats {
            if !seen.insert(*stat) {
                return Err(TemplateError::DuplicateStat {
                    template: self.name.clone(),
                    stat: stat.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Starting value of a stat, if the template lists it.
    #[must_use]
    pub fn value(&self, stat: StatId) -> Option<f64> {
        self.stats
            .iter()
            .find_map(|(id, value)| (*id == stat).then_some(*value))
    }
}

// ============================================================================
// Container
// ============================================================================

/// An ordered collection of stats owned by one combat participant.
///
/// Cloning a container copies every entry and modifier; only the immutable
/// template is shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatContainer {
    #[serde(skip)]
    template: Option<Arc<StatTemplate>>,
    entries: BTreeMap<StatId, StatEntry>,
}

impl StatContainer {
    /// Create an empty container with no template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container seeded from a template.
    #[must_use]
    pub fn from_template(template: Arc<StatTemplate>) -> Self {
        let mut container = Self {
            template: Some(template),
            entries: BTreeMap::new(),
        };
        container.seed();
        container
    }

    /// Create an untemplated container from raw values.
    ///
    /// Later values for the same stat are folded in with [`Self::add_entry`].
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = (StatId, f64)>) -> Self {
        let mut container = Self::new();
        for (stat, value) in values {
            container.add_entry(stat, value);
        }
        container
    }

    /// Name of the template this container was seeded from.
    #[must_use]
    pub fn template_name(&self) -> Option<&str> {
        self.template.as_deref().map(|t| t.name.as_str())
    }

    /// Template this container was seeded from.
    #[must_use]
    pub fn template(&self) -> Option<&Arc<StatTemplate>> {
        self.template.as_ref()
    }

    /// Current total of a stat, or 0 if the container does not hold it.
    #[must_use]
    pub fn total(&self, stat: StatId) -> f64 {
        self.entries.get(&stat).map_or(0.0, StatEntry::current_total)
    }

    /// Current total of a stat, if present.
    #[must_use]
    pub fn try_total(&self, stat: StatId) -> Option<f64> {
        self.entries.get(&stat).map(StatEntry::current_total)
    }

    /// Check if a stat is present.
    #[must_use]
    pub fn contains(&self, stat: StatId) -> bool {
        self.entries.contains_key(&stat)
    }

    /// Get a stat entry.
    #[must_use]
    pub fn get(&self, stat: StatId) -> Option<&StatEntry> {
        self.entries.get(&stat)
    }

    /// Get a mutable stat entry.
    pub fn get_mut(&mut self, stat: StatId) -> Option<&mut StatEntry> {
        self.entries.get_mut(&stat)
    }

    /// Number of stats held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the container holds no stats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in stat order.
    pub fn iter(&self) -> btree_map::Values<'_, StatId, StatEntry> {
        self.entries.values()
    }

    /// Add a stat, or grow an existing one in its improving direction.
    pub fn add_entry(&mut self, stat: StatId, base_value: f64) {
        match self.entries.get_mut(&stat) {
            Some(entry) => entry.modify_base(stat.improvement_action(), base_value),
            None => {
                self.entries.insert(stat, StatEntry::new(stat, base_value));
            },
        }
    }

    /// Insert a fully built entry, replacing any previous entry for that stat.
    pub fn insert_entry(&mut self, entry: StatEntry) -> Option<StatEntry> {
        self.entries.insert(entry.name(), entry)
    }

    /// Remove a stat.
    pub fn remove_entry(&mut self, stat: StatId) -> Option<StatEntry> {
        self.entries.remove(&stat)
    }

    /// Change the base value of a stat. Returns `false` if the stat is missing.
    pub fn modify_base(&mut self, stat: StatId, action: ModifyAction, amount: f64) -> bool {
        match self.entries.get_mut(&stat) {
            Some(entry) => {
                entry.modify_base(action, amount);
                true
            },
            None => false,
        }
    }

    /// Deep copy of one entry, optionally renamed.
    #[must_use]
    pub fn copy_entry(&self, stat: StatId, rename: Option<StatId>) -> Option<StatEntry> {
        self.entries.get(&stat).map(|entry| entry.copied_as(rename))
    }

    /// Register one stack's modifiers.
    ///
    /// Only stats this container already holds are touched. Returns the
    /// contributions that were actually registered so they can be reversed
    /// exactly later.
    pub fn apply_stack_modifiers(
        &mut self,
        source: ModifierSourceId,
        stack: StackIndex,
        modifiers: &[(StatId, Modifier)],
    ) -> Vec<(StatId, Modifier)> {
        let mut applied = Vec::with_capacity(modifiers.len());
        for (stat, modifier) in modifiers {
            if let Some(entry) = self.entries.get_mut(stat) {
                if entry.add_modifier(source, stack, *modifier) {
                    applied.push((*stat, *modifier));
                }
            }
        }
        applied
    }

    /// Reverse one stack's modifiers. Returns how many were removed.
    pub fn remove_stack_modifiers(
        &mut self,
        source: ModifierSourceId,
        stack: StackIndex,
        stats: impl IntoIterator<Item = StatId>,
    ) -> usize {
        let mut removed = 0;
        for stat in stats {
            if let Some(entry) = self.entries.get_mut(&stat) {
                if entry.remove_modifier_stack(source, stack).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Raise a stat by `starting_base * levels * fraction` in its improving direction.
    ///
    /// Returns `false` if the stat is missing.
    pub fn level_up(&mut self, stat: StatId, levels: u32, fraction: f64) -> bool {
        match self.entries.get_mut(&stat) {
            Some(entry) => {
                let amount = entry.starting_base_value() * f64::from(levels) * fraction;
                entry.modify_base(stat.improvement_action(), amount);
                true
            },
            None => false,
        }
    }

    /// Clear and re-seed from the template.
    ///
    /// An untemplated container restores every entry to its starting value.
    pub fn reset(&mut self) {
        if self.template.is_some() {
            self.entries.clear();
            self.seed();
        } else {
            for entry in self.entries.values_mut() {
                entry.reset_to_starting();
            }
        }
    }

    fn seed(&mut self) {
        let Some(template) = self.template.clone() else {
            return;
        };
        for (stat, value) in &template.stats {
            self.entries.insert(*stat, StatEntry::new(*stat, *value));
        }
        for (max, current) in POOL_PAIRS {
            if self.entries.contains_key(&current) {
                continue;
            }
            if let Some(value) = template.value(max) {
                self.entries.insert(current, StatEntry::new(current, value));
            }
        }
    }
}

/// Serde adapter that writes a container as `[(stat, base_value), ...]`.
///
/// Used for content definitions, which only ever describe starting values.
pub mod stat_values {
    use super::StatContainer;
    use crate::stat::StatId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize base values.
    pub fn serialize<S: Serializer>(container: &StatContainer, serializer: S) -> Result<S::Ok, S::Error> {
        let values: Vec<(StatId, f64)> = container
            .iter()
            .map(|entry| (entry.name(), entry.base_value()))
            .collect();
        values.serialize(serializer)
    }

    /// Deserialize base values into an untemplated container.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatContainer, D::Error> {
        let values = Vec::<(StatId, f64)>::deserialize(deserializer)?;
        Ok(StatContainer::from_values(values))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusEffectId;
    use proptest::prelude::*;

    fn grunt() -> Arc<StatTemplate> {
        Arc::new(
            StatTemplate::new(
                "grunt",
                [
                    (StatId::MaxHealthPointsValue, 100.0),
                    (StatId::ArmorValue, 4.0),
                    (StatId::GroundMovementSpeedValue, 2.5),
                    (StatId::AttackCooldownTimer, 1.0),
                ],
            )
            .expect("valid template"),
        )
    }

    #[test]
    fn test_duplicate_stat_rejected() {
        let result = StatTemplate::new(
            "broken",
            [(StatId::ArmorValue, 1.0), (StatId::ArmorValue, 2.0)],
        );
        assert!(matches!(result, Err(TemplateError::DuplicateStat { .. })));
    }

    #[test]
    fn test_template_from_ron() {
        let template = StatTemplate::from_ron(
            r#"(name: "wall", stats: [(MaxHealthPointsValue, 500.0), (ArmorValue, 12.0)])"#,
        )
        .expect("parses");
        assert_eq!(template.value(StatId::ArmorValue), Some(12.0));

        let duplicate = StatTemplate::from_ron(
            r#"(name: "wall", stats: [(ArmorValue, 1.0), (ArmorValue, 12.0)])"#,
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_seed_adds_current_pool_at_max() {
        let container = StatContainer::from_template(grunt());
        assert_eq!(container.total(StatId::CurrentHealthPointsValue), 100.0);
        assert!(!container.contains(StatId::CurrentEnergyShieldValue));
        assert_eq!(container.template_name(), Some("grunt"));
    }

    #[test]
    fn test_missing_stat_total_is_zero() {
        let container = StatContainer::from_template(grunt());
        assert_eq!(container.total(StatId::DodgeChancePercent), 0.0);
        assert!(container.try_total(StatId::DodgeChancePercent).is_none());
    }

    #[test]
    fn test_add_entry_existing_grows_in_improving_direction() {
        let mut container = StatContainer::from_template(grunt());
        container.add_entry(StatId::ArmorValue, 2.0);
        container.add_entry(StatId::AttackCooldownTimer, 0.25);
        assert_eq!(container.total(StatId::ArmorValue), 6.0);
        assert_eq!(container.total(StatId::AttackCooldownTimer), 0.75);
    }

    #[test]
    fn test_stack_modifiers_skip_missing_stats() {
        let mut container = StatContainer::from_template(grunt());
        let stack = StackIndex::new(0);
        let applied = container.apply_stack_modifiers(
            StatusEffectId::Slowed,
            stack,
            &[
                (StatId::GroundMovementSpeedValue, Modifier::flat(-1.0)),
                (StatId::FlyingSpeedValue, Modifier::flat(-1.0)),
            ],
        );
        assert_eq!(applied.len(), 1);
        assert_eq!(container.total(StatId::GroundMovementSpeedValue), 1.5);

        let removed = container.remove_stack_modifiers(
            StatusEffectId::Slowed,
            stack,
            applied.iter().map(|(stat, _)| *stat),
        );
        assert_eq!(removed, 1);
        assert_eq!(container.total(StatId::GroundMovementSpeedValue), 2.5);
    }

    #[test]
    fn test_level_up_uses_starting_base() {
        let mut container = StatContainer::from_template(grunt());
        assert!(container.level_up(StatId::MaxHealthPointsValue, 2, 0.1));
        assert!(container.level_up(StatId::MaxHealthPointsValue, 1, 0.1));
        assert!((container.total(StatId::MaxHealthPointsValue) - 130.0).abs() < 1e-9);

        assert!(container.level_up(StatId::AttackCooldownTimer, 1, 0.1));
        assert!((container.total(StatId::AttackCooldownTimer) - 0.9).abs() < 1e-9);

        assert!(!container.level_up(StatId::DodgeChancePercent, 1, 0.1));
    }

    #[test]
    fn test_copy_is_deep() {
        let mut original = StatContainer::from_template(grunt());
        let copy = original.clone();
        original.modify_base(StatId::ArmorValue, ModifyAction::Set, 99.0);
        assert_eq!(copy.total(StatId::ArmorValue), 4.0);
    }

    #[test]
    fn test_copy_entry_rename() {
        let container = StatContainer::from_template(grunt());
        let renamed = container
            .copy_entry(StatId::MaxHealthPointsValue, Some(StatId::MaxEnergyShieldValue))
            .expect("present");
        assert_eq!(renamed.name(), StatId::MaxEnergyShieldValue);
        assert_eq!(renamed.current_total(), 100.0);
    }

    #[test]
    fn test_untemplated_reset_restores_starting_values() {
        let mut container =
            StatContainer::from_values([(StatId::ArmorValue, 3.0), (StatId::DodgeChancePercent, 10.0)]);
        container.modify_base(StatId::ArmorValue, ModifyAction::Add, 5.0);
        container.reset();
        assert_eq!(container.total(StatId::ArmorValue), 3.0);
    }

    proptest! {
        #[test]
        fn test_reset_matches_fresh_container(
            ops in proptest::collection::vec((0usize..4, -50.0f64..50.0, 0u32..3), 0..20)
        ) {
            let template = grunt();
            let mut container = StatContainer::from_template(Arc::clone(&template));
            let stats = [
                StatId::MaxHealthPointsValue,
                StatId::ArmorValue,
                StatId::GroundMovementSpeedValue,
                StatId::CurrentHealthPointsValue,
            ];
            for (i, (which, amount, kind)) in ops.iter().enumerate() {
                let stat = stats[*which];
                match kind {
                    0 => { container.modify_base(stat, ModifyAction::Add, *amount); },
                    1 => {
                        container.apply_stack_modifiers(
                            StatusEffectId::Weakened,
                            StackIndex::new(i as u32),
                            &[(stat, Modifier::percent(*amount))],
                        );
                    },
                    _ => { container.remove_entry(stat); },
                }
            }

            container.reset();
            prop_assert_eq!(&container, &StatContainer::from_template(Arc::clone(&template)));
            container.reset();
            prop_assert_eq!(container, StatContainer::from_template(template));
        }
    }
}
