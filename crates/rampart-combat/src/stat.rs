//! Stat entries.
//!
//! This module provides:
//! - Stat identifiers and their suffix classification
//! - Base value modification actions
//! - Per-stack modifiers keyed by the status effect that contributed them
//! - A memoized stat total

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use crate::status::StatusEffectId;

// ============================================================================
// Stat Identifiers
// ============================================================================

/// Every stat a combat participant can carry.
///
/// The suffix of each name is meaningful: `...Value` stats are plain
/// quantities, `...Percent` stats are percentages, `...Timer` stats are
/// durations in seconds and `...Multiplier` stats scale another quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatId {
    // Health
    /// Current health.
    CurrentHealthPointsValue,
    /// Health capacity.
    MaxHealthPointsValue,
    /// Health restored per regen tick.
    HealthRegenAmountValue,
    /// Seconds between health regen ticks.
    HealthRegenCooldownTimer,
    /// Share of health damage dealt that is stolen back.
    HealthPointsStolenOnHitPercent,
    /// Share of max health stolen on a kill.
    HealthPointsStolenOnKillPercent,
    /// Current overheal.
    CurrentOverhealCapacityValue,
    /// Overheal capacity.
    MaxOverhealCapacityValue,
    /// Current energy shield.
    CurrentEnergyShieldValue,
    /// Energy shield capacity.
    MaxEnergyShieldValue,
    /// Shield restored per regen tick.
    EnergyShieldRegenAmountValue,
    /// Seconds between shield regen ticks.
    EnergyShieldRegenCooldownTimer,
    /// Share of shield damage dealt that is stolen back.
    EnergyShieldStolenOnHitPercent,
    /// Share of max shield stolen on a kill.
    EnergyShieldStolenOnKillPercent,

    // Offense
    /// Attack range.
    AttackRangeValue,
    /// Seconds between uses of an attack, also the damage-over-time interval.
    AttackCooldownTimer,
    /// Projectile spread.
    AttackAccuracySpreadValue,
    /// Lower bound of the damage roll.
    MinimumAttackDamageValue,
    /// Upper bound of the damage roll.
    MaximumAttackDamageValue,
    /// Critical hit chance.
    CriticalHitChancePercent,
    /// Bonus damage on a critical hit, in percent.
    CriticalHitDamageMultiplier,
    /// Armor ignored by this attack.
    IgnoreArmorAmountValue,
    /// Chance of chaining another strike.
    MultistrikeChancePercent,
    /// Longest multistrike chain.
    MaxMultistrikeHitsComboValue,
    /// Projectile speed.
    ProjectileSpeedValue,
    /// Projectiles per strike.
    ProjectileCountValue,
    /// Additional targets a projectile passes through.
    ProjectilePierceCountValue,
    /// Splash radius.
    SplashDamageRadiusValue,
    /// Chance of inflicting carried status effects.
    StatusEffectInflictionChancePercent,
    /// Lifetime of one status effect stack.
    StatusEffectDurationTimer,
    /// Damage dealt by a status effect tick.
    StatusEffectDamageValue,
    /// Seconds between status effect checks.
    StatusEffectDamageHitRateTimer,
    /// Reach of a displacing status effect.
    StatusEffectDistanceOrRadiusValue,
    /// Radius of a spawned area of effect.
    AreaOfEffectRadiusValue,
    /// Damage of a reflected attack relative to the original, in percent.
    ReflectedAttackDamageMultiplier,

    // Defense
    /// Parry chance.
    ParryAttackChancePercent,
    /// Seconds between parries.
    ParryCooldownTimer,
    /// Chance of countering after a parry.
    CounterAttackChancePercent,
    /// Block chance.
    BlockChancePercent,
    /// Seconds between blocks.
    BlockCooldownTimer,
    /// Damage absorbed by a block.
    BlockAmountValue,
    /// Chance a block reflects the attack.
    ReflectDamageChancePercent,
    /// Damage reflected back.
    ReflectDamageAmountValue,
    /// Armor.
    ArmorValue,
    /// Damage returned to melee attackers.
    ThornsDamageValue,
    /// Reduces the attacker's critical hit chance.
    CriticalHitResistancePercent,
    /// Reduces critical hit damage.
    CriticalDamageResistancePercent,
    /// Seconds between dodges.
    DodgeCooldownTimer,
    /// Dodge chance.
    DodgeChancePercent,
    /// Reduces status effect infliction chance.
    StatusEffectInflictionResistanceValue,

    // Resistances
    /// Magic resistance.
    MagicResistanceValue,
    /// Ranged resistance.
    RangedResistanceValue,
    /// Melee resistance.
    MeleeResistanceValue,
    /// Burn resistance.
    BurnResistanceValue,
    /// Slow resistance.
    SlowResistanceValue,
    /// Freeze and chill resistance.
    FreezeChillResistanceValue,
    /// Stun resistance.
    StunResistanceValue,
    /// Blind resistance.
    BlindResistanceValue,
    /// Bleed resistance.
    BleedResistanceValue,
    /// Fear resistance.
    FearResistanceValue,
    /// Silence resistance.
    SilenceResistanceValue,

    // Movement
    /// Ground speed.
    GroundMovementSpeedValue,
    /// Dash distance.
    DashDistanceValue,
    /// Dash charges.
    DashChargesValue,
    /// Dash speed.
    DashSpeedValue,
    /// Swim speed.
    SwimSpeedValue,
    /// Flying speed.
    FlyingSpeedValue,
    /// Space travel speed.
    SpaceTravelSpeedValue,

    // Utility
    /// Experience gain multiplier.
    XpGainMultiplierValue,
    /// Gold gain multiplier.
    GoldGainMultiplierValue,
    /// Buff duration scale.
    BuffDurationMultiplier,
    /// Debuff duration scale.
    DebuffDurationMultiplier,
    /// Bonus health for summons.
    SummonsBonusHealthPercent,
    /// Maximum summons.
    SummonsLimitValue,
    /// Bonus damage for summons.
    SummonsDamageBonusPercent,

    // Progression
    /// Current level.
    LevelValue,
    /// Current experience.
    CurrentExperienceValue,
    /// Experience needed to level.
    ExperienceNeededForNextLevelValue,
    /// Prestige level.
    PrestigeLevelValue,
}

/// How a stat's name classifies its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    /// A plain quantity.
    Value,
    /// A percentage.
    Percent,
    /// A duration in seconds; smaller is stronger.
    Timer,
    /// A scale factor.
    Multiplier,
}

impl StatId {
    /// All stat identifiers in declaration order.
    pub const ALL: [Self; 79] = [
        Self::CurrentHealthPointsValue,
        Self::MaxHealthPointsValue,
        Self::HealthRegenAmountValue,
        Self::HealthRegenCooldownTimer,
        Self::HealthPointsStolenOnHitPercent,
        Self::HealthPointsStolenOnKillPercent,
        Self::CurrentOverhealCapacityValue,
        Self::MaxOverhealCapacityValue,
        Self::CurrentEnergyShieldValue,
        Self::MaxEnergyShieldValue,
        Self::EnergyShieldRegenAmountValue,
        Self::EnergyShieldRegenCooldownTimer,
        Self::EnergyShieldStolenOnHitPercent,
        Self::EnergyShieldStolenOnKillPercent,
        Self::AttackRangeValue,
        Self::AttackCooldownTimer,
        Self::AttackAccuracySpreadValue,
        Self::MinimumAttackDamageValue,
        Self::MaximumAttackDamageValue,
        Self::CriticalHitChancePercent,
        Self::CriticalHitDamageMultiplier,
        Self::IgnoreArmorAmountValue,
        Self::MultistrikeChancePercent,
        Self::MaxMultistrikeHitsComboValue,
        Self::ProjectileSpeedValue,
        Self::ProjectileCountValue,
        Self::ProjectilePierceCountValue,
        Self::SplashDamageRadiusValue,
        Self::StatusEffectInflictionChancePercent,
        Self::StatusEffectDurationTimer,
        Self::StatusEffectDamageValue,
        Self::StatusEffectDamageHitRateTimer,
        Self::StatusEffectDistanceOrRadiusValue,
        Self::AreaOfEffectRadiusValue,
        Self::ReflectedAttackDamageMultiplier,
        Self::ParryAttackChancePercent,
        Self::ParryCooldownTimer,
        Self::CounterAttackChancePercent,
        Self::BlockChancePercent,
        Self::BlockCooldownTimer,
        Self::BlockAmountValue,
        Self::ReflectDamageChancePercent,
        Self::ReflectDamageAmountValue,
        Self::ArmorValue,
        Self::ThornsDamageValue,
        Self::CriticalHitResistancePercent,
        Self::CriticalDamageResistancePercent,
        Self::DodgeCooldownTimer,
        Self::DodgeChancePercent,
        Self::StatusEffectInflictionResistanceValue,
        Self::MagicResistanceValue,
        Self::RangedResistanceValue,
        Self::MeleeResistanceValue,
        Self::BurnResistanceValue,
        Self::SlowResistanceValue,
        Self::FreezeChillResistanceValue,
        Self::StunResistanceValue,
        Self::BlindResistanceValue,
        Self::BleedResistanceValue,
        Self::FearResistanceValue,
        Self::SilenceResistanceValue,
        Self::GroundMovementSpeedValue,
        Self::DashDistanceValue,
        Self::DashChargesValue,
        Self::DashSpeedValue,
        Self::SwimSpeedValue,
        Self::FlyingSpeedValue,
        Self::SpaceTravelSpeedValue,
        Self::XpGainMultiplierValue,
        Self::GoldGainMultiplierValue,
        Self::BuffDurationMultiplier,
        Self::DebuffDurationMultiplier,
        Self::SummonsBonusHealthPercent,
        Self::SummonsLimitValue,
        Self::SummonsDamageBonusPercent,
        Self::LevelValue,
        Self::CurrentExperienceValue,
        Self::ExperienceNeededForNextLevelValue,
        Self::PrestigeLevelValue,
    ];

    /// Classify this stat by its name suffix.
    #[must_use]
    pub const fn kind(self) -> StatKind {
        match self {
            Self::HealthRegenCooldownTimer
            | Self::EnergyShieldRegenCooldownTimer
            | Self::AttackCooldownTimer
            | Self::StatusEffectDurationTimer
            | Self::StatusEffectDamageHitRateTimer
            | Self::ParryCooldownTimer
            | Self::BlockCooldownTimer
            | Self::DodgeCooldownTimer => StatKind::Timer,

            Self::HealthPointsStolenOnHitPercent
            | Self::HealthPointsStolenOnKillPercent
            | Self::EnergyShieldStolenOnHitPercent
            | Self::EnergyShieldStolenOnKillPercent
            | Self::CriticalHitChancePercent
            | Self::MultistrikeChancePercent
            | Self::StatusEffectInflictionChancePercent
            | Self::ParryAttackChancePercent
            | Self::CounterAttackChancePercent
            | Self::BlockChancePercent
            | Self::ReflectDamageChancePercent
            | Self::CriticalHitResistancePercent
            | Self::CriticalDamageResistancePercent
            | Self::DodgeChancePercent
            | Self::SummonsBonusHealthPercent
            | Self::SummonsDamageBonusPercent => StatKind::Percent,

            Self::CriticalHitDamageMultiplier
            | Self::ReflectedAttackDamageMultiplier
            | Self::BuffDurationMultiplier
            | Self::DebuffDurationMultiplier => StatKind::Multiplier,

            _ => StatKind::Value,
        }
    }

    /// Check if this stat is a duration.
    #[must_use]
    pub const fn is_timer(self) -> bool {
        matches!(self.kind(), StatKind::Timer)
    }

    /// Direction a status effect moves this stat when it weakens the holder.
    ///
    /// Weakening lowers quantities but lengthens timers.
    #[must_use]
    pub const fn reduction_action(self) -> ModifyAction {
        if self.is_timer() {
            ModifyAction::Add
        } else {
            ModifyAction::Subtract
        }
    }

    /// Direction a level up (or a removed reduction) moves this stat.
    #[must_use]
    pub const fn improvement_action(self) -> ModifyAction {
        if self.is_timer() {
            ModifyAction::Subtract
        } else {
            ModifyAction::Add
        }
    }
}

impl fmt::Display for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Modification
// ============================================================================

/// How a base value change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifyAction {
    /// Add the amount to the base.
    Add,
    /// Subtract the amount from the base.
    Subtract,
    /// Replace the base with the amount.
    Set,
}

impl ModifyAction {
    /// Apply this action to a value.
    #[must_use]
    pub fn apply(self, current: f64, amount: f64) -> f64 {
        match self {
            Self::Add => current + amount,
            Self::Subtract => current - amount,
            Self::Set => amount,
        }
    }

    /// Sign applied to an amount by an additive action (`Set` counts as positive).
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Subtract => -1.0,
            Self::Add | Self::Set => 1.0,
        }
    }
}

/// A modifier contributed by one status effect stack.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Modifier {
    /// Flat amount added to the base.
    pub additive: f64,
    /// Percentage applied to the sum of base and flat amounts.
    pub percent: f64,
}

impl Modifier {
    /// A flat modifier.
    #[must_use]
    pub const fn flat(additive: f64) -> Self {
        Self {
            additive,
            percent: 0.0,
        }
    }

    /// A percentage modifier.
    #[must_use]
    pub const fn percent(percent: f64) -> Self {
        Self {
            additive: 0.0,
            percent,
        }
    }

    /// Check if this modifier changes nothing.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.additive == 0.0 && self.percent == 0.0
    }
}

/// What contributed a modifier.
pub type ModifierSourceId = StatusEffectId;

/// Identifies one stack instance within a (target, status effect) pair.
///
/// Indices are handed out monotonically and never reused while the stack
/// list exists, so removing stack 2 of 3 never aliases a later stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackIndex(u32);

impl StackIndex {
    /// Create a stack index from a raw value.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The index following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for StackIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Stat Entry
// ============================================================================

/// A single named stat: base value, live modifiers and a memoized total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatEntry {
    name: StatId,
    base_value: f64,
    starting_base_value: f64,
    modifiers: BTreeMap<ModifierSourceId, BTreeMap<StackIndex, Modifier>>,
    #[serde(skip)]
    cached_total: Cell<Option<f64>>,
}

impl PartialEq for StatEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.base_value == other.base_value
            && self.starting_base_value == other.starting_base_value
            && self.modifiers == other.modifiers
    }
}

impl StatEntry {
    /// Create a stat whose starting value is its base.
    #[must_use]
    pub fn new(name: StatId, base_value: f64) -> Self {
        Self {
            name,
            base_value,
            starting_base_value: base_value,
            modifiers: BTreeMap::new(),
            cached_total: Cell::new(None),
        }
    }

    /// Stat identifier.
    #[must_use]
    pub const fn name(&self) -> StatId {
        self.name
    }

    /// Current base value.
    #[must_use]
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Base value this stat was created with.
    #[must_use]
    pub const fn starting_base_value(&self) -> f64 {
        self.starting_base_value
    }

    /// Change the base value.
    pub fn modify_base(&mut self, action: ModifyAction, amount: f64) {
        self.base_value = action.apply(self.base_value, amount);
        self.invalidate_cache();
    }

    /// Register a modifier for one stack of a source.
    ///
    /// Returns `false` and leaves the entry untouched if that stack already
    /// has a modifier here.
    pub fn add_modifier(
        &mut self,
        source: ModifierSourceId,
        stack: StackIndex,
        modifier: Modifier,
    ) -> bool {
        let stacks = self.modifiers.entry(source).or_default();
        if stacks.contains_key(&stack) {
            return false;
        }
        stacks.insert(stack, modifier);
        self.invalidate_cache();
        true
    }

    /// Remove the modifier one stack contributed, returning it.
    pub fn remove_modifier_stack(
        &mut self,
        source: ModifierSourceId,
        stack: StackIndex,
    ) -> Option<Modifier> {
        let stacks = self.modifiers.get_mut(&source)?;
        let removed = stacks.remove(&stack);
        if stacks.is_empty() {
            self.modifiers.remove(&source);
        }
        if removed.is_some() {
            self.invalidate_cache();
        }
        removed
    }

    /// Remove every modifier from a source. Returns how many stacks were removed.
    pub fn remove_modifier_source(&mut self, source: ModifierSourceId) -> usize {
        let removed = self.modifiers.remove(&source).map_or(0, |stacks| stacks.len());
        if removed > 0 {
            self.invalidate_cache();
        }
        removed
    }

    /// The modifier a stack contributed, if any.
    #[must_use]
    pub fn modifier(&self, source: ModifierSourceId, stack: StackIndex) -> Option<Modifier> {
        self.modifiers.get(&source)?.get(&stack).copied()
    }

    /// Number of live modifiers across all sources.
    #[must_use]
    pub fn modifier_count(&self) -> usize {
        self.modifiers.values().map(BTreeMap::len).sum()
    }

    /// Sum of every live modifier.
    #[must_use]
    pub fn modifier_sums(&self) -> Modifier {
        self.modifiers
            .values()
            .flat_map(BTreeMap::values)
            .fold(Modifier::default(), |acc, m| Modifier {
                additive: acc.additive + m.additive,
                percent: acc.percent + m.percent,
            })
    }

    /// `(base + Σ additive) * (1 + Σ percent / 100)`, memoized until the next mutation.
    #[must_use]
    pub fn current_total(&self) -> f64 {
        if let Some(total) = self.cached_total.get() {
            return total;
        }
        let total = self.recalculate_total();
        self.cached_total.set(Some(total));
        total
    }

    /// Move the base so the total lands exactly on `total`.
    ///
    /// Pools use this to pin a depleted value to zero regardless of the
    /// percent modifiers currently applied.
    pub fn set_total(&mut self, total: f64) {
        let sums = self.modifier_sums();
        let factor = 1.0 + sums.percent / 100.0;
        self.base_value = if total == 0.0 || factor == 0.0 {
            -sums.additive
        } else {
            total / factor - sums.additive
        };
        self.invalidate_cache();
        if total == 0.0 {
            self.cached_total.set(Some(0.0));
        }
    }

    /// Move the total by `delta`, compensating for percent modifiers.
    pub fn shift_total(&mut self, delta: f64) {
        let sums = self.modifier_sums();
        let factor = 1.0 + sums.percent / 100.0;
        if factor == 0.0 {
            return;
        }
        self.base_value += delta / factor;
        self.invalidate_cache();
    }

    /// Restore the starting base and drop every modifier.
    pub fn reset_to_starting(&mut self) {
        self.base_value = self.starting_base_value;
        self.modifiers.clear();
        self.invalidate_cache();
    }

    /// Deep copy, optionally under a different stat name.
    ///
    /// The copy starts from the current base, so its starting value is the
    /// source's current base rather than the source's starting value.
    #[must_use]
    pub fn copied_as(&self, name: Option<StatId>) -> Self {
        let mut copy = Self::new(name.unwrap_or(self.name), self.base_value);
        copy.modifiers = self.modifiers.clone();
        copy
    }

    fn recalculate_total(&self) -> f64 {
        let sums = self.modifier_sums();
        (self.base_value + sums.additive) * (1.0 + sums.percent / 100.0)
    }

    fn invalidate_cache(&mut self) {
        self.cached_total.set(None);
    }
}

// ============================================================================
// Tests
// ============================================================================
