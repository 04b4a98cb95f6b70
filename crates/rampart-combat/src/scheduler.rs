//! Tick-driven scheduling.
//!
//! This module provides:
//! - Pause tracking with nested reasons
//! - A tick gate that turns host timestamps into pause-aware deltas
//! - A keyed queue of one-shot and repeating tasks
//! - The time-budgeted damage-over-time sweep

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use rampart_common::{EntityId, ObjectId, Timestamp};

use crate::status::StatusEffectId;

/// Slack used when comparing due times.
const DUE_EPSILON: f64 = 1e-9;

// ============================================================================
// Pause State
// ============================================================================

/// Why combat is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PauseReason {
    /// Not paused.
    #[default]
    NotPaused,
    /// Paused by the player.
    Player,
    /// Paused while a menu is open.
    Menu,
    /// Paused because the window lost focus.
    FocusLost,
    /// Paused between waves.
    WaveTransition,
    /// Paused while content loads.
    Loading,
}

impl PauseReason {
    /// Check if this reason pauses combat.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        !matches!(self, Self::NotPaused)
    }
}

/// Pause flag polled by the engine every tick.
///
/// Pauses nest: resuming one reason falls back to the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseState {
    reason: PauseReason,
    pause_stack: Vec<PauseReason>,
}

impl PauseState {
    /// Create an unpaused state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pause reason.
    #[must_use]
    pub const fn reason(&self) -> PauseReason {
        self.reason
    }

    /// Check if combat is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.reason.is_paused()
    }

    /// Pause for a reason.
    pub fn pause(&mut self, reason: PauseReason) {
        if !reason.is_paused() || self.reason == reason {
            return;
        }
        if self.reason.is_paused() {
            self.pause_stack.push(self.reason);
        }
        self.reason = reason;
    }

    /// Resume from the current reason.
    pub fn resume(&mut self) {
        self.resume_from(self.reason);
    }

    /// Resume from a specific reason.
    pub fn resume_from(&mut self, reason: PauseReason) {
        if self.reason != reason {
            self.pause_stack.retain(|r| *r != reason);
            return;
        }
        self.reason = self.pause_stack.pop().unwrap_or(PauseReason::NotPaused);
    }

    /// Clear every pause reason.
    pub fn force_resume(&mut self) {
        self.pause_stack.clear();
        self.reason = PauseReason::NotPaused;
    }
}

// ============================================================================
// Tick Gate
// ============================================================================

/// Result of feeding one host timestamp through a [`TickGate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateStep {
    /// Paused; nothing may advance.
    Paused,
    /// First unpaused step after a pause; time spent paused is discarded.
    Resumed,
    /// Normal step with the seconds elapsed since the previous step.
    Advanced(f64),
}

/// Converts host timestamps into pause-aware deltas.
#[derive(Debug, Clone, Default)]
pub struct TickGate {
    last_seen: Option<Timestamp>,
    was_paused: bool,
}

impl TickGate {
    /// Create a gate that has not seen a timestamp yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current host time.
    pub fn step(&mut self, now: Timestamp, paused: bool) -> GateStep {
        let elapsed = self.last_seen.map_or(0.0, |last| now.elapsed_since(last));
        self.last_seen = Some(now);
        if paused {
            self.was_paused = true;
            return GateStep::Paused;
        }
        if self.was_paused {
            self.was_paused = false;
            return GateStep::Resumed;
        }
        GateStep::Advanced(elapsed)
    }

    /// Last host time seen.
    #[must_use]
    pub const fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }
}

// ============================================================================
// Task Queue
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Task {
    due: f64,
    repeat: Option<f64>,
}

/// Keyed one-shot and repeating tasks on a pause-aware clock.
///
/// The queue keeps its own clock that only moves while unpaused, so a task
/// scheduled for two seconds fires after two seconds of unpaused play no
/// matter how long the game sat paused in between. Delays are measured from
/// the last [`TaskQueue::advance`].
#[derive(Debug, Clone)]
pub struct TaskQueue<K: Ord + Clone> {
    gate: TickGate,
    clock: f64,
    tasks: BTreeMap<K, Task>,
}

impl<K: Ord + Clone> Default for TaskQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> TaskQueue<K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: TickGate::new(),
            clock: 0.0,
            tasks: BTreeMap::new(),
        }
    }

    /// Schedule a task that fires once after `delay` seconds.
    ///
    /// Returns `false` and leaves the existing task alone if the key is
    /// already scheduled.
    pub fn schedule_once(&mut self, key: K, delay: f64) -> bool {
        self.insert_if_absent(key, delay, None)
    }

    /// Schedule a task that fires every `interval` seconds until cancelled.
    pub fn schedule_repeating(&mut self, key: K, interval: f64) -> bool {
        self.insert_if_absent(key, interval, Some(interval))
    }

    /// Cancel a task.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.tasks.remove(key).is_some()
    }

    /// Cancel every task whose key fails the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.tasks.retain(|key, _| keep(key));
    }

    /// Check if a task is scheduled.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    /// Seconds of unpaused time until a task fires.
    #[must_use]
    pub fn remaining(&self, key: &K) -> Option<f64> {
        self.tasks
            .get(key)
            .map(|task| (task.due - self.clock).max(0.0))
    }

    /// Number of scheduled tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance the clock and return every task that came due, earliest first.
    ///
    /// Repeating tasks fire at most once per call and are re-armed from the
    /// current clock, so a long frame never produces a burst of catch-up fires.
    pub fn advance(&mut self, now: Timestamp, paused: bool) -> Vec<K> {
        match self.gate.step(now, paused) {
            GateStep::Paused | GateStep::Resumed => return Vec::new(),
            GateStep::Advanced(elapsed) => self.clock += elapsed,
        }

        let clock = self.clock;
        let mut due: Vec<(f64, K)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.due <= clock + DUE_EPSILON)
            .map(|(key, task)| (task.due, key.clone()))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        for (_, key) in &due {
            let repeat = self.tasks.get(key).and_then(|task| task.repeat);
            match repeat {
                Some(interval) => {
                    if let Some(task) = self.tasks.get_mut(key) {
                        task.due = clock + interval;
                    }
                },
                None => {
                    self.tasks.remove(key);
                },
            }
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    fn insert_if_absent(&mut self, key: K, delay: f64, repeat: Option<f64>) -> bool {
        if self.tasks.contains_key(&key) {
            return false;
        }
        self.tasks.insert(
            key,
            Task {
                due: self.clock + delay.max(0.0),
                repeat,
            },
        );
        true
    }
}

// ============================================================================
// Damage Over Time
// ============================================================================

/// What is dealing damage over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DotSource {
    /// An attack lingering on its target.
    Attack(ObjectId),
    /// An area of effect.
    AreaOfEffect(ObjectId),
    /// A status effect on the target it is attached to.
    StatusEffect(StatusEffectId),
}

impl DotSource {
    /// Sweep lane this source belongs to.
    #[must_use]
    pub const fn category(self) -> DotCategory {
        match self {
            Self::Attack(_) => DotCategory::Attack,
            Self::AreaOfEffect(_) => DotCategory::AreaOfEffect,
            Self::StatusEffect(_) => DotCategory::StatusEffect,
        }
    }

    /// Object behind this source, if it is a spawned object.
    #[must_use]
    pub const fn object(self) -> Option<ObjectId> {
        match self {
            Self::Attack(id) | Self::AreaOfEffect(id) => Some(id),
            Self::StatusEffect(_) => None,
        }
    }
}

/// Independent sweep lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DotCategory {
    /// Attack-driven ticks.
    Attack,
    /// Area-of-effect-driven ticks.
    AreaOfEffect,
    /// Status-effect-driven ticks.
    StatusEffect,
}

impl DotCategory {
    /// Every lane, in sweep order.
    pub const ALL: [Self; 3] = [Self::Attack, Self::AreaOfEffect, Self::StatusEffect];

    const fn lane(self) -> usize {
        match self {
            Self::Attack => 0,
            Self::AreaOfEffect => 1,
            Self::StatusEffect => 2,
        }
    }
}

/// One (source, target) pair being ticked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DotEntry {
    /// Damage source
    pub source: DotSource,
    /// Target entity
    pub target: EntityId,
    /// When the pair last fired
    pub last_tick: Timestamp,
}

/// How much work one lane may do per sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SweepBudget {
    /// Stop after this many wall-clock milliseconds.
    Millis(f64),
    /// Stop after visiting this many entries.
    Entries(usize),
    /// Visit every entry.
    Unbounded,
}

/// Deferred changes to the scheduler produced while it is being swept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DotCommand {
    /// Start ticking a pair.
    Register {
        /// Damage source
        source: DotSource,
        /// Target entity
        target: EntityId,
    },
    /// Stop ticking a pair.
    Remove {
        /// Damage source
        source: DotSource,
        /// Target entity
        target: EntityId,
    },
    /// Stop ticking everything from a source.
    RemoveSource(DotSource),
    /// Stop ticking everything on a target.
    RemoveTarget(EntityId),
}

/// Callbacks the sweep uses to look up and fire entries.
pub trait DotHost {
    /// Seconds between ticks for a pair, or `None` if the pair is dead and
    /// should be pruned.
    fn tick_interval(&self, source: DotSource, target: EntityId) -> Option<f64>;

    /// Apply one tick.
    fn fire(&mut self, source: DotSource, target: EntityId);
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries visited
    pub visited: usize,
    /// Entries that fired
    pub fired: usize,
    /// Entries pruned
    pub pruned: usize,
    /// Lanes that ran out of budget
    pub exhausted_lanes: usize,
}

/// Entries swept in order, with a (source, target) index beside them.
///
/// Entries before `cursor` were visited this round; the rest are pending.
#[derive(Debug, Clone, Default)]
struct DotLane {
    entries: Vec<DotEntry>,
    index: AHashMap<(DotSource, EntityId), usize>,
    cursor: usize,
}

impl DotLane {
    fn position(&self, source: DotSource, target: EntityId) -> Option<usize> {
        self.index.get(&(source, target)).copied()
    }

    fn insert(&mut self, entry: DotEntry) -> bool {
        match self.index.entry((entry.source, entry.target)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(entry);
                true
            },
        }
    }

    /// Swap-remove an entry without letting a pending entry slip into the
    /// visited part of the round.
    fn remove_at(&mut self, index: usize) {
        let removed = self.entries.swap_remove(index);
        self.index.remove(&(removed.source, removed.target));

        let len = self.entries.len();
        if index < len {
            if index < self.cursor {
                self.cursor -= 1;
                self.entries.swap(index, self.cursor);
                self.reindex_at(self.cursor);
            }
            self.reindex_at(index);
        }
        if self.cursor >= len {
            self.cursor = 0;
        }
    }

    fn reindex_at(&mut self, index: usize) {
        let entry = &self.entries[index];
        self.index.insert((entry.source, entry.target), index);
    }

    fn retain(&mut self, mut keep: impl FnMut(&DotEntry) -> bool) -> usize {
        let cursor = self.cursor;
        let mut removed_before_cursor = 0;
        let mut index = 0;
        let before = self.entries.len();
        self.entries.retain(|entry| {
            let kept = keep(entry);
            if !kept && index < cursor {
                removed_before_cursor += 1;
            }
            index += 1;
            kept
        });
        self.cursor -= removed_before_cursor;
        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }

        let removed = before - self.entries.len();
        if removed > 0 {
            self.index.clear();
            for (i, entry) in self.entries.iter().enumerate() {
                self.index.insert((entry.source, entry.target), i);
            }
        }
        removed
    }

    fn sweep(&mut self, now: Timestamp, budget: SweepBudget, host: &mut dyn DotHost) -> SweepReport {
        let mut report = SweepReport::default();
        let len = self.entries.len();
        if len == 0 {
            return report;
        }
        if self.cursor >= len {
            self.cursor = 0;
        }

        let started = Instant::now();
        let mut dead = Vec::new();
        while report.visited < len {
            let out_of_budget = match budget {
                SweepBudget::Entries(limit) => report.visited >= limit.max(1),
                SweepBudget::Millis(ms) => {
                    report.visited > 0 && started.elapsed().as_secs_f64() * 1000.0 >= ms
                },
                SweepBudget::Unbounded => false,
            };
            if out_of_budget {
                report.exhausted_lanes = 1;
                break;
            }

            let index = (self.cursor + report.visited) % len;
            report.visited += 1;
            let entry = &mut self.entries[index];
            let (source, target) = (entry.source, entry.target);
            match host.tick_interval(source, target) {
                None => dead.push(index),
                Some(interval) => {
                    if now.elapsed_since(entry.last_tick) + DUE_EPSILON >= interval {
                        entry.last_tick = now;
                        host.fire(source, target);
                        report.fired += 1;
                    }
                },
            }
        }
        self.cursor = (self.cursor + report.visited) % len;

        if !dead.is_empty() {
            dead.sort_unstable();
            for index in dead.into_iter().rev() {
                self.remove_at(index);
                report.pruned += 1;
            }
        }
        report
    }
}

/// Recurring sweep that re-fires damage for every live (source, target) pair
/// whose interval has elapsed.
///
/// Each category sweeps independently with its own budget and resumes where
/// it stopped on the next call, so no entry is starved.
#[derive(Debug, Clone)]
pub struct DamageOverTimeScheduler {
    lanes: [DotLane; 3],
    gate: TickGate,
    budget: SweepBudget,
}

impl Default for DamageOverTimeScheduler {
    fn default() -> Self {
        Self::new(SweepBudget::Unbounded)
    }
}

impl DamageOverTimeScheduler {
    /// Create a scheduler with a per-lane budget.
    #[must_use]
    pub fn new(budget: SweepBudget) -> Self {
        Self {
            lanes: Default::default(),
            gate: TickGate::new(),
            budget,
        }
    }

    /// Per-lane budget.
    #[must_use]
    pub const fn budget(&self) -> SweepBudget {
        self.budget
    }

    /// Change the per-lane budget.
    pub fn set_budget(&mut self, budget: SweepBudget) {
        self.budget = budget;
    }

    /// Start ticking a pair. The first tick comes one interval after `now`.
    ///
    /// Returns `false` if the pair is already registered.
    pub fn register(&mut self, source: DotSource, target: EntityId, now: Timestamp) -> bool {
        self.lanes[source.category().lane()].insert(DotEntry {
            source,
            target,
            last_tick: now,
        })
    }

    /// Stop ticking a pair.
    pub fn remove(&mut self, source: DotSource, target: EntityId) -> bool {
        let lane = &mut self.lanes[source.category().lane()];
        match lane.position(source, target) {
            Some(index) => {
                lane.remove_at(index);
                true
            },
            None => false,
        }
    }

    /// Stop ticking everything from a source. Returns how many pairs were removed.
    pub fn remove_source(&mut self, source: DotSource) -> usize {
        self.lanes[source.category().lane()].retain(|e| e.source != source)
    }

    /// Stop ticking everything on a target. Returns how many pairs were removed.
    pub fn remove_target(&mut self, target: EntityId) -> usize {
        self.lanes
            .iter_mut()
            .map(|lane| lane.retain(|e| e.target != target))
            .sum()
    }

    /// Apply deferred commands.
    pub fn apply(&mut self, commands: impl IntoIterator<Item = DotCommand>, now: Timestamp) {
        for command in commands {
            match command {
                DotCommand::Register { source, target } => {
                    self.register(source, target, now);
                },
                DotCommand::Remove { source, target } => {
                    self.remove(source, target);
                },
                DotCommand::RemoveSource(source) => {
                    self.remove_source(source);
                },
                DotCommand::RemoveTarget(target) => {
                    self.remove_target(target);
                },
            }
        }
    }

    /// Check if a pair is registered.
    #[must_use]
    pub fn contains(&self, source: DotSource, target: EntityId) -> bool {
        self.lanes[source.category().lane()]
            .position(source, target)
            .is_some()
    }

    /// A registered pair.
    #[must_use]
    pub fn entry(&self, source: DotSource, target: EntityId) -> Option<&DotEntry> {
        let lane = &self.lanes[source.category().lane()];
        lane.position(source, target).map(|index| &lane.entries[index])
    }

    /// Entries in one lane, in sweep order.
    #[must_use]
    pub fn entries(&self, category: DotCategory) -> &[DotEntry] {
        &self.lanes[category.lane()].entries
    }

    /// Total registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.iter().map(|lane| lane.entries.len()).sum()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one sweep of every lane.
    ///
    /// Paused sweeps do nothing. The first sweep after a pause re-stamps
    /// every entry to `now` instead of firing, so time spent paused never
    /// turns into a backlog.
    pub fn sweep(&mut self, now: Timestamp, paused: bool, host: &mut dyn DotHost) -> SweepReport {
        match self.gate.step(now, paused) {
            GateStep::Paused => return SweepReport::default(),
            GateStep::Resumed => {
                for entry in self.lanes.iter_mut().flat_map(|lane| lane.entries.iter_mut()) {
                    entry.last_tick = now;
                }
                debug!("Damage over time resumed with {} entries", self.len());
                return SweepReport::default();
            },
            GateStep::Advanced(_) => {},
        }

        let budget = self.budget;
        let mut total = SweepReport::default();
        for lane in &mut self.lanes {
            let report = lane.sweep(now, budget, host);
            total.visited += report.visited;
            total.fired += report.fired;
            total.pruned += report.pruned;
            total.exhausted_lanes += report.exhausted_lanes;
        }
        total
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Default)]
    struct RecordingHost {
        interval: f64,
        dead: BTreeSet<EntityId>,
        fired: Vec<(DotSource, EntityId)>,
    }

    impl DotHost for RecordingHost {
        fn tick_interval(&self, _source: DotSource, target: EntityId) -> Option<f64> {
            (!self.dead.contains(&target)).then_some(self.interval)
        }

        fn fire(&mut self, source: DotSource, target: EntityId) {
            self.fired.push((source, target));
        }
    }

    fn at(secs: f64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_pause_state_nesting() {
        let mut pause = PauseState::new();
        pause.pause(PauseReason::Player);
        pause.pause(PauseReason::Menu);
        assert_eq!(pause.reason(), PauseReason::Menu);

        pause.resume();
        assert_eq!(pause.reason(), PauseReason::Player);

        pause.pause(PauseReason::Loading);
        pause.resume_from(PauseReason::Player);
        assert_eq!(pause.reason(), PauseReason::Loading);
        pause.resume();
        assert!(!pause.is_paused());

        pause.pause(PauseReason::FocusLost);
        pause.pause(PauseReason::WaveTransition);
        pause.force_resume();
        assert!(!pause.is_paused());
    }

    #[test]
    fn test_tick_gate_discards_paused_time() {
        let mut gate = TickGate::new();
        assert_eq!(gate.step(at(0.0), false), GateStep::Advanced(0.0));
        assert_eq!(gate.step(at(0.5), false), GateStep::Advanced(0.5));
        assert_eq!(gate.step(at(3.0), true), GateStep::Paused);
        assert_eq!(gate.step(at(9.0), false), GateStep::Resumed);
        assert_eq!(gate.step(at(9.25), false), GateStep::Advanced(0.25));
    }

    #[test]
    fn test_task_queue_once_is_idempotent() {
        let mut queue = TaskQueue::new();
        queue.advance(at(0.0), false);
        assert!(queue.schedule_once("parry", 1.0));
        assert!(!queue.schedule_once("parry", 5.0));

        assert!(queue.advance(at(0.9), false).is_empty());
        assert_eq!(queue.advance(at(1.0), false), vec!["parry"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_task_queue_pause_does_not_advance() {
        let mut queue = TaskQueue::new();
        queue.advance(at(0.0), false);
        queue.schedule_once(1u32, 1.0);

        queue.advance(at(0.5), false);
        assert!(queue.advance(at(10.0), true).is_empty());
        assert!(queue.advance(at(10.1), false).is_empty());
        assert!((queue.remaining(&1).unwrap_or_default() - 0.5).abs() < 1e-9);
        assert_eq!(queue.advance(at(10.6), false), vec![1]);
    }

    #[test]
    fn test_task_queue_repeating_without_backlog() {
        let mut queue = TaskQueue::new();
        queue.advance(at(0.0), false);
        queue.schedule_repeating("regen", 1.0);

        assert_eq!(queue.advance(at(5.0), false), vec!["regen"]);
        assert!(queue.advance(at(5.5), false).is_empty());
        assert_eq!(queue.advance(at(6.0), false), vec!["regen"]);
        assert!(queue.cancel(&"regen"));
        assert!(queue.advance(at(20.0), false).is_empty());
    }

    #[test]
    fn test_task_queue_fires_in_due_order() {
        let mut queue = TaskQueue::new();
        queue.advance(at(0.0), false);
        queue.schedule_once(3u32, 0.3);
        queue.schedule_once(1u32, 0.5);
        queue.schedule_once(2u32, 0.1);
        assert_eq!(queue.advance(at(1.0), false), vec![2, 3, 1]);
    }

    #[test]
    fn test_dot_first_tick_after_one_interval() {
        let mut scheduler = DamageOverTimeScheduler::default();
        let mut host = RecordingHost {
            interval: 1.0,
            ..Default::default()
        };
        let target = EntityId::new();
        let source = DotSource::Attack(ObjectId::new());

        scheduler.sweep(at(0.0), false, &mut host);
        assert!(scheduler.register(source, target, at(0.0)));
        assert!(!scheduler.register(source, target, at(0.0)));

        scheduler.sweep(at(0.5), false, &mut host);
        assert!(host.fired.is_empty());
        scheduler.sweep(at(1.0), false, &mut host);
        assert_eq!(host.fired, vec![(source, target)]);
        scheduler.sweep(at(1.5), false, &mut host);
        assert_eq!(host.fired.len(), 1);
    }

    #[test]
    fn test_dot_pause_never_fires_backlog() {
        let mut scheduler = DamageOverTimeScheduler::default();
        let mut host = RecordingHost {
            interval: 1.0,
            ..Default::default()
        };
        let target = EntityId::new();
        let source = DotSource::AreaOfEffect(ObjectId::new());

        scheduler.sweep(at(0.0), false, &mut host);
        scheduler.register(source, target, at(0.0));
        scheduler.sweep(at(0.5), false, &mut host);

        for step in 1..50 {
            scheduler.sweep(at(0.5 + f64::from(step)), true, &mut host);
        }
        assert!(host.fired.is_empty());

        scheduler.sweep(at(60.0), false, &mut host);
        assert!(host.fired.is_empty());
        scheduler.sweep(at(60.5), false, &mut host);
        assert!(host.fired.is_empty());
        scheduler.sweep(at(61.0), false, &mut host);
        assert_eq!(host.fired.len(), 1);
    }

    #[test]
    fn test_dot_budget_round_robin() {
        let mut scheduler = DamageOverTimeScheduler::new(SweepBudget::Entries(2));
        let mut host = RecordingHost {
            interval: 0.0,
            ..Default::default()
        };
        let source = DotSource::StatusEffect(StatusEffectId::Burning);
        let targets: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();

        scheduler.sweep(at(0.0), false, &mut host);
        for target in &targets {
            scheduler.register(source, *target, at(0.0));
        }

        let mut fired_per_target = vec![0usize; targets.len()];
        for step in 1..=5 {
            let report = scheduler.sweep(at(f64::from(step)), false, &mut host);
            assert_eq!(report.visited, 2);
            assert_eq!(report.exhausted_lanes, 1);
        }
        for (_, target) in &host.fired {
            if let Some(i) = targets.iter().position(|t| t == target) {
                fired_per_target[i] += 1;
            }
        }
        assert_eq!(fired_per_target, vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_dot_prunes_dead_pairs() {
        let mut scheduler = DamageOverTimeScheduler::default();
        let mut host = RecordingHost {
            interval: 0.0,
            ..Default::default()
        };
        let alive = EntityId::new();
        let dead = EntityId::new();
        let source = DotSource::Attack(ObjectId::new());

        scheduler.register(source, dead, at(0.0));
        scheduler.register(source, alive, at(0.0));
        host.dead.insert(dead);

        let report = scheduler.sweep(at(1.0), false, &mut host);
        assert_eq!(report.pruned, 1);
        assert_eq!(host.fired, vec![(source, alive)]);
        assert!(!scheduler.contains(source, dead));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_dot_lookups_follow_removals() {
        let mut scheduler = DamageOverTimeScheduler::default();
        let source = DotSource::StatusEffect(StatusEffectId::Poisoning);
        let targets: Vec<EntityId> = (0..100).map(|_| EntityId::new()).collect();
        for (i, target) in targets.iter().enumerate() {
            scheduler.register(source, *target, at(i as f64));
        }

        for target in targets.iter().step_by(2) {
            assert!(scheduler.remove(source, *target));
        }
        assert_eq!(scheduler.remove_target(targets[1]), 1);

        assert_eq!(scheduler.len(), 49);
        for (i, target) in targets.iter().enumerate() {
            let expected = i % 2 == 1 && i != 1;
            assert_eq!(scheduler.contains(source, *target), expected, "target {i}");
            if expected {
                let entry = scheduler.entry(source, *target).expect("registered");
                assert_eq!(entry.target, *target);
                assert_eq!(entry.last_tick, at(i as f64));
            }
        }
        assert!(!scheduler.register(source, targets[3], at(0.0)));
        assert!(scheduler.register(source, targets[0], at(0.0)));
    }

    #[test]
    fn test_dot_removal_mid_round_skips_no_one() {
        let mut scheduler = DamageOverTimeScheduler::new(SweepBudget::Entries(2));
        let mut host = RecordingHost {
            interval: 0.0,
            ..Default::default()
        };
        let source = DotSource::StatusEffect(StatusEffectId::Burning);
        let targets: Vec<EntityId> = (0..6).map(|_| EntityId::new()).collect();

        scheduler.sweep(at(0.0), false, &mut host);
        for target in &targets {
            scheduler.register(source, *target, at(0.0));
        }
        scheduler.sweep(at(1.0), false, &mut host);
        assert!(scheduler.remove(source, targets[0]));
        scheduler.sweep(at(2.0), false, &mut host);
        scheduler.sweep(at(3.0), false, &mut host);

        for target in &targets[1..] {
            let hits = host.fired.iter().filter(|(_, t)| t == target).count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_dot_remove_by_source_and_target() {
        let mut scheduler = DamageOverTimeScheduler::default();
        let a = DotSource::Attack(ObjectId::new());
        let b = DotSource::AreaOfEffect(ObjectId::new());
        let t1 = EntityId::new();
        let t2 = EntityId::new();

        scheduler.apply(
            [
                DotCommand::Register { source: a, target: t1 },
                DotCommand::Register { source: a, target: t2 },
                DotCommand::Register { source: b, target: t1 },
            ],
            at(0.0),
        );
        assert_eq!(scheduler.len(), 3);
        assert_eq!(scheduler.entries(DotCategory::Attack).len(), 2);

        assert_eq!(scheduler.remove_target(t1), 2);
        assert_eq!(scheduler.remove_source(a), 1);
        assert!(scheduler.is_empty());
        assert!(!scheduler.remove(b, t1));
    }
}
