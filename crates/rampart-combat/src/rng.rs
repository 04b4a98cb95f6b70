//! Random sources for combat rolls.
//!
//! This module provides:
//! - The `CombatRng` trait injected into the engine
//! - A seeded fast generator for play
//! - A scripted generator for deterministic tests and replays

use std::collections::VecDeque;

/// Source of every random draw made during resolution.
pub trait CombatRng: Send {
    /// Uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform draw in `[min, max]`. Returns `min` when the range is empty.
    fn range(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + self.next_f64() * (max - min)
    }
}

/// Fast seeded generator backed by `fastrand`.
#[derive(Debug, Clone)]
pub struct FastRng(fastrand::Rng);

impl FastRng {
    /// Create a generator seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    /// Create a generator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRng {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatRng for FastRng {
    fn next_f64(&mut self) -> f64 {
        self.0.f64()
    }
}

/// Replays a fixed list of draws, then repeats a fallback value.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    draws: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRng {
    /// Create a scripted generator.
    #[must_use]
    pub fn new(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fallback,
        }
    }

    /// A generator that always returns `value`.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::new([], value)
    }

    /// Queue more draws.
    pub fn push(&mut self, draw: f64) {
        self.draws.push_back(draw);
    }

    /// Draws still queued before the fallback kicks in.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl CombatRng for ScriptedRng {
    fn next_f64(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}
