//! # Rampart Combat
//!
//! Combat resolution core for a tower-defense game.
//!
//! This crate provides:
//! - Stat containers with stacked, reversible modifiers
//! - Status effects with stacking, expiry and conversion
//! - A damage-over-time scheduler with per-category sweep budgets
//! - The resolution pipeline (roll, crit, parry, block, reflect, dodge, armor, pools)
//! - Cooldowns, regeneration and attack volleys
//! - `CombatEngine`, which ties everything together behind one tick

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod attack;
pub mod catalog;
pub mod config;
pub mod container;
pub mod cooldown;
pub mod damage;
pub mod damaging;
pub mod engine;
pub mod events;
pub mod pipeline;
pub mod pool;
pub mod rng;
pub mod scheduler;
pub mod shared;
pub mod stat;
pub mod status;
pub mod vitals;
pub mod world;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attack::*;
    pub use crate::catalog::*;
    pub use crate::config::*;
    pub use crate::container::{StatContainer, StatTemplate};
    pub use crate::cooldown::*;
    pub use crate::damage::*;
    pub use crate::damaging::*;
    pub use crate::engine::*;
    pub use crate::events::*;
    pub use crate::pipeline::*;
    pub use crate::pool::*;
    pub use crate::rng::*;
    pub use crate::scheduler::*;
    pub use crate::shared::*;
    pub use crate::stat::*;
    pub use crate::status::*;
    pub use crate::vitals::*;
    pub use crate::world::*;
}

pub use prelude::*;
