//! Simulation time.

use serde::{Deserialize, Serialize};

/// A point on the simulation timeline, in seconds.
///
/// The host owns the timeline and passes the current timestamp into every
/// scheduling call; nothing in the combat core reads the wall clock for
/// gameplay decisions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    /// The start of the timeline.
    pub const ZERO: Self = Self(0.0);

    /// Create a timestamp from seconds.
    #[must_use]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Seconds since the start of the timeline.
    #[must_use]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, never negative.
    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// Return a timestamp `secs` later.
    #[must_use]
    pub fn advanced_by(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }
}
