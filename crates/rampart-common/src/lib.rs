//! # Rampart Common
//!
//! Common types shared by the Rampart combat crates.
//!
//! This crate provides:
//! - ID types (EntityId, ObjectId)
//! - Simulation timestamps
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod time;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::time::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1.is_valid());
        assert!(!EntityId::NULL.is_valid());
    }

    #[test]
    fn test_object_ids_are_independent_of_entities() {
        let object = ObjectId::new();
        assert!(object.is_valid());
        assert_eq!(ObjectId::from_raw(object.raw()), object);
    }

    #[test]
    fn test_timestamp_elapsed() {
        let start = Timestamp::from_secs(1.5);
        let later = start.advanced_by(0.25);
        assert!((later.elapsed_since(start) - 0.25).abs() < f64::EPSILON);
        assert_eq!(start.elapsed_since(later), 0.0);
    }
}
