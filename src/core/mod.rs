//! Core deterministic primitives.
//!
//! Seeded randomness and state hashing. Nothing in this module reads the
//! wall clock or the environment, so sessions built on it replay exactly.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_session_seed};
pub use hash::{StateHash, StateHasher, compute_state_hash};
