//! Core deterministic primitives.
//!
//! Grid geometry, the injectable randomness source, and state hashing.
//! Nothing here knows about units or turns.

pub mod grid;
pub mod rng;
pub mod hash;

// Re-export core types
pub use grid::{GridPos, NEIGHBOR_OFFSETS};
pub use rng::{DeterministicRng, RandomSource, ScriptedRng};
pub use hash::{compute_state_hash, StateDigest, StateHash, StateHasher};
