//! # Arcane Siege Server
//!
//! Authoritative rules engine and room server for Arcane Siege, a
//! two-team tactics game on a 9x9 grid where each side tries to destroy
//! the other's Core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ARCANE SIEGE SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Cell coordinates and distances            │
//! │  ├── rng.rs      - Injectable randomness, Xorshift128+       │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Rules (synchronous, pure)                 │
//! │  ├── board.rs    - Obstacles                                 │
//! │  ├── unit.rs     - Teams, classes, unit registry             │
//! │  ├── state.rs    - Match state and generation                │
//! │  ├── resolver.rs - Move and ability resolution               │
//! │  ├── turn.rs     - Turn lifecycle and submission             │
//! │  └── bot.rs      - Scripted opponent                         │
//! │                                                              │
//! │  network/        - Room server                               │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Rooms and the room manager                │
//! │                                                              │
//! │  client/         - Collaborator side                         │
//! │  ├── controller.rs - Offline/online game controller          │
//! │  └── connection.rs - WebSocket connector                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or global randomness. Every
//! random choice (caster classes, obstacles, bot picks) comes from a
//! [`RandomSource`](core::rng::RandomSource), so the same seed replays the
//! same match.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod client;

// Re-export commonly used types
pub use core::grid::GridPos;
pub use core::rng::{DeterministicRng, RandomSource};
pub use game::intent::Intent;
pub use game::state::{MatchConfig, MatchState};
pub use game::unit::{Team, UnitClass, UnitId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cells per board side
pub const BOARD_SIZE: i32 = 9;

/// Rounds between two casts of the same unit
pub const ABILITY_COOLDOWN_TURNS: u32 = 3;

/// Stun applied by Cryo
pub const STUN_TURNS: u32 = 2;

/// Caster starting and maximum hit points
pub const CASTER_MAX_HP: i32 = 2;

/// Core hit points
pub const CORE_HP: i32 = 3;

/// Obstacles per match
pub const OBSTACLE_COUNT: usize = 5;

/// `last_ability_turn` of a fresh unit, so a cast is ready on turn 1
pub const INITIAL_LAST_ABILITY_TURN: i32 = -(ABILITY_COOLDOWN_TURNS as i32);
