//! Game Logic Module
//!
//! The rules engine. Synchronous and deterministic given a
//! [`RandomSource`](crate::core::rng::RandomSource).
//!
//! ## Module Structure
//!
//! - `board`: Obstacle layout
//! - `unit`: Teams, classes, the unit registry
//! - `state`: Match state aggregate and match generation
//! - `events`: Effect events for the renderer
//! - `intent`: Move / Ability requests
//! - `resolver`: Pure validation and application of one intent
//! - `turn`: Turn passing, win detection, the ability gate, `submit`
//! - `bot`: Scripted opponent

pub mod board;
pub mod unit;
pub mod state;
pub mod events;
pub mod intent;
pub mod resolver;
pub mod turn;
pub mod bot;

// Re-export key types
pub use board::Board;
pub use unit::{Team, Unit, UnitClass, UnitId, UnitRegistry};
pub use state::{MatchConfig, MatchState};
pub use events::{EffectEvent, EffectKind};
pub use intent::Intent;
pub use resolver::{Rejection, Resolution};
pub use turn::{ActionError, CooldownCheck, Submission, TurnPhase, TurnTransition};
pub use bot::BotAction;
