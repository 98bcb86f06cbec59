//! Client Side
//!
//! - `controller`: selection, intents and bot pacing for rendering code
//! - `connection`: WebSocket link to a room server

pub mod connection;
pub mod controller;

pub use connection::{connect, ClientError, ServerLink};
pub use controller::{ActionDispatch, BotPacing, ControllerError, EffectNotice, GameController, ReplicaUpdate};
