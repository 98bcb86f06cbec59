//! Network Layer
//!
//! WebSocket room server. This layer owns connections and rooms; every
//! rule decision runs through `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ActionEnvelope, ActionKind, ActionRequest, ClientMessage, ProtocolError, ServerMessage};
pub use session::{ConnectionId, Room, RoomConfig, RoomManager, SeedPolicy, SessionError};
pub use server::{GameServer, GameServerError, ServerConfig};
