//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON text frame with a kebab-case `type` tag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::core::grid::GridPos;
use crate::game::intent::Intent;
use crate::game::state::MatchState;
use crate::game::unit::{Team, UnitId};

/// Failure to decode an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON or not a known message
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Binary frames are not part of the protocol
    #[error("binary frames are not supported")]
    BinaryFrame,
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or create) a room.
    Join {
        /// Room to join
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Act with one unit.
    Action(ActionEnvelope),

    /// Liveness check.
    Ping,
}

/// The two accepted shapes of an `action` message: fields nested under
/// `payload` (browser client) or inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionEnvelope {
    /// `{"type":"action","payload":{...}}`
    Nested {
        /// The request
        payload: ActionRequest,
    },
    /// `{"type":"action", ...fields}`
    Flat(ActionRequest),
}

impl ActionEnvelope {
    /// The request, whichever shape it arrived in.
    pub fn request(&self) -> &ActionRequest {
        match self {
            ActionEnvelope::Nested { payload } => payload,
            ActionEnvelope::Flat(request) => request,
        }
    }
}

/// Kind of action requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Step or melee
    Move,
    /// Class ability
    Ability,
    /// Anything else; applied as a no-op
    #[serde(other)]
    Unknown,
}

/// Decode a field, treating an unreadable or missing value as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

/// One unit action as sent by a client.
///
/// `team` and `selectedUnitId` decode leniently so a bad claim still
/// reaches the room and earns an error reply instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Team the client claims to act for; `None` if unrecognized
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    /// Acting unit; `None` if missing
    #[serde(
        rename = "selectedUnitId",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_unit_id: Option<UnitId>,
    /// Move or ability
    #[serde(rename = "actionType")]
    pub action_type: ActionKind,
    /// Target cell
    #[serde(rename = "targetPos")]
    pub target_pos: GridPos,
}

impl ActionRequest {
    /// Convert to an intent. `None` for unknown action kinds or a
    /// missing unit.
    pub fn to_intent(&self) -> Option<Intent> {
        let unit = self.selected_unit_id.clone()?;
        match self.action_type {
            ActionKind::Move => Some(Intent::Move { unit, target: self.target_pos }),
            ActionKind::Ability => Some(Intent::Ability { unit, target: self.target_pos }),
            ActionKind::Unknown => None,
        }
    }

    /// Build a request from an intent.
    pub fn from_intent(team: Team, intent: &Intent) -> Self {
        let action_type = if intent.is_ability() { ActionKind::Ability } else { ActionKind::Move };
        Self {
            team: Some(team),
            selected_unit_id: Some(intent.unit().clone()),
            action_type,
            target_pos: intent.target(),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Reply to a successful join.
    Joined {
        /// Team this connection plays
        #[serde(rename = "assignedTeam")]
        assigned_team: Team,
        /// Current room state
        state: Box<MatchState>,
    },

    /// Someone joined; `count` connections are now in the room.
    PeerJoined {
        /// Connections in the room
        count: usize,
    },

    /// The other connection left.
    PeerLeft,

    /// Canonical state after a change (or an attempted one).
    State {
        /// Room state
        state: Box<MatchState>,
    },

    /// Reply to `ping`.
    Pong,

    /// Request refused; sent to the requester only.
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl ServerMessage {
    /// `state` message for a snapshot.
    pub fn state(state: &MatchState) -> Self {
        ServerMessage::State { state: Box::new(state.clone()) }
    }

    /// `error` message from any displayable error.
    pub fn error(err: impl std::fmt::Display) -> Self {
        ServerMessage::Error { message: err.to_string() }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Action message carrying `intent` for `team`.
    pub fn action(team: Team, intent: &Intent) -> Self {
        ClientMessage::Action(ActionEnvelope::Flat(ActionRequest::from_intent(team, intent)))
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }
}
