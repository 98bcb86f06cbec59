//! Room Management
//!
//! A room binds a room id to one match and up to two connections. The
//! [`RoomManager`] owns every room; each room sits behind its own lock so
//! intents for one room are strictly serialized while different rooms
//! proceed in parallel.
//!
//! Lock order is always manager first, then room. Sends never wait on a
//! connection: each member has a bounded queue, and a full queue drops
//! the message for that member only.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::rng::{derive_match_seed, DeterministicRng};
use crate::game::state::{MatchConfig, MatchState};
use crate::game::turn::{submit, ActionError, Submission};
use crate::game::unit::Team;
use crate::network::protocol::{ActionRequest, ServerMessage};

/// Connection identifier, assigned by the server on accept.
pub type ConnectionId = Uuid;

/// Session errors. Sent to the offending connection only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Room already has two connections.
    #[error("Room full")]
    RoomFull,

    /// The connection has not joined a room.
    #[error("No room")]
    NoRoom,

    /// The connection is already in a room.
    #[error("Already joined")]
    AlreadyJoined,

    /// The rules engine refused the submission.
    #[error(transparent)]
    Action(#[from] ActionError),
}

// =============================================================================
// CONFIG
// =============================================================================

/// How rooms seed their match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Fresh seed per room from clock entropy, match id and room id.
    #[default]
    Entropy,
    /// Same seed for every room.
    Fixed(u64),
}

/// Configuration applied to every new room.
#[derive(Debug, Clone, Default)]
pub struct RoomConfig {
    /// Match generation parameters.
    pub match_config: MatchConfig,
    /// Seed policy.
    pub seed: SeedPolicy,
}

impl RoomConfig {
    fn seed_for(&self, room_id: &str, match_id: &[u8; 16]) -> u64 {
        match self.seed {
            SeedPolicy::Fixed(seed) => seed,
            SeedPolicy::Entropy => {
                let mut entropy = [0u8; 32];
                let now = Utc::now();
                let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
                entropy[..8].copy_from_slice(&nanos.to_le_bytes());
                entropy[8..24].copy_from_slice(Uuid::new_v4().as_bytes());
                derive_match_seed(&entropy, match_id, room_id)
            }
        }
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// A connection seated in a room.
#[derive(Debug)]
pub struct RoomMember {
    /// Connection id.
    pub connection: ConnectionId,
    /// Team this connection plays.
    pub team: Team,
    /// Outbound channel to the connection's writer task.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// One match and its connections.
pub struct Room {
    /// Room id chosen by the clients.
    pub id: String,
    /// Unique id of this room's match.
    pub match_id: [u8; 16],
    /// Seed the match was generated from.
    pub seed: u64,
    /// The only authoritative copy of the match.
    state: MatchState,
    /// At most two.
    members: Vec<RoomMember>,
    /// When the room was created.
    created_at: DateTime<Utc>,
}

impl Room {
    /// Most connections a room accepts.
    pub const CAPACITY: usize = 2;

    /// Create a room with a freshly generated match.
    pub fn new(id: impl Into<String>, config: &RoomConfig) -> Self {
        let id = id.into();
        let match_id = Uuid::new_v4().into_bytes();
        let seed = config.seed_for(&id, &match_id);
        let mut rng = DeterministicRng::new(seed);
        let state = MatchState::generate(config.match_config, &mut rng);

        Self {
            id,
            match_id,
            seed,
            state,
            members: Vec::with_capacity(Self::CAPACITY),
            created_at: Utc::now(),
        }
    }

    /// Current match state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    /// When the room was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of seated connections.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Team assigned to `connection`.
    pub fn team_of(&self, connection: &ConnectionId) -> Option<Team> {
        self.members
            .iter()
            .find(|m| &m.connection == connection)
            .map(|m| m.team)
    }

    /// Seat a connection on the free team, A before B.
    pub fn add_member(
        &mut self,
        connection: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Team, SessionError> {
        if self.team_of(&connection).is_some() {
            return Err(SessionError::AlreadyJoined);
        }
        let team = [Team::A, Team::B]
            .into_iter()
            .find(|team| self.members.iter().all(|m| m.team != *team))
            .ok_or(SessionError::RoomFull)?;

        self.members.push(RoomMember { connection, team, sender });
        Ok(team)
    }

    /// Remove a connection. Returns whether it was seated here.
    pub fn remove_member(&mut self, connection: &ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| &m.connection != connection);
        self.members.len() != before
    }

    /// Validate and apply an action from `connection`.
    ///
    /// `Ok(None)` for unknown action kinds, which change nothing.
    pub fn apply_action(
        &mut self,
        connection: &ConnectionId,
        request: &ActionRequest,
    ) -> Result<Option<Submission>, SessionError> {
        let assigned = self.team_of(connection).ok_or(SessionError::NoRoom)?;

        if self.state.is_finished() {
            return Err(ActionError::GameFinished.into());
        }
        // unknown or missing team names never match
        let team = request.team
            .filter(|team| *team == self.state.current_turn && *team == assigned)
            .ok_or(ActionError::NotYourTurn)?;
        let owns_unit = request.selected_unit_id
            .as_ref()
            .and_then(|id| self.state.units.get(id))
            .is_some_and(|u| u.team == team);
        if !owns_unit {
            return Err(ActionError::InvalidUnit.into());
        }

        let Some(intent) = request.to_intent() else {
            return Ok(None);
        };
        let submission = submit(&mut self.state, team, &intent)?;
        Ok(Some(submission))
    }

    fn deliver(&self, member: &RoomMember, message: ServerMessage) {
        match member.sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(room = %self.id, connection = %member.connection, "outbound queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(room = %self.id, connection = %member.connection, "connection already closed");
            }
        }
    }

    /// Queue a message for one connection.
    pub fn send_to(&self, connection: &ConnectionId, message: ServerMessage) {
        if let Some(member) = self.members.iter().find(|m| &m.connection == connection) {
            self.deliver(member, message);
        }
    }

    /// Queue a message for every connection.
    pub fn broadcast(&self, message: ServerMessage) {
        for member in &self.members {
            self.deliver(member, message.clone());
        }
    }

    /// Broadcast canonical state, then drop the effects it carried so
    /// each one is delivered once.
    pub fn broadcast_state(&mut self) {
        #[cfg(feature = "debug-tracing")]
        if let Ok(json) = self.state.to_json() {
            tracing::trace!(room = %self.id, state = %json, "broadcasting state");
        }

        self.broadcast(ServerMessage::state(&self.state));
        self.state.take_effects();
    }
}

// =============================================================================
// ROOM MANAGER
// =============================================================================

/// Owns every live room.
pub struct RoomManager {
    /// Rooms by id.
    rooms: RwLock<BTreeMap<String, Arc<RwLock<Room>>>>,
    /// Connection to room id.
    memberships: RwLock<BTreeMap<ConnectionId, String>>,
    /// Applied to new rooms.
    config: RoomConfig,
}

impl RoomManager {
    /// Create a manager.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            memberships: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Join `room_id`, creating it if needed.
    ///
    /// Sends `joined` to the joiner, `peer-joined` to everyone, and the
    /// starting `state` once both seats are filled. The manager locks are
    /// released before anything is sent.
    pub async fn join(
        &self,
        connection: ConnectionId,
        room_id: &str,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Team, SessionError> {
        let mut rooms = self.rooms.write().await;
        let mut memberships = self.memberships.write().await;

        if memberships.contains_key(&connection) {
            return Err(SessionError::AlreadyJoined);
        }

        let room = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room = %room_id, "room created");
                Arc::new(RwLock::new(Room::new(room_id, &self.config)))
            })
            .clone();
        let mut room = room.write_owned().await;

        let team = room.add_member(connection, sender)?;
        memberships.insert(connection, room_id.to_string());
        drop(memberships);
        drop(rooms);

        let count = room.member_count();
        info!(room = %room_id, %connection, %team, count, "connection joined");

        room.send_to(&connection, ServerMessage::Joined {
            assigned_team: team,
            state: Box::new(room.state().clone()),
        });
        room.broadcast(ServerMessage::PeerJoined { count });
        if count == Room::CAPACITY {
            room.broadcast_state();
        }

        Ok(team)
    }

    /// Apply an action and broadcast the resulting state to the room.
    pub async fn act(
        &self,
        connection: &ConnectionId,
        request: &ActionRequest,
    ) -> Result<(), SessionError> {
        let room = {
            let rooms = self.rooms.read().await;
            let memberships = self.memberships.read().await;
            memberships
                .get(connection)
                .and_then(|room_id| rooms.get(room_id))
                .cloned()
                .ok_or(SessionError::NoRoom)?
        };
        let mut room = room.write().await;

        match room.apply_action(connection, request)? {
            Some(Submission { outcome: Err(rejection), .. }) => {
                debug!(room = %room.id, unit = ?request.selected_unit_id, %rejection, "action rejected");
            }
            Some(Submission { transition: Some(transition), .. }) => {
                debug!(room = %room.id, unit = ?request.selected_unit_id, ?transition, "action applied");
                if room.state().is_finished() {
                    let hash = room.state().compute_hash();
                    info!(
                        room = %room.id,
                        winner = ?room.state().winner,
                        turn = room.state().turn_count,
                        hash = %hex::encode(hash),
                        "match finished"
                    );
                }
            }
            Some(_) => {}
            None => {
                debug!(room = %room.id, "unknown action kind ignored");
            }
        }

        room.broadcast_state();
        Ok(())
    }

    /// Remove a connection from its room. Empty rooms are destroyed;
    /// otherwise the remaining connection gets `peer-left`.
    pub async fn leave(&self, connection: &ConnectionId) {
        let mut rooms = self.rooms.write().await;
        let Some(room_id) = self.memberships.write().await.remove(connection) else {
            return;
        };
        let Some(room) = rooms.get(&room_id).cloned() else {
            return;
        };

        let mut room = room.write_owned().await;
        room.remove_member(connection);
        info!(room = %room_id, %connection, "connection left");

        if room.member_count() == 0 {
            rooms.remove(&room_id);
            info!(room = %room_id, "room closed");
            return;
        }
        drop(rooms);
        room.broadcast(ServerMessage::PeerLeft);
    }

    /// Get a room by id.
    pub async fn room(&self, room_id: &str) -> Option<Arc<RwLock<Room>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Room id `connection` is seated in.
    pub async fn room_of(&self, connection: &ConnectionId) -> Option<String> {
        self.memberships.read().await.get(connection).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
