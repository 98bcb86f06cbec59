//! Game Controller
//!
//! The object rendering code talks to. It holds the match state (the
//! authoritative copy offline, a read-only replica online), the local
//! selection, and a broadcast feed of effect notices.
//!
//! Offline, intents go straight through [`submit`] and every human turn
//! that passes to the bot is answered, once, before `request_action`
//! returns. Online, intents become `action` messages and the state is
//! replaced by whatever the server broadcasts.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::core::grid::GridPos;
use crate::core::rng::DeterministicRng;
use crate::game::bot::{take_bot_action, BotAction};
use crate::game::events::EffectEvent;
use crate::game::intent::Intent;
use crate::game::resolver::Rejection;
use crate::game::state::{MatchConfig, MatchState};
use crate::game::turn::{ability_gate, finalize_turn, submit, ActionError, CooldownCheck, TurnTransition};
use crate::game::unit::{Team, UnitId};
use crate::network::protocol::{ClientMessage, ServerMessage};

/// Buffered effect notices per subscriber.
const EFFECT_FEED_CAPACITY: usize = 64;

// =============================================================================
// TYPES
// =============================================================================

/// Delays around the bot's action, for pacing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotPacing {
    /// Before the bot acts
    pub think_delay: Duration,
    /// Between the action and the turn handover
    pub settle_delay: Duration,
}

impl Default for BotPacing {
    fn default() -> Self {
        Self {
            think_delay: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(600),
        }
    }
}

impl BotPacing {
    /// No delays.
    pub fn immediate() -> Self {
        Self { think_delay: Duration::ZERO, settle_delay: Duration::ZERO }
    }
}

/// Change to the set of pending effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectNotice {
    /// A new effect should start playing
    Added(EffectEvent),
    /// An effect was dismissed
    Removed(u64),
}

/// What `request_action` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDispatch {
    /// Applied locally
    Applied {
        /// The bot's answer, when the turn passed to it
        bot_reply: Option<BotAction>,
    },
    /// The rules refused it; nothing changed
    Rejected(Rejection),
    /// Forwarded to the server
    Sent,
}

/// What a server message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaUpdate {
    /// Seated on a team with a fresh state
    Joined(Team),
    /// State replaced
    State,
    /// Room occupancy changed
    PeerJoined(usize),
    /// The opponent left
    PeerLeft,
    /// The server refused a request
    Error(String),
    /// Reply to ping
    Pong,
}

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Acting requires a selected unit.
    #[error("No unit selected")]
    NoSelection,

    /// The rules engine refused the submission.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The server link is gone.
    #[error("Connection closed")]
    Disconnected,
}

enum Mode {
    Offline {
        human: Team,
        rng: DeterministicRng,
        pacing: BotPacing,
    },
    Online {
        team: Team,
        outgoing: mpsc::Sender<ClientMessage>,
    },
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Front door for rendering code.
pub struct GameController {
    state: MatchState,
    selected: Option<UnitId>,
    mode: Mode,
    effects_tx: broadcast::Sender<EffectNotice>,
}

impl GameController {
    /// Offline match: the human plays team A against the bot.
    pub fn offline(config: MatchConfig, seed: u64) -> Self {
        let mut rng = DeterministicRng::new(seed);
        let state = MatchState::generate(config, &mut rng);
        Self::with_state(state, rng)
    }

    /// Offline controller over an existing state.
    pub fn with_state(state: MatchState, rng: DeterministicRng) -> Self {
        let (effects_tx, _) = broadcast::channel(EFFECT_FEED_CAPACITY);
        Self {
            state,
            selected: None,
            mode: Mode::Offline { human: Team::A, rng, pacing: BotPacing::default() },
            effects_tx,
        }
    }

    /// Replace the bot's pacing. No effect online.
    pub fn with_pacing(mut self, bot_pacing: BotPacing) -> Self {
        if let Mode::Offline { pacing, .. } = &mut self.mode {
            *pacing = bot_pacing;
        }
        self
    }

    /// Online replica. `initial` is usually the state from `joined`.
    pub fn online(team: Team, initial: MatchState, outgoing: mpsc::Sender<ClientMessage>) -> Self {
        let (effects_tx, _) = broadcast::channel(EFFECT_FEED_CAPACITY);
        Self {
            state: initial,
            selected: None,
            mode: Mode::Online { team, outgoing },
            effects_tx,
        }
    }

    /// Current state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Selected unit, if any.
    pub fn selected(&self) -> Option<&UnitId> {
        self.selected.as_ref()
    }

    /// Team driven from this side.
    pub fn local_team(&self) -> Team {
        match &self.mode {
            Mode::Offline { human, .. } => *human,
            Mode::Online { team, .. } => *team,
        }
    }

    /// Whether the state is a server replica.
    pub fn is_online(&self) -> bool {
        matches!(self.mode, Mode::Online { .. })
    }

    /// Whether it is the local team's turn in a running match.
    pub fn is_local_turn(&self) -> bool {
        !self.state.is_finished() && self.state.current_turn == self.local_team()
    }

    /// Feed of effect additions and removals.
    pub fn subscribe_effects(&self) -> broadcast::Receiver<EffectNotice> {
        self.effects_tx.subscribe()
    }

    /// Remove a finished effect.
    pub fn dismiss_effect(&mut self, id: u64) -> bool {
        let removed = self.state.dismiss_effect(id);
        if removed {
            let _ = self.effects_tx.send(EffectNotice::Removed(id));
        }
        removed
    }

    fn publish(&self, effects: &[EffectEvent]) {
        for effect in effects {
            let _ = self.effects_tx.send(EffectNotice::Added(effect.clone()));
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.state.ability_mode = false;
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    /// Select one of the local team's units. Returns whether it took.
    pub fn request_select(&mut self, unit_id: &UnitId) -> bool {
        if !self.is_local_turn() {
            return false;
        }
        let local = self.local_team();
        let selectable = self.state.units
            .get(unit_id)
            .is_some_and(|u| u.team == local && !u.is_stunned());
        if !selectable {
            return false;
        }

        self.selected = Some(unit_id.clone());
        self.state.ability_mode = false;
        true
    }

    /// Flip ability mode for the selected unit. Returns whether it flipped.
    pub fn request_toggle_ability_mode(&mut self) -> bool {
        if !self.is_local_turn() {
            return false;
        }
        let Some(unit_id) = self.selected.as_ref() else {
            return false;
        };
        let cooldown = if self.is_online() { CooldownCheck::Skip } else { CooldownCheck::Enforce };
        if ability_gate(&self.state, unit_id, self.local_team(), cooldown).is_err() {
            return false;
        }

        self.state.ability_mode = !self.state.ability_mode;
        true
    }

    /// Act with the selected unit on `target`: an ability in ability
    /// mode, otherwise a move.
    ///
    /// Offline, a turn that passes to the bot is played out (with its
    /// pacing delays) before this returns. Online, the selection stays
    /// until the server's state shows the turn has moved on.
    pub async fn request_action(&mut self, target: GridPos) -> Result<ActionDispatch, ControllerError> {
        let unit = self.selected.clone().ok_or(ControllerError::NoSelection)?;
        let intent = if self.state.ability_mode {
            Intent::Ability { unit, target }
        } else {
            Intent::Move { unit, target }
        };

        match &self.mode {
            Mode::Online { team, outgoing } => {
                outgoing
                    .send(ClientMessage::action(*team, &intent))
                    .await
                    .map_err(|_| ControllerError::Disconnected)?;
                Ok(ActionDispatch::Sent)
            }
            Mode::Offline { human, .. } => {
                let human = *human;
                let submission = submit(&mut self.state, human, &intent)?;
                if let Err(rejection) = submission.outcome {
                    debug!(unit = %intent.unit(), %rejection, "intent rejected");
                    return Ok(ActionDispatch::Rejected(rejection));
                }

                self.publish(&submission.effects);
                self.clear_selection();
                if let Some(TurnTransition::Won(winner)) = submission.transition {
                    info!(%winner, turn = self.state.turn_count, "match finished");
                }
                let bot_reply = self.run_bot_turn().await.map(|(action, _)| action);
                Ok(ActionDispatch::Applied { bot_reply })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Bot
    // -------------------------------------------------------------------------

    /// Whether an offline match is waiting on the bot.
    pub fn is_bot_turn(&self) -> bool {
        match &self.mode {
            Mode::Offline { human, .. } => {
                !self.state.is_finished() && self.state.current_turn != *human
            }
            Mode::Online { .. } => false,
        }
    }

    /// Bot turn: think, act, settle, hand over. `None` unless the bot
    /// is up.
    async fn run_bot_turn(&mut self) -> Option<(BotAction, TurnTransition)> {
        if !self.is_bot_turn() {
            return None;
        }
        let Mode::Offline { pacing, .. } = &self.mode else {
            return None;
        };
        let pacing = *pacing;

        if !pacing.think_delay.is_zero() {
            tokio::time::sleep(pacing.think_delay).await;
        }

        let queued_before = self.state.effects.len();
        let action = match &mut self.mode {
            Mode::Offline { rng, .. } => take_bot_action(&mut self.state, rng)?,
            Mode::Online { .. } => return None,
        };
        let fresh: Vec<EffectEvent> = self.state.effects[queued_before..].to_vec();
        self.publish(&fresh);
        debug!(?action, "bot acted");

        if !pacing.settle_delay.is_zero() {
            tokio::time::sleep(pacing.settle_delay).await;
        }

        let transition = finalize_turn(&mut self.state);
        self.selected = None;
        if let TurnTransition::Won(winner) = transition {
            info!(%winner, turn = self.state.turn_count, "match finished");
        }
        Some((action, transition))
    }

    // -------------------------------------------------------------------------
    // Online replica
    // -------------------------------------------------------------------------

    /// Fold a server message into the replica.
    pub fn apply_server_message(&mut self, message: ServerMessage) -> ReplicaUpdate {
        match message {
            ServerMessage::Joined { assigned_team, state } => {
                if let Mode::Online { team, .. } = &mut self.mode {
                    *team = assigned_team;
                }
                self.replace_state(*state);
                ReplicaUpdate::Joined(assigned_team)
            }
            ServerMessage::State { state } => {
                self.replace_state(*state);
                ReplicaUpdate::State
            }
            ServerMessage::PeerJoined { count } => ReplicaUpdate::PeerJoined(count),
            ServerMessage::PeerLeft => ReplicaUpdate::PeerLeft,
            ServerMessage::Error { message } => {
                debug!(%message, "server refused request");
                ReplicaUpdate::Error(message)
            }
            ServerMessage::Pong => ReplicaUpdate::Pong,
        }
    }

    fn replace_state(&mut self, next: MatchState) {
        let fresh: Vec<EffectEvent> = next.effects
            .iter()
            .filter(|e| !self.state.effects.iter().any(|seen| seen.id == e.id))
            .cloned()
            .collect();

        let turn_changed = next.current_turn != self.state.current_turn || next.winner.is_some();
        let selection_gone = self.selected
            .as_ref()
            .is_some_and(|id| next.units.get(id).is_none());
        let ability_mode = self.state.ability_mode;

        self.state = next;
        self.publish(&fresh);
        if turn_changed || selection_gone {
            self.clear_selection();
        } else if self.selected.is_some() {
            // ability mode is local until the turn moves on
            self.state.ability_mode = ability_mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Board;
    use crate::game::events::EffectKind;
    use crate::game::unit::{Unit, UnitClass, UnitRegistry};

    fn skirmish() -> MatchState {
        MatchState::new(
            UnitRegistry::new(vec![
                Unit::caster(UnitId::from("p_w_0"), Team::A, UnitClass::Pyro, GridPos::new(4, 4)),
                Unit::core(Team::A, GridPos::new(4, 0)),
                Unit::caster(UnitId::from("e_w_0"), Team::B, UnitClass::Dark, GridPos::new(4, 5)),
                Unit::core(Team::B, GridPos::new(4, 8)),
            ]),
            Board::default(),
        )
    }

    fn offline() -> GameController {
        GameController::with_state(skirmish(), DeterministicRng::new(1)).with_pacing(BotPacing::immediate())
    }

    #[test]
    fn test_select_rules() {
        let mut ctl = offline();
        assert!(!ctl.request_select(&UnitId::from("e_w_0")));
        assert!(!ctl.request_select(&UnitId::from("ghost")));
        assert!(ctl.request_select(&UnitId::from("p_w_0")));
        assert_eq!(ctl.selected(), Some(&UnitId::from("p_w_0")));
    }

    #[test]
    fn test_stunned_unit_not_selectable() {
        let mut state = skirmish();
        state.units.get_mut(&UnitId::from("p_w_0")).unwrap().stun_turns = 1;
        let mut ctl = GameController::with_state(state, DeterministicRng::new(1));
        assert!(!ctl.request_select(&UnitId::from("p_w_0")));
    }

    #[test]
    fn test_toggle_needs_ready_ability() {
        let mut ctl = offline();
        assert!(!ctl.request_toggle_ability_mode());

        ctl.request_select(&UnitId::from("p_w_0"));
        assert!(ctl.request_toggle_ability_mode());
        assert!(ctl.state().ability_mode);
        assert!(ctl.request_toggle_ability_mode());
        assert!(!ctl.state().ability_mode);

        let mut state = skirmish();
        state.units.get_mut(&UnitId::from("p_w_0")).unwrap().last_ability_turn = 1;
        let mut ctl = GameController::with_state(state, DeterministicRng::new(1));
        ctl.request_select(&UnitId::from("p_w_0"));
        assert!(!ctl.request_toggle_ability_mode());
    }

    #[tokio::test]
    async fn test_action_requires_selection() {
        let mut ctl = offline();
        let result = ctl.request_action(GridPos::new(4, 3)).await;
        assert!(matches!(result, Err(ControllerError::NoSelection)));
    }

    #[tokio::test]
    async fn test_offline_ability_then_bot() {
        let mut ctl = offline();
        let mut feed = ctl.subscribe_effects();

        ctl.request_select(&UnitId::from("p_w_0"));
        ctl.request_toggle_ability_mode();
        let dispatch = ctl.request_action(GridPos::new(4, 5)).await.unwrap();
        let ActionDispatch::Applied { bot_reply: Some(reply) } = dispatch else {
            panic!("expected the bot to answer, got {dispatch:?}");
        };
        assert_ne!(reply, BotAction::NoEligibleUnit);
        assert!(ctl.selected().is_none());
        assert!(!ctl.state().ability_mode);

        // one call covers the human turn and the bot's answer
        assert_eq!(ctl.state().current_turn, Team::A);
        assert_eq!(ctl.state().turn_count, 2);
        assert!(!ctl.is_bot_turn());
        assert!(ctl.run_bot_turn().await.is_none());

        let EffectNotice::Added(effect) = feed.try_recv().unwrap() else {
            panic!("expected an added effect");
        };
        assert_eq!(effect.kind, EffectKind::Pyro);
        assert!(ctl.request_select(&UnitId::from("p_w_0")));
    }

    #[tokio::test]
    async fn test_each_human_turn_gets_one_bot_reply() {
        let mut ctl = offline();
        for round in 2..=3 {
            let own = ctl.state().units.of_team(Team::A).find(|u| !u.is_core()).map(|u| (u.id.clone(), u.pos));
            let Some((unit, pos)) = own else { break };
            ctl.request_select(&unit);
            // step back toward the own Core, always free in this layout
            let dispatch = ctl.request_action(GridPos::new(pos.x, pos.z - 1)).await.unwrap();
            if ctl.state().is_finished() {
                break;
            }
            assert!(matches!(dispatch, ActionDispatch::Applied { bot_reply: Some(_) }));
            assert_eq!(ctl.state().current_turn, Team::A);
            assert_eq!(ctl.state().turn_count, round);
        }
    }

    #[tokio::test]
    async fn test_rejected_action_keeps_turn() {
        let mut ctl = offline();
        ctl.request_select(&UnitId::from("p_w_0"));
        let dispatch = ctl.request_action(GridPos::new(4, 6)).await.unwrap();
        assert_eq!(dispatch, ActionDispatch::Rejected(Rejection::NotAdjacent));
        assert_eq!(ctl.state().current_turn, Team::A);
        assert_eq!(ctl.selected(), Some(&UnitId::from("p_w_0")));
    }

    #[tokio::test]
    async fn test_dismiss_effect() {
        let mut ctl = offline();
        let mut feed = ctl.subscribe_effects();
        ctl.request_select(&UnitId::from("p_w_0"));
        ctl.request_action(GridPos::new(4, 5)).await.unwrap();

        let EffectNotice::Added(effect) = feed.try_recv().unwrap() else {
            panic!("expected an added effect");
        };
        assert!(ctl.dismiss_effect(effect.id));
        // the bot's own effects may be queued ahead of the removal
        let removed = std::iter::from_fn(|| feed.try_recv().ok())
            .any(|notice| notice == EffectNotice::Removed(effect.id));
        assert!(removed);
        assert!(!ctl.dismiss_effect(effect.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_pacing_sleeps() {
        let mut ctl = GameController::with_state(skirmish(), DeterministicRng::new(5));
        ctl.request_select(&UnitId::from("p_w_0"));

        let started = tokio::time::Instant::now();
        let dispatch = ctl.request_action(GridPos::new(3, 3)).await.unwrap();
        assert!(matches!(dispatch, ActionDispatch::Applied { bot_reply: Some(_) }));
        assert!(started.elapsed() >= Duration::from_millis(1600));
        assert_eq!(ctl.state().current_turn, Team::A);
    }

    #[tokio::test]
    async fn test_online_action_is_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut ctl = GameController::online(Team::A, skirmish(), tx);

        assert!(ctl.request_select(&UnitId::from("p_w_0")));
        assert_eq!(ctl.request_action(GridPos::new(3, 3)).await.unwrap(), ActionDispatch::Sent);
        assert_eq!(ctl.state().units.get(&UnitId::from("p_w_0")).unwrap().pos, GridPos::new(4, 4));
        // selection survives until the server moves the turn on
        assert_eq!(ctl.selected(), Some(&UnitId::from("p_w_0")));

        let ClientMessage::Action(envelope) = rx.recv().await.unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(envelope.request().team, Some(Team::A));
        assert_eq!(envelope.request().to_intent(), Some(Intent::movement("p_w_0", GridPos::new(3, 3))));
    }

    #[test]
    fn test_online_toggle_skips_cooldown() {
        let mut state = skirmish();
        state.units.get_mut(&UnitId::from("p_w_0")).unwrap().last_ability_turn = 1;
        let (tx, _rx) = mpsc::channel(4);
        let mut ctl = GameController::online(Team::A, state, tx);

        ctl.request_select(&UnitId::from("p_w_0"));
        assert!(ctl.request_toggle_ability_mode());
    }

    #[test]
    fn test_replica_follows_server() {
        let (tx, _rx) = mpsc::channel(4);
        let mut ctl = GameController::online(Team::A, skirmish(), tx);
        let mut feed = ctl.subscribe_effects();
        ctl.request_select(&UnitId::from("p_w_0"));
        ctl.request_toggle_ability_mode();

        // a rejected send comes back as the same turn: keep the selection
        let update = ctl.apply_server_message(ServerMessage::state(&skirmish()));
        assert_eq!(update, ReplicaUpdate::State);
        assert_eq!(ctl.selected(), Some(&UnitId::from("p_w_0")));
        assert!(ctl.state().ability_mode);

        let mut next = skirmish();
        next.current_turn = Team::B;
        next.push_effect(EffectKind::Melee, GridPos::new(4, 5));

        let update = ctl.apply_server_message(ServerMessage::state(&next));
        assert_eq!(update, ReplicaUpdate::State);
        assert_eq!(ctl.state().current_turn, Team::B);
        assert!(ctl.selected().is_none());
        assert!(!ctl.state().ability_mode);
        assert!(matches!(feed.try_recv(), Ok(EffectNotice::Added(_))));

        let update = ctl.apply_server_message(ServerMessage::Joined { assigned_team: Team::B, state: Box::new(next) });
        assert_eq!(update, ReplicaUpdate::Joined(Team::B));
        assert_eq!(ctl.local_team(), Team::B);
        // same effect id is not announced twice
        assert!(feed.try_recv().is_err());

        assert_eq!(
            ctl.apply_server_message(ServerMessage::error("Not your turn")),
            ReplicaUpdate::Error("Not your turn".to_string())
        );
    }
}
