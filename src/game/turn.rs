//! Turn Lifecycle
//!
//! Who may act, when the turn passes, and when the match ends.
//!
//! ## Phases
//!
//! ```text
//! AwaitingAction(A) --action--> finalize --> AwaitingAction(B) --> ...
//!                                   |
//!                                   +--core destroyed--> Finished(winner)
//! ```
//!
//! `submit` is the authoritative entry point used by the room server and
//! the offline controller: ownership checks, the ability gate, the
//! resolver, and finalization, in that order.

use thiserror::Error;

use crate::game::events::EffectEvent;
use crate::game::intent::Intent;
use crate::game::resolver::{resolve, Rejection};
use crate::game::state::MatchState;
use crate::game::unit::{Team, UnitId};

// =============================================================================
// PHASES
// =============================================================================

/// Where the match is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for the given team to act
    AwaitingAction(Team),
    /// Terminal
    Finished(Team),
}

/// Current phase, derived from the state.
pub fn phase(state: &MatchState) -> TurnPhase {
    match state.winner {
        Some(winner) => TurnPhase::Finished(winner),
        None => TurnPhase::AwaitingAction(state.current_turn),
    }
}

/// What `finalize_turn` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnTransition {
    /// The turn passed to `to`
    Passed {
        /// Team now acting
        to: Team,
        /// Round counter after the pass
        turn_count: u32,
    },
    /// A Core fell and the match ended
    Won(Team),
}

/// Winner implied by the surviving Cores.
///
/// B's Core is checked first, so if both fell in the same step team A
/// wins.
pub fn check_winner(state: &MatchState) -> Option<Team> {
    if !state.core_alive(Team::B) {
        Some(Team::A)
    } else if !state.core_alive(Team::A) {
        Some(Team::B)
    } else {
        None
    }
}

/// Close the current turn: declare a winner or hand the turn over.
///
/// On a pass the incoming team's stun counters tick down once and the
/// round counter advances whenever the turn returns to team A.
pub fn finalize_turn(state: &mut MatchState) -> TurnTransition {
    state.ability_mode = false;

    if let Some(winner) = state.winner {
        return TurnTransition::Won(winner);
    }

    if let Some(winner) = check_winner(state) {
        state.winner = Some(winner);
        return TurnTransition::Won(winner);
    }

    let incoming = state.current_turn.other();
    state.current_turn = incoming;
    if incoming == Team::A {
        state.turn_count += 1;
    }

    for unit in state.units.iter_mut().filter(|u| u.team == incoming) {
        unit.stun_turns = unit.stun_turns.saturating_sub(1);
    }

    TurnTransition::Passed { to: incoming, turn_count: state.turn_count }
}

// =============================================================================
// ABILITY GATE
// =============================================================================

/// Whether the gate checks the cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownCheck {
    /// Require the cooldown to have elapsed
    Enforce,
    /// Leave the cooldown to the authority
    Skip,
}

/// Check that `unit_id` may cast for `acting_team` right now.
pub fn ability_gate(
    state: &MatchState,
    unit_id: &UnitId,
    acting_team: Team,
    cooldown: CooldownCheck,
) -> Result<(), Rejection> {
    let unit = state.units.get(unit_id).ok_or(Rejection::UnknownUnit)?;

    if unit.team != acting_team {
        return Err(Rejection::NotOwnUnit);
    }
    if unit.is_stunned() {
        return Err(Rejection::Stunned);
    }
    if unit.is_core() {
        return Err(Rejection::CoreCannotAct);
    }
    if cooldown == CooldownCheck::Enforce && !unit.ability_ready(state.turn_count) {
        return Err(Rejection::OnCooldown);
    }
    Ok(())
}

// =============================================================================
// SUBMISSION
// =============================================================================

/// Errors reported back to whoever submitted the action.
///
/// The messages are the ones clients display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The match already has a winner
    #[error("Game finished")]
    GameFinished,

    /// The submitting team is not the one to act
    #[error("Not your turn")]
    NotYourTurn,

    /// The unit does not exist or is not the submitter's
    #[error("Invalid unit")]
    InvalidUnit,
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Whether the rules let the action through
    pub outcome: Result<(), Rejection>,
    /// Effects emitted
    pub effects: Vec<EffectEvent>,
    /// How the turn ended, when it did
    pub transition: Option<TurnTransition>,
}

impl Submission {
    fn rejected(rejection: Rejection) -> Self {
        Self { outcome: Err(rejection), effects: Vec::new(), transition: None }
    }
}

/// Apply `intent` for `team`, committing and finalizing on success.
///
/// Rule failures leave the state untouched and come back as a
/// [`Submission`] with a rejection; only ownership problems are errors.
pub fn submit(
    state: &mut MatchState,
    team: Team,
    intent: &Intent,
) -> Result<Submission, ActionError> {
    if state.is_finished() {
        return Err(ActionError::GameFinished);
    }
    if team != state.current_turn {
        return Err(ActionError::NotYourTurn);
    }
    match state.units.get(intent.unit()) {
        Some(unit) if unit.team == team => {}
        _ => return Err(ActionError::InvalidUnit),
    }

    if intent.is_ability() {
        if let Err(rejection) = ability_gate(state, intent.unit(), team, CooldownCheck::Enforce) {
            return Ok(Submission::rejected(rejection));
        }
    }

    let resolution = resolve(state, intent);
    if let Err(rejection) = resolution.outcome {
        return Ok(Submission::rejected(rejection));
    }

    *state = resolution.state;
    let transition = finalize_turn(state);

    Ok(Submission {
        outcome: Ok(()),
        effects: resolution.effects,
        transition: Some(transition),
    })
}
