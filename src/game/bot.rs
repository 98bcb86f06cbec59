//! Bot Decision Engine
//!
//! Scripted opponent for offline play. One bot turn has two stages:
//!
//! 1. [`take_bot_action`] picks a unit and applies at most one action.
//! 2. [`finalize_turn`] hands the turn back.
//!
//! Callers that want pacing sleep between the stages; [`play_bot_turn`]
//! runs both back to back.
//!
//! Stun decay for the bot's side already happened in the `finalize_turn`
//! that gave it the turn, so nothing here touches stun counters.

use crate::core::grid::GridPos;
use crate::core::rng::RandomSource;
use crate::game::resolver::{resolve_ability, resolve_move};
use crate::game::state::MatchState;
use crate::game::turn::{finalize_turn, TurnTransition};
use crate::game::unit::{Team, Unit, UnitId};

/// Enemies this close to the bot's Core are attacked before the enemy Core.
pub const DEFENSE_RADIUS: i32 = 3;

/// What the bot did in stage 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotAction {
    /// Every unit is stunned or only the Core remains
    NoEligibleUnit,
    /// An ability landed
    Cast {
        /// Acting unit
        unit: UnitId,
        /// Target cell
        target: GridPos,
    },
    /// A move or melee landed
    Moved {
        /// Acting unit
        unit: UnitId,
        /// Cell moved to or attacked
        target: GridPos,
    },
    /// The chosen unit had nowhere to go
    Blocked {
        /// Chosen unit
        unit: UnitId,
    },
}

/// Cell the bot's units head for.
///
/// The nearest enemy to the bot's own Core when it is within
/// [`DEFENSE_RADIUS`], otherwise the enemy Core. Ties go to the unit
/// earliest in the registry.
pub fn choose_target(state: &MatchState, team: Team) -> Option<GridPos> {
    let enemy = team.other();
    let enemy_core = state.units.core_of(enemy).map(|u| u.pos);

    let Some(home) = state.units.core_of(team).map(|u| u.pos) else {
        return enemy_core;
    };

    let mut nearest: Option<(i32, GridPos)> = None;
    for unit in state.units.of_team(enemy) {
        let dist = unit.pos.chebyshev(home);
        if nearest.map_or(true, |(best, _)| dist < best) {
            nearest = Some((dist, unit.pos));
        }
    }

    match nearest {
        Some((dist, pos)) if dist <= DEFENSE_RADIUS => Some(pos),
        _ => enemy_core,
    }
}

/// Neighbouring cells of `from` ranked by Manhattan distance to `target`.
/// Equal distances keep the fixed neighbour order.
pub fn ranked_steps(from: GridPos, target: GridPos) -> Vec<GridPos> {
    let mut steps: Vec<GridPos> = from.neighbors().collect();
    steps.sort_by_key(|cell| cell.manhattan(target));
    steps
}

/// Stage 1: apply at most one action for the team whose turn it is.
///
/// Returns `None` when the match is already over.
pub fn take_bot_action<R: RandomSource>(state: &mut MatchState, rng: &mut R) -> Option<BotAction> {
    if state.is_finished() {
        return None;
    }
    let team = state.current_turn;

    let eligible: Vec<&Unit> = state.units
        .of_team(team)
        .filter(|u| !u.is_core() && !u.is_stunned())
        .collect();
    let Some(unit) = rng.choose(&eligible).map(|u| (*u).clone()) else {
        return Some(BotAction::NoEligibleUnit);
    };

    let Some(target) = choose_target(state, team) else {
        return Some(BotAction::Blocked { unit: unit.id });
    };

    let in_range = unit.class
        .ability_range()
        .is_some_and(|range| unit.pos.within(target, range));
    if in_range && unit.ability_ready(state.turn_count) {
        let res = resolve_ability(state, &unit.id, target);
        if res.is_success() {
            *state = res.state;
            return Some(BotAction::Cast { unit: unit.id, target });
        }
    }

    for step in ranked_steps(unit.pos, target) {
        if !step.in_bounds() || state.obstacles.is_obstructed(step) {
            continue;
        }
        if state.units.at(step).is_some_and(|u| u.team == team) {
            continue;
        }
        let res = resolve_move(state, &unit.id, step);
        if res.is_success() {
            *state = res.state;
            return Some(BotAction::Moved { unit: unit.id, target: step });
        }
    }

    Some(BotAction::Blocked { unit: unit.id })
}

/// Run both stages for `bot_team`.
///
/// A no-op returning `None` unless it is `bot_team`'s turn in an
/// unfinished match, so a repeated call never plays twice.
pub fn play_bot_turn<R: RandomSource>(
    state: &mut MatchState,
    bot_team: Team,
    rng: &mut R,
) -> Option<(BotAction, TurnTransition)> {
    if state.is_finished() || state.current_turn != bot_team {
        return None;
    }
    let action = take_bot_action(state, rng)?;
    let transition = finalize_turn(state);
    Some((action, transition))
}
