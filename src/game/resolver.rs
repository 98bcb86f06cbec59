//! Action Resolver
//!
//! Validates and applies a single move or ability against a match state.
//! Every function here is pure: it takes `&MatchState` and returns a new
//! snapshot. A rejected action hands back an unchanged copy.
//!
//! Cooldown and stun for abilities are NOT checked here; the turn
//! controller gates those before calling in.

use thiserror::Error;

use crate::core::grid::GridPos;
use crate::game::events::{EffectEvent, EffectKind};
use crate::game::intent::Intent;
use crate::game::state::MatchState;
use crate::game::unit::{Team, UnitClass, UnitId};
use crate::{CASTER_MAX_HP, STUN_TURNS};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Why a rule refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The match already has a winner
    #[error("match is finished")]
    MatchFinished,

    /// No unit with that id
    #[error("unknown unit")]
    UnknownUnit,

    /// The unit is stunned
    #[error("unit is stunned")]
    Stunned,

    /// Cores never act
    #[error("core cannot act")]
    CoreCannotAct,

    /// Target is off the board
    #[error("target out of bounds")]
    OutOfBounds,

    /// Target is an obstacle
    #[error("target is obstructed")]
    Obstructed,

    /// Move target is not one of the eight neighbouring cells
    #[error("target is not adjacent")]
    NotAdjacent,

    /// Move target holds a friendly unit
    #[error("target holds a friendly unit")]
    FriendlyOccupied,

    /// Target is outside the ability's range
    #[error("target out of ability range")]
    OutOfRange,

    /// The ability needs an enemy on the target cell
    #[error("no enemy on target")]
    NoEnemyAtTarget,

    /// The ability needs an empty target cell
    #[error("target is occupied")]
    TargetOccupied,

    /// The unit belongs to the other team
    #[error("unit belongs to the other team")]
    NotOwnUnit,

    /// The ability was used too recently
    #[error("ability on cooldown")]
    OnCooldown,
}

/// Result of resolving one action.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// `Ok` when the action took effect
    pub outcome: Result<(), Rejection>,
    /// New snapshot; identical to the input on rejection
    pub state: MatchState,
    /// Effects emitted by this action
    pub effects: Vec<EffectEvent>,
}

impl Resolution {
    /// Whether the action took effect.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Clone the state, run `apply` on the clone and keep it only on success.
fn resolve_with<F>(state: &MatchState, apply: F) -> Resolution
where
    F: FnOnce(&mut MatchState) -> Result<(), Rejection>,
{
    if state.is_finished() {
        return Resolution {
            outcome: Err(Rejection::MatchFinished),
            state: state.clone(),
            effects: Vec::new(),
        };
    }

    let mut next = state.clone();
    let queued_before = next.effects.len();

    match apply(&mut next) {
        Ok(()) => {
            let effects = next.effects[queued_before..].to_vec();
            Resolution { outcome: Ok(()), state: next, effects }
        }
        Err(rejection) => Resolution {
            outcome: Err(rejection),
            state: state.clone(),
            effects: Vec::new(),
        },
    }
}

/// Shared target checks: on the board and not an obstacle.
fn check_target(state: &MatchState, target: GridPos) -> Result<(), Rejection> {
    if !target.in_bounds() {
        return Err(Rejection::OutOfBounds);
    }
    if state.obstacles.is_obstructed(target) {
        return Err(Rejection::Obstructed);
    }
    Ok(())
}

/// Id of the enemy of `team` standing on `target`, if any.
fn enemy_at(state: &MatchState, team: Team, target: GridPos) -> Option<UnitId> {
    state.units
        .at(target)
        .filter(|u| u.team != team)
        .map(|u| u.id.clone())
}

// =============================================================================
// MOVE
// =============================================================================

/// Step one cell. An enemy on the target takes one melee hit instead.
pub fn resolve_move(state: &MatchState, unit_id: &UnitId, target: GridPos) -> Resolution {
    resolve_with(state, |next| {
        let unit = next.units.get(unit_id).ok_or(Rejection::UnknownUnit)?;
        let (team, origin) = (unit.team, unit.pos);

        if unit.is_stunned() {
            return Err(Rejection::Stunned);
        }
        if unit.is_core() {
            return Err(Rejection::CoreCannotAct);
        }
        check_target(next, target)?;
        if origin.chebyshev(target) != 1 {
            return Err(Rejection::NotAdjacent);
        }

        match next.units.at(target).map(|u| (u.id.clone(), u.team)) {
            Some((_, occupant_team)) if occupant_team == team => Err(Rejection::FriendlyOccupied),
            Some((enemy, _)) => {
                next.units.damage(&enemy, 1);
                next.units.remove_casualties();
                next.push_effect(EffectKind::Melee, target);
                Ok(())
            }
            None => {
                if let Some(unit) = next.units.get_mut(unit_id) {
                    unit.pos = target;
                }
                Ok(())
            }
        }
    })
}

// =============================================================================
// ABILITY
// =============================================================================

/// Cast the unit's class ability at `target`.
pub fn resolve_ability(state: &MatchState, unit_id: &UnitId, target: GridPos) -> Resolution {
    resolve_with(state, |next| {
        let unit = next.units.get(unit_id).ok_or(Rejection::UnknownUnit)?;
        let (team, class, origin) = (unit.team, unit.class, unit.pos);

        check_target(next, target)?;
        let range = class.ability_range().ok_or(Rejection::CoreCannotAct)?;
        if !origin.within(target, range) {
            return Err(Rejection::OutOfRange);
        }

        match class {
            UnitClass::Pyro => {
                let hit: Vec<UnitId> = next.units
                    .iter()
                    .filter(|u| u.team != team && u.pos.within(target, 1))
                    .map(|u| u.id.clone())
                    .collect();
                for id in &hit {
                    next.units.damage(id, 1);
                }
                next.units.remove_casualties();
                next.push_effect(EffectKind::Pyro, target);
            }
            UnitClass::Cryo => {
                let enemy = enemy_at(next, team, target).ok_or(Rejection::NoEnemyAtTarget)?;
                if let Some(frozen) = next.units.get_mut(&enemy) {
                    frozen.stun_turns = STUN_TURNS;
                }
                next.push_effect(EffectKind::Cryo, target);
            }
            UnitClass::Arcane => {
                if next.units.is_occupied(target) {
                    return Err(Rejection::TargetOccupied);
                }
                next.push_effect(EffectKind::Arcane, origin);
                if let Some(caster) = next.units.get_mut(unit_id) {
                    caster.pos = target;
                }
                next.push_effect(EffectKind::Arcane, target);
            }
            UnitClass::Dark => {
                let enemy = enemy_at(next, team, target).ok_or(Rejection::NoEnemyAtTarget)?;
                next.units.damage(&enemy, 1);
                if let Some(caster) = next.units.get_mut(unit_id) {
                    caster.hp = (caster.hp + 1).min(CASTER_MAX_HP);
                }
                next.units.remove_casualties();
                next.push_effect(EffectKind::Dark, target);
            }
            UnitClass::Core => return Err(Rejection::CoreCannotAct),
        }

        let turn = next.turn_count as i32;
        if let Some(caster) = next.units.get_mut(unit_id) {
            caster.last_ability_turn = turn;
        }
        Ok(())
    })
}

/// Resolve either kind of intent.
pub fn resolve(state: &MatchState, intent: &Intent) -> Resolution {
    match intent {
        Intent::Move { unit, target } => resolve_move(state, unit, *target),
        Intent::Ability { unit, target } => resolve_ability(state, unit, *target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Board;
    use crate::game::unit::{Unit, UnitRegistry};

    fn caster(id: &str, team: Team, class: UnitClass, x: i32, z: i32) -> Unit {
        Unit::caster(UnitId::from(id), team, class, GridPos::new(x, z))
    }

    fn with_cores(mut units: Vec<Unit>) -> MatchState {
        units.push(Unit::core(Team::A, GridPos::new(4, 0)));
        units.push(Unit::core(Team::B, GridPos::new(4, 8)));
        MatchState::new(UnitRegistry::new(units), Board::default())
    }

    #[test]
    fn test_striker_hits_enemies_around_target_only() {
        let mut state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Pyro, 4, 4),
            caster("e_w_0", Team::B, UnitClass::Dark, 4, 5),
            caster("p_w_1", Team::A, UnitClass::Cryo, 4, 3),
        ]);
        state.turn_count = 5;

        let res = resolve_ability(&state, &UnitId::from("p_w_0"), GridPos::new(4, 4));
        assert!(res.is_success());

        let units = &res.state.units;
        assert_eq!(units.get(&UnitId::from("e_w_0")).unwrap().hp, 1);
        assert_eq!(units.get(&UnitId::from("p_w_1")).unwrap().hp, 2);
        assert_eq!(units.get(&UnitId::from("p_w_0")).unwrap().last_ability_turn, 5);
        assert_eq!(res.effects.len(), 1);
        assert_eq!(res.effects[0].kind, EffectKind::Pyro);
    }

    #[test]
    fn test_freeze_on_empty_cell_fails() {
        let state = with_cores(vec![caster("p_w_0", Team::A, UnitClass::Cryo, 1, 1)]);

        let res = resolve_ability(&state, &UnitId::from("p_w_0"), GridPos::new(4, 1));
        assert_eq!(res.outcome, Err(Rejection::NoEnemyAtTarget));
        assert_eq!(res.state, state);
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().last_ability_turn, -3);
        assert_eq!(res.state.current_turn, Team::A);
        assert!(res.effects.is_empty());
    }

    #[test]
    fn test_lethal_melee_removes_unit() {
        let mut state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Arcane, 2, 2),
            caster("e_w_0", Team::B, UnitClass::Pyro, 3, 3),
        ]);
        state.units.get_mut(&UnitId::from("e_w_0")).unwrap().hp = 1;

        let res = resolve_move(&state, &UnitId::from("p_w_0"), GridPos::new(3, 3));
        assert!(res.is_success());
        assert!(res.state.units.get(&UnitId::from("e_w_0")).is_none());
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().pos, GridPos::new(2, 2));
        assert_eq!(res.effects[0].kind, EffectKind::Melee);

        // No longer targetable
        let res = resolve_move(&res.state, &UnitId::from("p_w_0"), GridPos::new(3, 3));
        assert!(res.is_success());
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().pos, GridPos::new(3, 3));
    }

    #[test]
    fn test_move_rejections() {
        let mut state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Pyro, 3, 1),
            caster("p_w_1", Team::A, UnitClass::Dark, 4, 1),
        ]);
        state.obstacles = Board::with_obstacles([GridPos::new(3, 2)]);
        let id = UnitId::from("p_w_0");

        assert_eq!(resolve_move(&state, &id, GridPos::new(3, 2)).outcome, Err(Rejection::Obstructed));
        assert_eq!(resolve_move(&state, &id, GridPos::new(4, 1)).outcome, Err(Rejection::FriendlyOccupied));
        assert_eq!(resolve_move(&state, &id, GridPos::new(3, 1)).outcome, Err(Rejection::NotAdjacent));
        assert_eq!(resolve_move(&state, &id, GridPos::new(3, 3)).outcome, Err(Rejection::NotAdjacent));
        assert_eq!(resolve_move(&state, &id, GridPos::new(-1, 1)).outcome, Err(Rejection::OutOfBounds));
        assert_eq!(
            resolve_move(&state, &UnitId::from("p_core"), GridPos::new(3, 0)).outcome,
            Err(Rejection::CoreCannotAct)
        );
        assert_eq!(
            resolve_move(&state, &UnitId::from("nobody"), GridPos::new(3, 0)).outcome,
            Err(Rejection::UnknownUnit)
        );

        state.units.get_mut(&id).unwrap().stun_turns = 1;
        assert_eq!(resolve_move(&state, &id, GridPos::new(2, 1)).outcome, Err(Rejection::Stunned));
    }

    #[test]
    fn test_move_relocates() {
        let state = with_cores(vec![caster("p_w_0", Team::A, UnitClass::Pyro, 3, 1)]);
        let res = resolve_move(&state, &UnitId::from("p_w_0"), GridPos::new(2, 2));
        assert!(res.is_success());
        assert!(res.effects.is_empty());
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().pos, GridPos::new(2, 2));
    }

    #[test]
    fn test_finished_match_rejects_everything() {
        let mut state = with_cores(vec![caster("p_w_0", Team::A, UnitClass::Pyro, 3, 1)]);
        state.winner = Some(Team::A);
        let id = UnitId::from("p_w_0");
        assert_eq!(resolve_move(&state, &id, GridPos::new(3, 2)).outcome, Err(Rejection::MatchFinished));
        assert_eq!(resolve_ability(&state, &id, GridPos::new(3, 2)).outcome, Err(Rejection::MatchFinished));
    }

    #[test]
    fn test_cryo_stuns_enemy() {
        let state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Cryo, 1, 1),
            caster("e_w_0", Team::B, UnitClass::Pyro, 4, 4),
        ]);
        let res = resolve_ability(&state, &UnitId::from("p_w_0"), GridPos::new(4, 4));
        assert!(res.is_success());
        assert_eq!(res.state.units.get(&UnitId::from("e_w_0")).unwrap().stun_turns, 2);

        let res = resolve_ability(&state, &UnitId::from("p_w_0"), GridPos::new(5, 5));
        assert_eq!(res.outcome, Err(Rejection::OutOfRange));
    }

    #[test]
    fn test_arcane_teleport() {
        let state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Arcane, 2, 2),
            caster("e_w_0", Team::B, UnitClass::Pyro, 4, 4),
        ]);
        let id = UnitId::from("p_w_0");

        let res = resolve_ability(&state, &id, GridPos::new(4, 4));
        assert_eq!(res.outcome, Err(Rejection::TargetOccupied));

        let res = resolve_ability(&state, &id, GridPos::new(5, 2));
        assert!(res.is_success());
        assert_eq!(res.state.units.get(&id).unwrap().pos, GridPos::new(5, 2));
        let cells: Vec<GridPos> = res.effects.iter().map(|e| e.pos).collect();
        assert_eq!(cells, vec![GridPos::new(2, 2), GridPos::new(5, 2)]);
    }

    #[test]
    fn test_dark_drains_and_caps() {
        let state = with_cores(vec![
            caster("p_w_0", Team::A, UnitClass::Dark, 2, 2),
            caster("e_w_0", Team::B, UnitClass::Pyro, 4, 4),
        ]);
        let res = resolve_ability(&state, &UnitId::from("p_w_0"), GridPos::new(4, 4));
        assert!(res.is_success());
        assert_eq!(res.state.units.get(&UnitId::from("e_w_0")).unwrap().hp, 1);
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().hp, 2);

        let mut hurt = state.clone();
        hurt.units.get_mut(&UnitId::from("p_w_0")).unwrap().hp = 1;
        let res = resolve_ability(&hurt, &UnitId::from("p_w_0"), GridPos::new(4, 4));
        assert_eq!(res.state.units.get(&UnitId::from("p_w_0")).unwrap().hp, 2);
    }

    #[test]
    fn test_core_has_no_ability() {
        let state = with_cores(vec![]);
        let res = resolve_ability(&state, &UnitId::from("p_core"), GridPos::new(4, 1));
        assert_eq!(res.outcome, Err(Rejection::CoreCannotAct));
    }

    #[test]
    fn test_pyro_can_destroy_core() {
        let mut state = with_cores(vec![caster("p_w_0", Team::A, UnitClass::Pyro, 4, 7)]);
        state.units.get_mut(&UnitId::from("e_core")).unwrap().hp = 1;

        let res = resolve(&state, &Intent::ability("p_w_0", GridPos::new(4, 8)));
        assert!(res.is_success());
        assert!(!res.state.core_alive(Team::B));
    }
}
