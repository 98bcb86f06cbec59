//! Match State
//!
//! The aggregate the rules operate on: units, obstacles, whose turn it
//! is, the round counter, the winner, the ability-mode flag and pending
//! effect events. The field names on the wire follow the browser client.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::core::hash::{compute_state_hash, StateDigest, StateHash, StateHasher};
use crate::core::rng::RandomSource;
use crate::game::board::Board;
use crate::game::events::{EffectEvent, EffectKind};
use crate::game::unit::{Team, Unit, UnitClass, UnitId, UnitRegistry};
use crate::{BOARD_SIZE, OBSTACLE_COUNT};

// =============================================================================
// MATCH CONFIG
// =============================================================================

/// Most casters a team can field: one of each class.
pub const MAX_CASTERS_PER_TEAM: usize = UnitClass::CASTERS.len();

/// Parameters for generating a fresh match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Casters per team, 1..=4
    pub casters_per_team: usize,
    /// Obstacles placed in the middle band
    pub obstacle_count: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            casters_per_team: MAX_CASTERS_PER_TEAM,
            obstacle_count: OBSTACLE_COUNT,
        }
    }
}

impl MatchConfig {
    /// Config with caster count clamped to what the classes allow.
    pub fn normalized(self) -> Self {
        Self {
            casters_per_team: self.casters_per_team.clamp(1, MAX_CASTERS_PER_TEAM),
            obstacle_count: self.obstacle_count,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    /// Live units in spawn order
    pub units: UnitRegistry,

    /// Obstacle layout
    pub obstacles: Board,

    /// Team allowed to act
    #[serde(rename = "currentTurn")]
    pub current_turn: Team,

    /// Round counter, starts at 1
    #[serde(rename = "turnCount")]
    pub turn_count: u32,

    /// Set exactly once when a Core falls
    pub winner: Option<Team>,

    /// Whether the acting side is targeting an ability
    #[serde(rename = "isAbilityMode")]
    pub ability_mode: bool,

    /// Effects not yet handed to the renderer
    #[serde(rename = "activeVFX")]
    pub effects: Vec<EffectEvent>,

    /// Next effect id
    #[serde(skip)]
    next_effect_id: u64,
}

impl MatchState {
    /// Create a match at turn 1 with team A to act.
    pub fn new(units: UnitRegistry, obstacles: Board) -> Self {
        Self {
            units,
            obstacles,
            current_turn: Team::A,
            turn_count: 1,
            winner: None,
            ability_mode: false,
            effects: Vec::new(),
            next_effect_id: 1,
        }
    }

    /// Generate a fresh match: shuffled caster classes per team, cores on
    /// the back rows, then obstacles avoiding every starting cell.
    pub fn generate<R: RandomSource>(config: MatchConfig, rng: &mut R) -> Self {
        let config = config.normalized();
        let mut units = Vec::with_capacity(2 * (config.casters_per_team + 1));

        for team in [Team::A, Team::B] {
            let mut classes = UnitClass::CASTERS;
            rng.shuffle(&mut classes);

            let first_x = BOARD_SIZE / 2 - (config.casters_per_team as i32 - 1) / 2;
            for (i, class) in classes.iter().take(config.casters_per_team).enumerate() {
                let pos = GridPos::new(first_x + i as i32, team.caster_row());
                units.push(Unit::caster(UnitId::caster(team, i), team, *class, pos));
            }
            units.push(Unit::core(team, GridPos::new(BOARD_SIZE / 2, team.core_row())));
        }

        let occupied: Vec<GridPos> = units.iter().map(|u| u.pos).collect();
        let obstacles = Board::generate(rng, config.obstacle_count, &occupied);

        Self::new(UnitRegistry::new(units), obstacles)
    }

    /// Whether the match has a winner.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Whether `team`'s Core still stands.
    pub fn core_alive(&self, team: Team) -> bool {
        self.units.core_of(team).is_some()
    }

    /// Queue an effect, returning its id.
    pub fn push_effect(&mut self, kind: EffectKind, pos: GridPos) -> u64 {
        // Replicas decoded from the wire start at zero; keep ids above
        // anything already queued.
        let floor = self.effects.iter().map(|e| e.id + 1).max().unwrap_or(1);
        let id = self.next_effect_id.max(floor);
        self.next_effect_id = id + 1;
        self.effects.push(EffectEvent::new(id, kind, pos));
        id
    }

    /// Remove one pending effect. Returns whether it was present.
    pub fn dismiss_effect(&mut self, id: u64) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.id != id);
        self.effects.len() != before
    }

    /// Drain all pending effects.
    pub fn take_effects(&mut self) -> Vec<EffectEvent> {
        std::mem::take(&mut self.effects)
    }

    /// Compute the state hash. Effects are excluded since they carry no
    /// gameplay meaning.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl StateDigest for MatchState {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher
            .put(&self.turn_count)
            .put(&self.current_turn)
            .put(&self.winner)
            .put(&self.ability_mode)
            .put(&self.obstacles)
            .put(&self.units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{DeterministicRng, ScriptedRng};

    #[test]
    fn test_generate_default_layout() {
        let mut rng = DeterministicRng::new(42);
        let state = MatchState::generate(MatchConfig::default(), &mut rng);

        assert_eq!(state.units.len(), 10);
        assert_eq!(state.current_turn, Team::A);
        assert_eq!(state.turn_count, 1);
        assert!(state.winner.is_none());
        assert!(!state.ability_mode);

        let ids: Vec<&str> = state.units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["p_w_0", "p_w_1", "p_w_2", "p_w_3", "p_core", "e_w_0", "e_w_1", "e_w_2", "e_w_3", "e_core"]);

        let p: Vec<GridPos> = state.units.of_team(Team::A).map(|u| u.pos).collect();
        assert_eq!(
            p,
            vec![GridPos::new(3, 1), GridPos::new(4, 1), GridPos::new(5, 1), GridPos::new(6, 1), GridPos::new(4, 0)]
        );
        let e: Vec<GridPos> = state.units.of_team(Team::B).map(|u| u.pos).collect();
        assert_eq!(
            e,
            vec![GridPos::new(3, 7), GridPos::new(4, 7), GridPos::new(5, 7), GridPos::new(6, 7), GridPos::new(4, 8)]
        );
        assert_eq!(state.units.core_of(Team::B).unwrap().pos, GridPos::new(4, 8));
    }

    #[test]
    fn test_generate_distinct_classes() {
        for seed in 0..20 {
            let mut rng = DeterministicRng::new(seed);
            let state = MatchState::generate(MatchConfig { casters_per_team: 4, obstacle_count: 5 }, &mut rng);
            for team in [Team::A, Team::B] {
                let mut classes: Vec<UnitClass> = state.units
                    .of_team(team)
                    .filter(|u| !u.is_core())
                    .map(|u| u.class)
                    .collect();
                classes.sort();
                classes.dedup();
                assert_eq!(classes.len(), 4);
            }
        }
    }

    #[test]
    fn test_obstacles_avoid_units() {
        for seed in 0..50 {
            let mut rng = DeterministicRng::new(seed);
            let state = MatchState::generate(MatchConfig::default(), &mut rng);
            assert_eq!(state.obstacles.obstacles().len(), 5);
            for cell in state.obstacles.obstacles() {
                assert!(!state.units.is_occupied(*cell));
            }
        }
    }

    #[test]
    fn test_caster_count_clamped() {
        let mut rng = ScriptedRng::new(vec![0]);
        let state = MatchState::generate(MatchConfig { casters_per_team: 9, obstacle_count: 0 }, &mut rng);
        assert_eq!(state.units.of_team(Team::A).count(), 5);
        assert!(state.obstacles.obstacles().is_empty());
    }

    #[test]
    fn test_same_seed_same_match() {
        let a = MatchState::generate(MatchConfig::default(), &mut DeterministicRng::new(7));
        let b = MatchState::generate(MatchConfig::default(), &mut DeterministicRng::new(7));
        assert_eq!(a, b);
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_effect_ids_monotonic() {
        let mut state = MatchState::new(UnitRegistry::default(), Board::default());
        let first = state.push_effect(EffectKind::Melee, GridPos::new(1, 1));
        let second = state.push_effect(EffectKind::Pyro, GridPos::new(2, 2));
        assert!(second > first);

        assert!(state.dismiss_effect(first));
        assert!(!state.dismiss_effect(first));

        let drained = state.take_effects();
        assert_eq!(drained.len(), 1);
        assert!(state.effects.is_empty());

        let third = state.push_effect(EffectKind::Dark, GridPos::new(0, 0));
        assert!(third > second);
    }

    #[test]
    fn test_hash_ignores_effects() {
        let mut state = MatchState::new(UnitRegistry::default(), Board::default());
        let before = state.compute_hash();
        state.push_effect(EffectKind::Cryo, GridPos::new(4, 4));
        assert_eq!(before, state.compute_hash());

        state.turn_count += 1;
        assert_ne!(before, state.compute_hash());
    }

    #[test]
    fn test_wire_field_names() {
        let state = MatchState::generate(MatchConfig::default(), &mut DeterministicRng::new(1));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currentTurn"], "player");
        assert_eq!(json["turnCount"], 1);
        assert!(json["winner"].is_null());
        assert_eq!(json["isAbilityMode"], false);
        assert!(json["activeVFX"].as_array().unwrap().is_empty());
        assert_eq!(json["units"].as_array().unwrap().len(), 10);
        assert_eq!(json["obstacles"].as_array().unwrap().len(), 5);
        assert!(json.get("next_effect_id").is_none());
    }
}
