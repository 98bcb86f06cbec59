//! Units and the Unit Registry
//!
//! Teams, unit classes, and the ordered collection of units alive in a
//! match. Registry order is the spawn order and is preserved across
//! removals; the bot breaks ties by it.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::core::hash::{StateDigest, StateHasher};
use crate::{CASTER_MAX_HP, CORE_HP, INITIAL_LAST_ABILITY_TURN};

// =============================================================================
// TEAM
// =============================================================================

/// One of the two sides.
///
/// On the wire team A is `"player"` and team B is `"enemy"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    /// Moves first; home rows 0-1.
    #[serde(rename = "player")]
    A,
    /// Moves second; home rows 7-8.
    #[serde(rename = "enemy")]
    B,
}

impl Team {
    /// The opposing team.
    #[inline]
    pub fn other(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }

    /// Prefix used in unit ids (`p_` or `e_`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Team::A => "p",
            Team::B => "e",
        }
    }

    /// Row of this team's Core.
    pub fn core_row(self) -> i32 {
        match self {
            Team::A => 0,
            Team::B => crate::BOARD_SIZE - 1,
        }
    }

    /// Row the team's casters start on.
    pub fn caster_row(self) -> i32 {
        match self {
            Team::A => 1,
            Team::B => crate::BOARD_SIZE - 2,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Team::A => write!(f, "player"),
            Team::B => write!(f, "enemy"),
        }
    }
}

// =============================================================================
// UNIT CLASS
// =============================================================================

/// Unit class. The four casters each have one ability; the Core has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Striker-AoE: damages every enemy around the target cell.
    Pyro,
    /// Freeze: stuns the enemy on the target cell.
    Cryo,
    /// Teleport-Drain: jumps to an empty cell.
    Arcane,
    /// Lifesteal: drains one hit point from the enemy on the target cell.
    Dark,
    /// Non-combatant objective. Destroying it ends the match.
    Core,
}

impl UnitClass {
    /// The classes a caster can be assigned at match start.
    pub const CASTERS: [UnitClass; 4] = [
        UnitClass::Pyro,
        UnitClass::Cryo,
        UnitClass::Arcane,
        UnitClass::Dark,
    ];

    /// Chebyshev range of this class's ability, `None` for the Core.
    pub fn ability_range(self) -> Option<i32> {
        match self {
            UnitClass::Pyro => Some(1),
            UnitClass::Cryo => Some(3),
            UnitClass::Arcane => Some(3),
            UnitClass::Dark => Some(2),
            UnitClass::Core => None,
        }
    }

    /// Whether this is the Core.
    #[inline]
    pub fn is_core(self) -> bool {
        self == UnitClass::Core
    }

    fn hash_tag(self) -> u8 {
        match self {
            UnitClass::Pyro => 0,
            UnitClass::Cryo => 1,
            UnitClass::Arcane => 2,
            UnitClass::Dark => 3,
            UnitClass::Core => 4,
        }
    }
}

// =============================================================================
// UNIT
// =============================================================================

/// Stable unit identifier, unique within a match.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of a team's Core (`p_core` / `e_core`).
    pub fn core(team: Team) -> Self {
        Self(format!("{}_core", team.id_prefix()))
    }

    /// Id of a team's `index`-th caster (`p_w_0`, ...).
    pub fn caster(team: Team, index: usize) -> Self {
        Self(format!("{}_w_{}", team.id_prefix(), index))
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A combat unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id
    pub id: UnitId,

    /// Class (wire name `type`)
    #[serde(rename = "type")]
    pub class: UnitClass,

    /// Owning team
    pub team: Team,

    /// Hit points; the unit is removed at 0 or below
    pub hp: i32,

    /// Current cell
    pub pos: GridPos,

    /// Turn count of the last successful ability cast
    #[serde(rename = "lastUsedTurn")]
    pub last_ability_turn: i32,

    /// Own-team turns left before the unit can act again
    #[serde(rename = "isStunned")]
    pub stun_turns: u32,
}

impl Unit {
    /// Create a caster with full hit points and a ready ability.
    pub fn caster(id: UnitId, team: Team, class: UnitClass, pos: GridPos) -> Self {
        Self {
            id,
            class,
            team,
            hp: CASTER_MAX_HP,
            pos,
            last_ability_turn: INITIAL_LAST_ABILITY_TURN,
            stun_turns: 0,
        }
    }

    /// Create a team's Core.
    pub fn core(team: Team, pos: GridPos) -> Self {
        Self {
            id: UnitId::core(team),
            class: UnitClass::Core,
            team,
            hp: CORE_HP,
            pos,
            last_ability_turn: INITIAL_LAST_ABILITY_TURN,
            stun_turns: 0,
        }
    }

    /// Whether the unit is the Core.
    #[inline]
    pub fn is_core(&self) -> bool {
        self.class.is_core()
    }

    /// Whether the unit is stunned.
    #[inline]
    pub fn is_stunned(&self) -> bool {
        self.stun_turns > 0
    }

    /// Whether the ability cooldown has elapsed at `turn_count`.
    #[inline]
    pub fn ability_ready(&self, turn_count: u32) -> bool {
        turn_count as i64 - self.last_ability_turn as i64 >= crate::ABILITY_COOLDOWN_TURNS as i64
    }

}

impl StateDigest for Team {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(&(*self as u8));
    }
}

impl StateDigest for Unit {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher
            .put(self.id.as_str())
            .put(&self.class.hash_tag())
            .put(&self.team)
            .put(&self.hp)
            .put(&self.pos)
            .put(&self.last_ability_turn)
            .put(&self.stun_turns);
    }
}

// =============================================================================
// UNIT REGISTRY
// =============================================================================

/// All units alive in a match, in spawn order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    /// Create from a list of units.
    pub fn new(units: Vec<Unit>) -> Self {
        Self { units }
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no units remain.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Iterate mutably in registry order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    /// Get a unit by id.
    pub fn get(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.id == id)
    }

    /// Get a unit mutably by id.
    pub fn get_mut(&mut self, id: &UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| &u.id == id)
    }

    /// The unit standing on `pos`, if any.
    pub fn at(&self, pos: GridPos) -> Option<&Unit> {
        self.units.iter().find(|u| u.pos == pos)
    }

    /// Whether any unit stands on `pos`.
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.at(pos).is_some()
    }

    /// Units belonging to `team`.
    pub fn of_team(&self, team: Team) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.team == team)
    }

    /// A team's Core, if it still stands.
    pub fn core_of(&self, team: Team) -> Option<&Unit> {
        self.units.iter().find(|u| u.team == team && u.is_core())
    }

    /// Subtract `amount` hit points from a unit. Does not remove it;
    /// call [`UnitRegistry::remove_casualties`] afterwards.
    pub fn damage(&mut self, id: &UnitId, amount: i32) {
        if let Some(unit) = self.get_mut(id) {
            unit.hp -= amount;
        }
    }

    /// Remove every unit with `hp <= 0`, returning the removed ids.
    pub fn remove_casualties(&mut self) -> Vec<UnitId> {
        let removed: Vec<UnitId> = self.units
            .iter()
            .filter(|u| u.hp <= 0)
            .map(|u| u.id.clone())
            .collect();
        self.units.retain(|u| u.hp > 0);
        removed
    }
}

impl StateDigest for UnitRegistry {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(self.units.as_slice());
    }
}

impl FromIterator<Unit> for UnitRegistry {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        Self { units: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> UnitRegistry {
        UnitRegistry::new(vec![
            Unit::caster(UnitId::caster(Team::A, 0), Team::A, UnitClass::Pyro, GridPos::new(3, 1)),
            Unit::core(Team::A, GridPos::new(4, 0)),
            Unit::caster(UnitId::caster(Team::B, 0), Team::B, UnitClass::Dark, GridPos::new(3, 7)),
            Unit::core(Team::B, GridPos::new(4, 8)),
        ])
    }

    #[test]
    fn test_team_other() {
        assert_eq!(Team::A.other(), Team::B);
        assert_eq!(Team::B.other(), Team::A);
    }

    #[test]
    fn test_ids() {
        assert_eq!(UnitId::core(Team::A).as_str(), "p_core");
        assert_eq!(UnitId::caster(Team::B, 2).as_str(), "e_w_2");
    }

    #[test]
    fn test_starting_stats() {
        let registry = sample_registry();
        let core = registry.core_of(Team::B).unwrap();
        assert_eq!(core.hp, 3);
        let caster = registry.get(&UnitId::from("p_w_0")).unwrap();
        assert_eq!(caster.hp, 2);
        assert!(caster.ability_ready(1));
        assert!(!caster.is_stunned());
    }

    #[test]
    fn test_cooldown() {
        let mut unit = Unit::caster(UnitId::from("p_w_0"), Team::A, UnitClass::Cryo, GridPos::new(0, 0));
        unit.last_ability_turn = 4;
        assert!(!unit.ability_ready(5));
        assert!(!unit.ability_ready(6));
        assert!(unit.ability_ready(7));
    }

    #[test]
    fn test_casualties_removed_in_order() {
        let mut registry = sample_registry();
        registry.damage(&UnitId::from("e_w_0"), 2);
        registry.damage(&UnitId::from("p_core"), 1);

        let removed = registry.remove_casualties();
        assert_eq!(removed, vec![UnitId::from("e_w_0")]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(&UnitId::from("p_core")).unwrap().hp, 2);

        let ids: Vec<&str> = registry.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["p_w_0", "p_core", "e_core"]);
    }

    #[test]
    fn test_lookup_by_position() {
        let registry = sample_registry();
        assert_eq!(registry.at(GridPos::new(4, 8)).unwrap().id.as_str(), "e_core");
        assert!(!registry.is_occupied(GridPos::new(4, 4)));
    }

    #[test]
    fn test_unit_wire_names() {
        let unit = Unit::core(Team::A, GridPos::new(4, 0));
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["type"], "Core");
        assert_eq!(json["team"], "player");
        assert_eq!(json["lastUsedTurn"], -3);
        assert_eq!(json["isStunned"], 0);
        assert_eq!(json["pos"], serde_json::json!([4, 0]));
    }
}
