//! Effect Events
//!
//! Visual hints emitted by the resolver for the rendering side. They are
//! gameplay-inert: nothing in the rules ever reads them back.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::game::unit::UnitClass;

/// What produced the effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Pyro burst
    Pyro,
    /// Cryo freeze
    Cryo,
    /// Arcane teleport (emitted at departure and arrival)
    Arcane,
    /// Dark drain
    Dark,
    /// Basic melee hit
    Melee,
}

impl EffectKind {
    /// Suggested display time in milliseconds.
    pub fn duration_ms(self) -> u32 {
        match self {
            EffectKind::Pyro => 700,
            EffectKind::Cryo => 1000,
            EffectKind::Arcane => 400,
            EffectKind::Dark => 600,
            EffectKind::Melee => 300,
        }
    }

    /// Effect for a caster class's ability. `None` for the Core.
    pub fn for_ability(class: UnitClass) -> Option<Self> {
        match class {
            UnitClass::Pyro => Some(EffectKind::Pyro),
            UnitClass::Cryo => Some(EffectKind::Cryo),
            UnitClass::Arcane => Some(EffectKind::Arcane),
            UnitClass::Dark => Some(EffectKind::Dark),
            UnitClass::Core => None,
        }
    }
}

/// A single pending effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectEvent {
    /// Monotonic within a match
    pub id: u64,
    /// Kind (wire name `type`)
    #[serde(rename = "type")]
    pub kind: EffectKind,
    /// Cell the effect plays on
    pub pos: GridPos,
    /// Display hint in milliseconds
    pub duration: u32,
}

impl EffectEvent {
    /// Create with the kind's default duration.
    pub fn new(id: u64, kind: EffectKind, pos: GridPos) -> Self {
        Self {
            id,
            kind,
            pos,
            duration: kind.duration_ms(),
        }
    }
}
