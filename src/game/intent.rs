//! Intents
//!
//! A single requested action by one unit. Intents are the only way
//! anything outside the rules engine asks for a state change.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::game::unit::UnitId;

/// Requested action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Step one cell, attacking if an enemy stands there.
    Move {
        /// Acting unit
        unit: UnitId,
        /// Destination cell
        target: GridPos,
    },
    /// Cast the unit's class ability at a cell.
    Ability {
        /// Acting unit
        unit: UnitId,
        /// Target cell
        target: GridPos,
    },
}

impl Intent {
    /// Move intent.
    pub fn movement(unit: impl Into<UnitId>, target: GridPos) -> Self {
        Intent::Move { unit: unit.into(), target }
    }

    /// Ability intent.
    pub fn ability(unit: impl Into<UnitId>, target: GridPos) -> Self {
        Intent::Ability { unit: unit.into(), target }
    }

    /// The acting unit.
    pub fn unit(&self) -> &UnitId {
        match self {
            Intent::Move { unit, .. } | Intent::Ability { unit, .. } => unit,
        }
    }

    /// The targeted cell.
    pub fn target(&self) -> GridPos {
        match self {
            Intent::Move { target, .. } | Intent::Ability { target, .. } => *target,
        }
    }

    /// Whether this is an ability cast.
    pub fn is_ability(&self) -> bool {
        matches!(self, Intent::Ability { .. })
    }
}
