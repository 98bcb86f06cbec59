//! Grid Coordinates
//!
//! Integer cell coordinates on the square battle grid, plus the two
//! distance metrics the rules use: Chebyshev for movement and ability
//! range, Manhattan for bot path ranking.

use serde::{Serialize, Deserialize};

use crate::BOARD_SIZE;

/// Offsets of the eight neighbouring cells.
///
/// The order matters: the bot ranks candidate moves with a stable sort,
/// so equal-distance candidates keep this order.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (-1, -1),
    (1, 0),
    (-1, 0),
    (0, 1),
    (1, 1),
    (-1, 1),
];

/// A cell on the grid.
///
/// Serialized as a two-element array `[x, z]` to match the wire format.
/// Coordinates are signed so that out-of-bounds targets arriving from a
/// client can be represented and rejected by the rules instead of failing
/// to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct GridPos {
    /// Column, 0..=8
    pub x: i32,
    /// Row, 0..=8 (team A's home row is 0)
    pub z: i32,
}

impl GridPos {
    /// Create a position.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Whether the cell lies on the board.
    #[inline]
    pub fn in_bounds(self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.z)
    }

    /// Chebyshev distance: `max(|dx|, |dz|)`.
    #[inline]
    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Manhattan distance: `|dx| + |dz|`.
    #[inline]
    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.z - other.z).abs()
    }

    /// Whether `other` is within Chebyshev `radius` of this cell.
    #[inline]
    pub fn within(self, other: GridPos, radius: i32) -> bool {
        self.chebyshev(other) <= radius
    }

    /// Cell displaced by `(dx, dz)`. May be out of bounds.
    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> GridPos {
        GridPos::new(self.x + dx, self.z + dz)
    }

    /// The eight surrounding cells in [`NEIGHBOR_OFFSETS`] order,
    /// including ones that fall off the board.
    pub fn neighbors(self) -> impl Iterator<Item = GridPos> {
        NEIGHBOR_OFFSETS.iter().map(move |&(dx, dz)| self.offset(dx, dz))
    }
}

impl From<[i32; 2]> for GridPos {
    fn from([x, z]: [i32; 2]) -> Self {
        Self { x, z }
    }
}

impl From<GridPos> for [i32; 2] {
    fn from(pos: GridPos) -> Self {
        [pos.x, pos.z]
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
