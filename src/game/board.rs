//! Board Model
//!
//! The fixed set of obstacle cells. Generated once at match start and
//! never mutated afterwards.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::core::hash::{StateDigest, StateHasher};
use crate::core::rng::RandomSource;
use crate::BOARD_SIZE;

/// First row obstacles may occupy.
pub const OBSTACLE_MIN_ROW: i32 = 2;

/// Last row obstacles may occupy.
pub const OBSTACLE_MAX_ROW: i32 = 6;

/// Impassable cells, in generation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    obstacles: Vec<GridPos>,
}

impl Board {
    /// Board with the given obstacles. Duplicates are dropped.
    pub fn with_obstacles(cells: impl IntoIterator<Item = GridPos>) -> Self {
        let mut obstacles = Vec::new();
        for cell in cells {
            if !obstacles.contains(&cell) {
                obstacles.push(cell);
            }
        }
        Self { obstacles }
    }

    /// Rejection-sample `count` distinct obstacle cells in the middle band,
    /// skipping any cell in `occupied`.
    ///
    /// The band holds 45 cells; callers keep `count` well below that.
    pub fn generate<R: RandomSource>(
        rng: &mut R,
        count: usize,
        occupied: &[GridPos],
    ) -> Self {
        let mut obstacles: Vec<GridPos> = Vec::with_capacity(count);
        while obstacles.len() < count {
            let x = rng.next_int_range(0, BOARD_SIZE - 1);
            let z = rng.next_int_range(OBSTACLE_MIN_ROW, OBSTACLE_MAX_ROW);
            let cell = GridPos::new(x, z);
            if obstacles.contains(&cell) || occupied.contains(&cell) {
                continue;
            }
            obstacles.push(cell);
        }
        Self { obstacles }
    }

    /// Whether `cell` is blocked.
    #[inline]
    pub fn is_obstructed(&self, cell: GridPos) -> bool {
        self.obstacles.contains(&cell)
    }

    /// All obstacle cells.
    pub fn obstacles(&self) -> &[GridPos] {
        &self.obstacles
    }
}

impl StateDigest for Board {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(self.obstacles.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{DeterministicRng, ScriptedRng};

    #[test]
    fn test_generate_stays_in_band() {
        for seed in 0..50 {
            let mut rng = DeterministicRng::new(seed);
            let board = Board::generate(&mut rng, 5, &[]);
            assert_eq!(board.obstacles().len(), 5);
            for cell in board.obstacles() {
                assert!(cell.in_bounds());
                assert!((OBSTACLE_MIN_ROW..=OBSTACLE_MAX_ROW).contains(&cell.z));
            }
        }
    }

    #[test]
    fn test_generate_skips_duplicates_and_occupied() {
        // x draws 0,0,1,2 ; z draws 0,0,0,0 -> (0,2) (0,2) (1,2) (2,2)
        let mut rng = ScriptedRng::new(vec![0, 0, 0, 0, 1, 0, 2, 0]);
        let occupied = [GridPos::new(1, 2)];
        let board = Board::generate(&mut rng, 2, &occupied);
        assert_eq!(board.obstacles(), &[GridPos::new(0, 2), GridPos::new(2, 2)]);
    }

    #[test]
    fn test_is_obstructed() {
        let board = Board::with_obstacles([GridPos::new(3, 3), GridPos::new(3, 3)]);
        assert_eq!(board.obstacles().len(), 1);
        assert!(board.is_obstructed(GridPos::new(3, 3)));
        assert!(!board.is_obstructed(GridPos::new(3, 4)));
    }

    #[test]
    fn test_serializes_as_cell_list() {
        let board = Board::with_obstacles([GridPos::new(1, 2), GridPos::new(5, 6)]);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, "[[1,2],[5,6]]");
    }
}
