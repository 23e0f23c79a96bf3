//! Grid geometry for the factory floor: directions and cell positions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Absolute travel direction on the floor.
///
/// Variants are numbered counter-clockwise starting from `Right`, so rotating
/// is modular arithmetic on the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Right = 0,
    Up = 1,
    Left = 2,
    Down = 3,
}

impl Direction {
    /// All four directions, in discriminant order.
    pub fn all() -> [Direction; 4] {
        [Direction::Right, Direction::Up, Direction::Left, Direction::Down]
    }

    fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Direction::Right,
            1 => Direction::Up,
            2 => Direction::Left,
            _ => Direction::Down,
        }
    }

    /// Numeric value used for ordering and rotation.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Rotate 90 degrees clockwise.
    pub fn right(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn left(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Reverse.
    pub fn back(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Classify this direction as seen by something facing `base`.
    pub fn relative_to(self, base: Direction) -> RelativeDirection {
        match (self.index() + 4 - base.index()) % 4 {
            0 => RelativeDirection::Front,
            1 => RelativeDirection::Right,
            2 => RelativeDirection::Back,
            _ => RelativeDirection::Left,
        }
    }
}

/// A direction relative to some facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelativeDirection {
    Front = 0,
    Right = 1,
    Back = 2,
    Left = 3,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A floor cell. Origin is the lower-left corner; rows grow upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub column: i32,
    pub row: i32,
}

impl Position {
    /// Sentinel for entities that are not on the floor.
    pub const UNPLACED: Position = Position {
        column: -1,
        row: -1,
    };

    pub fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    pub fn is_placed(&self) -> bool {
        *self != Self::UNPLACED
    }

    /// The adjacent cell in `direction`.
    pub fn shift_by(self, direction: Direction) -> Self {
        match direction {
            Direction::Right => Self::new(self.column + 1, self.row),
            Direction::Left => Self::new(self.column - 1, self.row),
            Direction::Up => Self::new(self.column, self.row + 1),
            Direction::Down => Self::new(self.column, self.row - 1),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::UNPLACED
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}
