//! Pending moves produced by machines each tick and consumed by the move
//! scheduler.

use crate::floor::Floor;
use crate::geometry::{Direction, Position};
use crate::id::EntityKey;
use serde::{Deserialize, Serialize};

/// An intent to move one top-level entity by one cell.
///
/// Equality and ordering go by entity *identity* (its floor key), then
/// direction, then the force flag. Two structurally identical entities in
/// different cells therefore never collapse into one move.
///
/// Forced moves (conveyors) must happen or the floor jams; unforced moves
/// (e.g. a router offering an exit) may be dropped by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingMove {
    entity: EntityKey,
    direction: Direction,
    force: bool,
}

impl PendingMove {
    /// A forced move.
    pub fn new(entity: EntityKey, direction: Direction) -> Self {
        Self {
            entity,
            direction,
            force: true,
        }
    }

    /// A move the scheduler may decline.
    pub fn optional(entity: EntityKey, direction: Direction) -> Self {
        Self {
            entity,
            direction,
            force: false,
        }
    }

    pub fn entity(&self) -> EntityKey {
        self.entity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Where the entity is now.
    ///
    /// Read from the live floor on every call: only meaningful once the
    /// entity's position for the current resolution step is final. `None`
    /// if the entity is no longer on the floor.
    pub fn source(&self, floor: &Floor) -> Option<Position> {
        floor.position_of(self.entity)
    }

    /// Where the entity would end up. Same caveat as [`PendingMove::source`].
    pub fn dest(&self, floor: &Floor) -> Option<Position> {
        self.source(floor).map(|pos| pos.shift_by(self.direction))
    }

    /// Whether the move would push the entity off the floor.
    pub fn leaves_floor(&self, floor: &Floor) -> bool {
        self.dest(floor)
            .is_some_and(|dest| !floor.config().contains(dest))
    }
}

/// Tie-break rank among unforced moves competing for one empty cell:
/// down, right, left, up.
pub fn unforced_priority(direction: Direction) -> u8 {
    match direction {
        Direction::Down => 0,
        Direction::Right => 1,
        Direction::Left => 2,
        Direction::Up => 3,
    }
}

/// The unforced move that wins a contested cell.
pub fn pick_unforced(moves: &[PendingMove]) -> Option<PendingMove> {
    moves
        .iter()
        .filter(|m| !m.is_forced())
        .min_by_key(|m| (unforced_priority(m.direction), **m))
        .copied()
}
