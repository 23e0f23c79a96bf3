//! The detach contract between entities and whatever tracks free-floating
//! entities at the top level.

use crate::entity::Entity;
use crate::id::EntityId;

/// Tracks top-level entities and hands them over when they get stacked.
///
/// Placement asks for [`Registry::tag`] while validating and calls
/// [`Registry::detach`] at most once, only after validation succeeded. The
/// detached entity is owned by its new parent from then on.
pub trait Registry {
    type Key: Copy + std::fmt::Debug;

    /// Tag of a tracked entity, or `None` if `key` is not tracked.
    fn tag(&self, key: Self::Key) -> Option<EntityId>;

    /// Stop tracking `key` and give up ownership of the entity. Implementors
    /// reset the entity's position to [`Position::UNPLACED`].
    ///
    /// [`Position::UNPLACED`]: crate::geometry::Position::UNPLACED
    fn detach(&mut self, key: Self::Key) -> Option<Entity>;
}
