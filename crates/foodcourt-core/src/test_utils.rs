//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::entity::Entity;
use crate::floor::Floor;
use crate::geometry::Position;
use crate::id::{EntityId, EntityKey, ToppingId};
use crate::operation::Operation;
use crate::payload::Side;

// ===========================================================================
// Plain entities
// ===========================================================================

pub fn plain(id: EntityId) -> Entity {
    Entity::new(id)
}

pub fn cooked(id: EntityId, operation: Operation) -> Entity {
    Entity::new(id).with_operations([operation])
}

pub fn grilled_meat() -> Entity {
    cooked(EntityId::Meat, Operation::CookGrill)
}

pub fn fried_chicken(id: EntityId) -> Entity {
    cooked(id, Operation::CookFryer)
}

// ===========================================================================
// Containers
// ===========================================================================

pub fn multitray_of(ids: &[EntityId]) -> Entity {
    Entity::multitray().with_children(ids.iter().map(|&id| Entity::new(id)))
}

/// A burger with the given parts on top of its bottom bun, in order.
pub fn burger_of(parts: &[EntityId]) -> Entity {
    Entity::burger().with_children(parts.iter().map(|&id| Entity::new(id)))
}

/// A single stack built bottom-up: `ids[0]` holds `ids[1]`, and so on.
pub fn tower(ids: &[EntityId]) -> Entity {
    let (first, rest) = ids.split_first().expect("tower needs at least one tag");
    match rest {
        [] => Entity::new(*first),
        _ => Entity::new(*first).with_stack(tower(rest)),
    }
}

pub fn soda(capacity: u32, fluid: ToppingId, count: u32) -> Entity {
    Entity::cup(capacity).with_fluids([(fluid, count)])
}

pub fn nigiri(fish: EntityId) -> Entity {
    Entity::new(EntityId::Rice).with_stack(Entity::new(fish))
}

pub fn sushi_roll(left: Entity, right: Entity) -> Entity {
    Entity::nori().with_side(Side::Left, left).with_side(Side::Right, right)
}

// ===========================================================================
// Goals
// ===========================================================================

/// Goal multitray of fried chicken pieces where any piece will do.
pub fn wing_goal(pieces: usize) -> Entity {
    Entity::multitray().with_children(
        (0..pieces).map(|_| Entity::wing_placeholder().with_operations([Operation::CookFryer])),
    )
}

// ===========================================================================
// Floor helpers
// ===========================================================================

/// Spawn each entity on its own cell along the bottom row, wrapping upward.
pub fn floor_with(entities: impl IntoIterator<Item = Entity>) -> (Floor, Vec<EntityKey>) {
    let mut floor = Floor::default();
    let columns = floor.config().columns;
    let keys = entities
        .into_iter()
        .enumerate()
        .map(|(i, entity)| {
            let i = i as i32;
            floor
                .spawn(entity, Position::new(i % columns, i / columns))
                .expect("fixture exceeds floor size")
        })
        .collect();
    (floor, keys)
}
