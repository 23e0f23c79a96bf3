//! Foodcourt Core -- the entity model of a food-court factory puzzle.
//!
//! Items ("entities") ride conveyors across a small grid, get cooked and
//! filled by machines, stack onto each other, and are finally compared
//! against a goal product. This crate owns that model: what an entity is,
//! what can be stacked onto what, how two finished products compare, and
//! the floor registry that top-level entities live in.
//!
//! # Stacking
//!
//! Every container decides where an incoming entity lands from its tag and
//! current contents alone. Placement is planned first and only then
//! committed, detaching the incoming entity from the [`floor::Floor`]:
//!
//! ```rust,ignore
//! let tray = floor.spawn(Entity::new(EntityId::Tray), Position::new(0, 0))?;
//! let cone = floor.spawn(Entity::new(EntityId::Cone), Position::new(1, 0))?;
//! floor.stack(tray, cone, Jam::Incompatible)?;
//! ```
//!
//! # Key Types
//!
//! - [`entity::Entity`] -- Tag, operation history, position, and a
//!   [`entity::Body`] holding the stacking policy and payload.
//! - [`compat`] -- The static "can X sit on Y" table.
//! - [`registry::Registry`] -- The detach contract used while stacking.
//! - [`floor::Floor`] -- Slot-map registry of top-level entities with a
//!   position index.
//! - [`movement::PendingMove`] -- An identity-keyed intent to move one cell.
//! - [`snapshot`] -- Canonical bitcode snapshots and state hashes.

pub mod compat;
pub mod config;
pub mod entity;
pub mod floor;
pub mod geometry;
pub mod id;
pub mod movement;
pub mod operation;
pub mod payload;
pub mod registry;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
