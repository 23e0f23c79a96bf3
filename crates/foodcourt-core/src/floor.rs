//! The factory floor: the registry of free-floating, top-level entities.
//!
//! Entities live in a slot map keyed by [`EntityKey`], with a position index
//! on the side. Stacking moves an entity out of the floor and into its new
//! parent; from then on the floor no longer knows about it.

use crate::config::FloorConfig;
use crate::entity::{Entity, Placement};
use crate::geometry::{Direction, Position};
use crate::id::{EntityId, EntityKey};
use crate::movement::PendingMove;
use crate::payload::Side;
use crate::registry::Registry;
use slotmap::SlotMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Errors from floor bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FloorError {
    #[error("entity {0:?} is not on the floor")]
    UnknownEntity(EntityKey),
    #[error("position {0} is outside the floor")]
    OutOfBounds(Position),
}

/// Top-level entities and where they are.
#[derive(Debug, Clone, Default)]
pub struct Floor {
    config: FloorConfig,
    entities: SlotMap<EntityKey, Entity>,
    cells: BTreeMap<Position, Vec<EntityKey>>,
}

impl Floor {
    pub fn new(config: FloorConfig) -> Self {
        Self {
            config,
            entities: SlotMap::with_key(),
            cells: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &FloorConfig {
        &self.config
    }

    // -- Tracking --

    /// Put a new entity on the floor at `position`.
    pub fn spawn(&mut self, mut entity: Entity, position: Position) -> Result<EntityKey, FloorError> {
        if !self.config.contains(position) {
            return Err(FloorError::OutOfBounds(position));
        }
        entity.set_position(position);
        let id = entity.id();
        let key = self.entities.insert(entity);
        self.cells.entry(position).or_default().push(key);
        debug!(?key, ?id, %position, "spawned");
        Ok(key)
    }

    /// Take an entity off the floor, e.g. when it leaves through the output.
    /// Its position is reset to [`Position::UNPLACED`].
    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        let mut entity = self.entities.remove(key)?;
        self.unindex(key, entity.position());
        entity.set_position(Position::UNPLACED);
        debug!(?key, id = ?entity.id(), "detached");
        Some(entity)
    }

    fn unindex(&mut self, key: EntityKey, position: Position) {
        if let Some(keys) = self.cells.get_mut(&position) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.cells.remove(&position);
            }
        }
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mutable access for payload and history changes. Move entities with
    /// [`Floor::move_entity`] rather than by setting their position.
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn position_of(&self, key: EntityKey) -> Option<Position> {
        self.entities.get(key).map(Entity::position)
    }

    /// Keys of every entity in a cell, in arrival order.
    pub fn keys_at(&self, position: Position) -> &[EntityKey] {
        self.cells.get(&position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single entity in a cell. Panics if the cell holds several, which
    /// only happens mid-resolution before collisions are settled.
    pub fn entity_at(&self, position: Position) -> Option<EntityKey> {
        let keys = self.keys_at(position);
        assert!(keys.len() <= 1, "multiple entities at {position}");
        keys.first().copied()
    }

    /// Cells holding more than one entity.
    pub fn collisions(&self) -> Vec<Position> {
        self.cells
            .iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(pos, _)| *pos)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every tracked entity, by position then arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> + '_ {
        self.cells
            .values()
            .flatten()
            .map(move |&key| (key, &self.entities[key]))
    }

    /// The entities alone, in [`Floor::iter`] order. Feed this to
    /// [`crate::snapshot::encode_state`].
    pub fn top_level(&self) -> Vec<&Entity> {
        self.iter().map(|(_, entity)| entity).collect()
    }

    // -- Movement --

    /// Move an entity one cell in `direction`. Returns the new position.
    pub fn move_entity(&mut self, key: EntityKey, direction: Direction) -> Result<Position, FloorError> {
        let from = self.position_of(key).ok_or(FloorError::UnknownEntity(key))?;
        let to = from.shift_by(direction);
        if !self.config.contains(to) {
            return Err(FloorError::OutOfBounds(to));
        }
        self.unindex(key, from);
        self.cells.entry(to).or_default().push(key);
        self.entities[key].set_position(to);
        debug!(?key, %from, %to, "moved");
        Ok(to)
    }

    pub fn apply_move(&mut self, pending: &PendingMove) -> Result<Position, FloorError> {
        self.move_entity(pending.entity(), pending.direction())
    }

    // -- Stacking --

    fn tracked(&self, key: EntityKey) -> &Entity {
        self.entities
            .get(key)
            .unwrap_or_else(|| panic!("{key:?} is not tracked on the floor"))
    }

    /// Stack `other` onto the floor entity `container` with the generic
    /// placement rules. Returns `error` if the placement is not allowed, in
    /// which case both entities stay where they are.
    ///
    /// Panics if either key is not on the floor or both are the same.
    pub fn stack<E>(&mut self, container: EntityKey, other: EntityKey, error: E) -> Result<(), E> {
        assert_ne!(container, other, "an entity cannot be stacked onto itself");
        let incoming = self.tracked(other).id();
        let plan = self.tracked(container).plan_stack(incoming);
        self.commit_planned(container, plan, other, error)
    }

    /// Stack `other` into the chosen side slot of the floor entity
    /// `container`.
    ///
    /// Panics if either key is not on the floor, both are the same, or the
    /// container has no side slots.
    pub fn stack_on_side<E>(
        &mut self,
        container: EntityKey,
        side: Side,
        other: EntityKey,
        error: E,
    ) -> Result<(), E> {
        assert_ne!(container, other, "an entity cannot be stacked onto itself");
        let incoming = self.tracked(other).id();
        let plan = self.tracked(container).plan_side(side, incoming);
        self.commit_planned(container, plan, other, error)
    }

    fn commit_planned<E>(
        &mut self,
        container: EntityKey,
        plan: Option<Placement>,
        other: EntityKey,
        error: E,
    ) -> Result<(), E> {
        let Some(plan) = plan else {
            debug!(?container, ?other, "placement rejected");
            return Err(error);
        };
        let child = self
            .remove(other)
            .unwrap_or_else(|| panic!("{other:?} vanished from the floor during placement"));
        debug!(?container, child = ?child.id(), depth = plan.depth(), "stacked");
        self.entities[container].commit(&plan, child);
        Ok(())
    }
}

impl Registry for Floor {
    type Key = EntityKey;

    fn tag(&self, key: EntityKey) -> Option<EntityId> {
        self.get(key).map(Entity::id)
    }

    fn detach(&mut self, key: EntityKey) -> Option<Entity> {
        self.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use tracing_test::traced_test;

    fn origin() -> Position {
        Position::new(0, 0)
    }

    #[test]
    fn spawn_tracks_position() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Nacho), Position::new(2, 3)).unwrap();
        assert_eq!(floor.position_of(key), Some(Position::new(2, 3)));
        assert_eq!(floor.entity_at(Position::new(2, 3)), Some(key));
        assert_eq!(floor.len(), 1);
    }

    #[test]
    fn spawn_out_of_bounds() {
        let mut floor = Floor::default();
        let err = floor.spawn(Entity::new(EntityId::Nacho), Position::new(6, 0)).unwrap_err();
        assert_eq!(err, FloorError::OutOfBounds(Position::new(6, 0)));
        assert!(floor.is_empty());
    }

    #[test]
    fn remove_resets_position() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        let entity = floor.remove(key).unwrap();
        assert!(!entity.position().is_placed());
        assert!(floor.keys_at(origin()).is_empty());
        assert!(floor.remove(key).is_none());
    }

    #[test]
    fn move_updates_index() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        assert_eq!(floor.move_entity(key, Direction::Up), Ok(Position::new(0, 1)));
        assert_eq!(floor.entity_at(origin()), None);
        assert_eq!(floor.entity_at(Position::new(0, 1)), Some(key));
        assert_eq!(floor.get(key).unwrap().position(), Position::new(0, 1));
    }

    #[test]
    fn move_off_floor_is_rejected() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        assert_eq!(
            floor.move_entity(key, Direction::Left),
            Err(FloorError::OutOfBounds(Position::new(-1, 0)))
        );
        assert_eq!(floor.position_of(key), Some(origin()));
    }

    #[test]
    fn move_unknown_entity() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        floor.remove(key);
        assert_eq!(floor.move_entity(key, Direction::Up), Err(FloorError::UnknownEntity(key)));
    }

    #[test]
    fn collisions_are_reported() {
        let mut floor = Floor::default();
        floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        let b = floor.spawn(Entity::new(EntityId::Pretzel), Position::new(1, 0)).unwrap();
        assert!(floor.collisions().is_empty());
        floor.move_entity(b, Direction::Left).unwrap();
        assert_eq!(floor.collisions(), vec![origin()]);
        assert_eq!(floor.keys_at(origin()).len(), 2);
    }

    #[test]
    #[should_panic(expected = "multiple entities")]
    fn entity_at_panics_on_collision() {
        let mut floor = Floor::default();
        floor.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        floor.spawn(Entity::new(EntityId::Pretzel), origin()).unwrap();
        let _ = floor.entity_at(origin());
    }

    #[test]
    fn iteration_is_by_position() {
        let mut floor = Floor::default();
        let far = floor.spawn(Entity::new(EntityId::Nacho), Position::new(3, 3)).unwrap();
        let near = floor.spawn(Entity::new(EntityId::Pretzel), Position::new(0, 1)).unwrap();
        let keys: Vec<_> = floor.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![near, far]);
    }

    #[test]
    fn top_level_snapshot_ignores_spawn_order() {
        let mut a = Floor::default();
        a.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        a.spawn(Entity::new(EntityId::Pretzel), Position::new(1, 0)).unwrap();
        let mut b = Floor::default();
        b.spawn(Entity::new(EntityId::Pretzel), Position::new(1, 0)).unwrap();
        b.spawn(Entity::new(EntityId::Nacho), origin()).unwrap();
        assert_eq!(
            crate::snapshot::encode_state(a.top_level()).unwrap(),
            crate::snapshot::encode_state(b.top_level()).unwrap()
        );
    }

    #[test]
    fn stack_moves_entity_into_container() {
        let mut floor = Floor::default();
        let tray = floor.spawn(Entity::new(EntityId::Tray), origin()).unwrap();
        let cone = floor.spawn(Entity::new(EntityId::Cone), Position::new(1, 0)).unwrap();
        assert_eq!(floor.stack(tray, cone, "occupied"), Ok(()));
        assert!(floor.get(cone).is_none());
        assert!(floor.keys_at(Position::new(1, 0)).is_empty());
        assert_eq!(floor.get(tray).unwrap().stack().map(Entity::id), Some(EntityId::Cone));
    }

    #[test]
    fn rejected_stack_keeps_both() {
        let mut floor = Floor::default();
        let cup = floor.spawn(Entity::cup(2), origin()).unwrap();
        let nacho = floor.spawn(Entity::new(EntityId::Nacho), Position::new(1, 0)).unwrap();
        assert_eq!(floor.stack(cup, nacho, "wrong"), Err("wrong"));
        assert_eq!(floor.len(), 2);
        assert!(floor.get(cup).unwrap().stack().is_none());
        assert_eq!(floor.position_of(nacho), Some(Position::new(1, 0)));
    }

    #[test]
    fn stack_on_side() {
        let mut floor = Floor::default();
        let nori = floor.spawn(Entity::nori(), origin()).unwrap();
        let rice = floor.spawn(Entity::new(EntityId::Rice), Position::new(0, 1)).unwrap();
        assert_eq!(floor.stack(nori, rice, "pick a side"), Err("pick a side"));
        assert_eq!(floor.stack_on_side(nori, Side::Right, rice, "pick a side"), Ok(()));
        let nori = floor.get(nori).unwrap();
        assert_eq!(nori.side(Side::Right).map(Entity::id), Some(EntityId::Rice));
        assert!(nori.side(Side::Left).is_none());
    }

    #[test]
    #[should_panic(expected = "onto itself")]
    fn stacking_onto_itself_panics() {
        let mut floor = Floor::default();
        let tray = floor.spawn(Entity::new(EntityId::Tray), origin()).unwrap();
        let _ = floor.stack(tray, tray, ());
    }

    #[test]
    fn history_mutation_through_get_mut() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Pocket), origin()).unwrap();
        floor.get_mut(key).unwrap().push_operation(Operation::CookMicrowave);
        assert_eq!(floor.get(key).unwrap().operations(), &[Operation::CookMicrowave]);
    }

    #[test]
    fn registry_contract() {
        let mut floor = Floor::default();
        let key = floor.spawn(Entity::new(EntityId::Lid), origin()).unwrap();
        assert_eq!(floor.tag(key), Some(EntityId::Lid));
        let lid = floor.detach(key).unwrap();
        assert_eq!(lid.id(), EntityId::Lid);
        assert_eq!(floor.tag(key), None);
    }

    #[test]
    #[traced_test]
    fn detach_is_logged() {
        let mut floor = Floor::default();
        let tray = floor.spawn(Entity::new(EntityId::Tray), origin()).unwrap();
        let glass = floor.spawn(Entity::new(EntityId::Glass), Position::new(1, 0)).unwrap();
        floor.stack(tray, glass, ()).unwrap();
        assert!(logs_contain("detached"));
        assert!(logs_contain("stacked"));
    }
}
