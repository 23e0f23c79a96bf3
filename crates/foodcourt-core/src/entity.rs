//! Entities: the items that ride conveyors, stack onto each other, and are
//! compared against goal products.
//!
//! Every entity carries an identity tag, an append-only operation history,
//! a floor position, and a [`Body`] that fixes its stacking policy:
//!
//! - [`Body::Single`] -- one optional child; placing onto an occupied slot
//!   walks up the existing stack. Payload variants (cups, doughs) live here.
//! - [`Body::Multi`] -- an append-only list of children, compared either as
//!   a multiset ([`StackOrder::Unordered`], multitrays) or in list order
//!   ([`StackOrder::Ordered`], burgers).
//! - [`Body::Dual`] -- two independent side slots that generic placement
//!   never fills; callers pick a side with [`Entity::add_to_side`].
//! - [`Body::Hybrid`] -- side slots plus a multi-stack list; rice goes to the
//!   sides, everything else to the list.
//!
//! # Placement is two-phase
//!
//! Stacking first *plans* where the incoming entity would land
//! ([`Entity::plan_stack`], [`Entity::plan_side`]) using only tags and the
//! current structure. Only a successful plan detaches the incoming entity
//! from its [`Registry`] and commits it, so a rejected placement never
//! leaves an entity half-moved.
//!
//! # Equality
//!
//! Entities compare structurally: tag, operation history, then body fields.
//! Order-insensitive lists and side slots are sorted before comparison.
//! The wing placeholder is the one exception, see [`Entity::wing_placeholder`].

use crate::compat;
use crate::geometry::Position;
use crate::id::{EntityId, PaintColor, ToppingId};
use crate::operation::Operation;
use crate::payload::{FluidCup, PaintLayers, SauceSet, Side, SidedToppings, UNPAINTED};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Concrete tags a wing placeholder stands in for.
pub const PLACEHOLDER_MATCHES: [EntityId; 2] = [EntityId::ChickenCutlet, EntityId::ChickenLeg];

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Non-stacking data of a single-stack entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Payload {
    Plain,
    Cup(FluidCup),
    PaintableCup { cup: FluidCup, colors: PaintLayers },
    ChaatDough(SauceSet),
    PizzaDough(SidedToppings),
}

/// Whether a multi-stack list is compared as a multiset or as a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StackOrder {
    Unordered,
    Ordered,
}

/// Two independently addressable child slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DualSlots {
    pub left: Option<Box<Entity>>,
    pub right: Option<Box<Entity>>,
}

impl DualSlots {
    pub fn get(&self, side: Side) -> Option<&Entity> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<Box<Entity>> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Occupants with empty slots first, then in structural order, so which
    /// side holds what does not matter.
    fn sorted(&self) -> [Option<&Entity>; 2] {
        let (a, b) = (self.left.as_deref(), self.right.as_deref());
        if cmp_optional(a, b) == Ordering::Greater {
            [b, a]
        } else {
            [a, b]
        }
    }

    fn eq_unsided(&self, other: &Self) -> bool {
        let [a0, a1] = self.sorted();
        let [b0, b1] = other.sorted();
        eq_optional(a0, b0) && eq_optional(a1, b1)
    }

    fn cmp_unsided(&self, other: &Self) -> Ordering {
        let [a0, a1] = self.sorted();
        let [b0, b1] = other.sorted();
        cmp_optional(a0, b0).then_with(|| cmp_optional(a1, b1))
    }
}

/// Stacking shape of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Body {
    Single {
        stack: Option<Box<Entity>>,
        payload: Payload,
    },
    Multi {
        children: Vec<Entity>,
        order: StackOrder,
    },
    Dual(DualSlots),
    Hybrid {
        slots: DualSlots,
        children: Vec<Entity>,
    },
}

impl Body {
    fn rank(&self) -> u8 {
        match self {
            Body::Single { .. } => 0,
            Body::Multi { .. } => 1,
            Body::Dual(_) => 2,
            Body::Hybrid { .. } => 3,
        }
    }

    fn eq_structural(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Body::Single { stack: a, payload: pa },
                Body::Single { stack: b, payload: pb },
            ) => eq_optional(a.as_deref(), b.as_deref()) && pa == pb,
            (
                Body::Multi { children: a, order: oa },
                Body::Multi { children: b, order: ob },
            ) => {
                oa == ob
                    && eq_sequence(&sorted_refs(a), &sorted_refs(b))
                    && (*oa == StackOrder::Unordered
                        || eq_sequence(&a.iter().collect::<Vec<_>>(), &b.iter().collect::<Vec<_>>()))
            }
            (Body::Dual(a), Body::Dual(b)) => a.eq_unsided(b),
            // Plates compare on their nigiri slots only; see `Entity::sushi_plate`.
            (Body::Hybrid { slots: sa, .. }, Body::Hybrid { slots: sb, .. }) => sa.eq_unsided(sb),
            _ => false,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Body::Single { stack: a, payload: pa },
                Body::Single { stack: b, payload: pb },
            ) => cmp_optional(a.as_deref(), b.as_deref()).then_with(|| pa.cmp(pb)),
            (
                Body::Multi { children: a, order: oa },
                Body::Multi { children: b, order: ob },
            ) => oa
                .cmp(ob)
                .then_with(|| cmp_sequence(&sorted_refs(a), &sorted_refs(b)))
                .then_with(|| match oa {
                    StackOrder::Unordered => Ordering::Equal,
                    StackOrder::Ordered => {
                        cmp_sequence(&a.iter().collect::<Vec<_>>(), &b.iter().collect::<Vec<_>>())
                    }
                }),
            (Body::Dual(a), Body::Dual(b)) => a.cmp_unsided(b),
            // Plates compare on their nigiri slots only; see `Entity::sushi_plate`.
            (Body::Hybrid { slots: sa, .. }, Body::Hybrid { slots: sb, .. }) => sa.cmp_unsided(sb),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// ---------------------------------------------------------------------------
// Placement plans
// ---------------------------------------------------------------------------

/// One step down from a container to the entity that will receive a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// Into the occupant of a single-stack slot.
    Stack,
    /// Into the occupant of a side slot.
    Side(Side),
}

/// Where the child is attached once the path has been walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The empty single-stack slot.
    Stack,
    /// The end of a multi-stack list.
    Append,
    /// An empty side slot.
    Side(Side),
}

/// A validated location for an incoming entity inside a container tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    path: Vec<Hop>,
    target: Target,
}

impl Placement {
    fn here(target: Target) -> Self {
        Self {
            path: Vec::new(),
            target,
        }
    }

    fn through(mut self, hop: Hop) -> Self {
        self.path.insert(0, hop);
        self
    }

    /// How many stacked entities the placement walks past.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn path(&self) -> &[Hop] {
        &self.path
    }

    pub fn target(&self) -> Target {
        self.target
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Something that rides on conveyors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    operations: Vec<Operation>,
    position: Position,
    body: Body,
}

impl Entity {
    fn with_body(id: EntityId, body: Body) -> Self {
        Self {
            id,
            operations: Vec::new(),
            position: Position::UNPLACED,
            body,
        }
    }

    fn single(id: EntityId, payload: Payload) -> Self {
        Self::with_body(id, Body::Single { stack: None, payload })
    }

    /// A plain single-stack entity.
    ///
    /// Panics for tags that only exist as a dedicated variant (cups, burgers,
    /// multitrays, nori, plates, wing placeholders).
    pub fn new(id: EntityId) -> Self {
        assert!(
            !id.requires_variant(),
            "{id:?} must be built with its dedicated constructor"
        );
        Self::single(id, Payload::Plain)
    }

    /// A tray that holds any number of items, compared as a multiset.
    pub fn multitray() -> Self {
        Self::with_body(
            EntityId::Multitray,
            Body::Multi {
                children: Vec::new(),
                order: StackOrder::Unordered,
            },
        )
    }

    /// A bun bottom whose toppings are stacked in a meaningful order.
    pub fn burger() -> Self {
        Self::with_body(
            EntityId::BunBottom,
            Body::Multi {
                children: Vec::new(),
                order: StackOrder::Ordered,
            },
        )
    }

    /// A cup holding up to `capacity` units of fluid.
    pub fn cup(capacity: u32) -> Self {
        Self::single(EntityId::Cup, Payload::Cup(FluidCup::new(capacity)))
    }

    /// A cup with three paintable layers, initially white.
    pub fn paintable_cup(capacity: u32) -> Self {
        Self::single(
            EntityId::Cup,
            Payload::PaintableCup {
                cup: FluidCup::new(capacity),
                colors: UNPAINTED,
            },
        )
    }

    /// Dough that takes one of each of the three chaat sauces.
    pub fn chaat_dough() -> Self {
        Self::single(EntityId::Dough, Payload::ChaatDough(SauceSet::new()))
    }

    /// Pizza dough with separate left and right toppings.
    pub fn pizza_dough() -> Self {
        Self::single(EntityId::Dough, Payload::PizzaDough(SidedToppings::new()))
    }

    /// Goal-only stand-in for "a cutlet or a leg".
    ///
    /// A placeholder equals a chicken cutlet or chicken leg whose history and
    /// stack match its own, ignoring the tag. The rule is symmetric
    /// (`leg == placeholder` iff `placeholder == leg`) but not reflexive:
    /// two placeholders never compare equal, and a placeholder that equals
    /// a leg still orders after it, since ordering ignores the rule. This
    /// mirrors how goal products have always been checked; use placeholders
    /// only on the goal side of a comparison.
    pub fn wing_placeholder() -> Self {
        Self::single(EntityId::WingPlaceholder, Payload::Plain)
    }

    /// Nori sheet with two independent rice slots.
    pub fn nori() -> Self {
        Self::with_body(EntityId::Nori, Body::Dual(DualSlots::default()))
    }

    /// Bowl with two independent slots for nigiri.
    pub fn sushi_bowl() -> Self {
        Self::with_body(EntityId::Bowl, Body::Dual(DualSlots::default()))
    }

    /// Plate with two nigiri slots and a list of maki.
    ///
    /// Equality and ordering look at the two slots only: the maki list is
    /// ignored, so plates that differ only in their maki compare equal. Goal
    /// products have always been checked this way. Snapshots still record
    /// the maki.
    pub fn sushi_plate() -> Self {
        Self::with_body(
            EntityId::Plate,
            Body::Hybrid {
                slots: DualSlots::default(),
                children: Vec::new(),
            },
        )
    }

    // -- Builders (goal and fixture construction, no compatibility checks) --

    pub fn with_operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(operations);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_stack(mut self, child: Entity) -> Self {
        match &mut self.body {
            Body::Single { stack, .. } => *stack = Some(Box::new(child)),
            _ => panic!("{:?} has no single stack slot", self.id),
        }
        self
    }

    pub fn with_children(mut self, new_children: impl IntoIterator<Item = Entity>) -> Self {
        match &mut self.body {
            Body::Multi { children, .. } | Body::Hybrid { children, .. } => {
                children.extend(new_children)
            }
            _ => panic!("{:?} has no multi-stack list", self.id),
        }
        self
    }

    pub fn with_side(mut self, side: Side, child: Entity) -> Self {
        match &mut self.body {
            Body::Dual(slots) | Body::Hybrid { slots, .. } => {
                *slots.slot_mut(side) = Some(Box::new(child))
            }
            _ => panic!("{:?} has no side slots", self.id),
        }
        self
    }

    pub fn with_fluids(mut self, fluids: impl IntoIterator<Item = (ToppingId, u32)>) -> Self {
        let id = self.id;
        let cup = self
            .fluids_mut()
            .unwrap_or_else(|| panic!("{id:?} does not hold fluids"));
        *cup = FluidCup::with_contents(cup.capacity(), fluids);
        self
    }

    pub fn with_sauces(mut self, sauces: impl IntoIterator<Item = ToppingId>) -> Self {
        let id = self.id;
        let set = self
            .sauces_mut()
            .unwrap_or_else(|| panic!("{id:?} does not take sauces"));
        *set = sauces.into_iter().collect();
        self
    }

    pub fn with_toppings(mut self, side: Side, toppings: impl IntoIterator<Item = ToppingId>) -> Self {
        let id = self.id;
        self.toppings_mut()
            .unwrap_or_else(|| panic!("{id:?} does not take toppings"))
            .side_mut(side)
            .extend(toppings);
        self
    }

    pub fn with_colors(mut self, layers: PaintLayers) -> Self {
        let id = self.id;
        *self
            .colors_mut()
            .unwrap_or_else(|| panic!("{id:?} is not paintable")) = layers;
        self
    }

    // -- Accessors --

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Record an operation. History only grows.
    pub fn push_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == EntityId::WingPlaceholder
    }

    /// Occupant of the single-stack slot.
    pub fn stack(&self) -> Option<&Entity> {
        match &self.body {
            Body::Single { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }

    /// Multi-stack list, in append order. Empty for other shapes.
    pub fn children(&self) -> &[Entity] {
        match &self.body {
            Body::Multi { children, .. } | Body::Hybrid { children, .. } => children,
            _ => &[],
        }
    }

    /// Occupant of a side slot, if this entity has side slots.
    pub fn side(&self, side: Side) -> Option<&Entity> {
        match &self.body {
            Body::Dual(slots) | Body::Hybrid { slots, .. } => slots.get(side),
            _ => None,
        }
    }

    /// Every directly attached child: stack, sides, then list.
    pub fn direct_children(&self) -> Vec<&Entity> {
        match &self.body {
            Body::Single { stack, .. } => stack.as_deref().into_iter().collect(),
            Body::Multi { children, .. } => children.iter().collect(),
            Body::Dual(slots) => [slots.left.as_deref(), slots.right.as_deref()]
                .into_iter()
                .flatten()
                .collect(),
            Body::Hybrid { slots, children } => [slots.left.as_deref(), slots.right.as_deref()]
                .into_iter()
                .flatten()
                .chain(children.iter())
                .collect(),
        }
    }

    /// Number of entities in this tree, including itself.
    pub fn count(&self) -> usize {
        1 + self
            .direct_children()
            .into_iter()
            .map(Entity::count)
            .sum::<usize>()
    }

    /// Height of this tree: 1 for an entity with nothing stacked on it.
    pub fn depth(&self) -> usize {
        1 + self
            .direct_children()
            .into_iter()
            .map(Entity::depth)
            .max()
            .unwrap_or(0)
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.body {
            Body::Single { payload, .. } => Some(payload),
            _ => None,
        }
    }

    fn payload_mut(&mut self) -> Option<&mut Payload> {
        match &mut self.body {
            Body::Single { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn fluids(&self) -> Option<&FluidCup> {
        match self.payload()? {
            Payload::Cup(cup) | Payload::PaintableCup { cup, .. } => Some(cup),
            _ => None,
        }
    }

    pub fn fluids_mut(&mut self) -> Option<&mut FluidCup> {
        match self.payload_mut()? {
            Payload::Cup(cup) | Payload::PaintableCup { cup, .. } => Some(cup),
            _ => None,
        }
    }

    pub fn sauces(&self) -> Option<&SauceSet> {
        match self.payload()? {
            Payload::ChaatDough(sauces) => Some(sauces),
            _ => None,
        }
    }

    pub fn sauces_mut(&mut self) -> Option<&mut SauceSet> {
        match self.payload_mut()? {
            Payload::ChaatDough(sauces) => Some(sauces),
            _ => None,
        }
    }

    pub fn toppings(&self) -> Option<&SidedToppings> {
        match self.payload()? {
            Payload::PizzaDough(toppings) => Some(toppings),
            _ => None,
        }
    }

    pub fn toppings_mut(&mut self) -> Option<&mut SidedToppings> {
        match self.payload_mut()? {
            Payload::PizzaDough(toppings) => Some(toppings),
            _ => None,
        }
    }

    pub fn colors(&self) -> Option<&PaintLayers> {
        match self.payload()? {
            Payload::PaintableCup { colors, .. } => Some(colors),
            _ => None,
        }
    }

    pub fn colors_mut(&mut self) -> Option<&mut [PaintColor; 3]> {
        match self.payload_mut()? {
            Payload::PaintableCup { colors, .. } => Some(colors),
            _ => None,
        }
    }

    // -- Placement --

    /// Whether this entity's tag accepts `child` at all.
    pub fn accepts(&self, child: EntityId) -> bool {
        compat::accepts(self.id, child)
    }

    /// Plan a generic placement of an entity tagged `incoming`.
    ///
    /// Returns `None` when the placement must fail: the tag is not accepted
    /// at some level of the stack, or the receiving entity only takes
    /// children through a chosen side.
    pub fn plan_stack(&self, incoming: EntityId) -> Option<Placement> {
        if !self.accepts(incoming) {
            trace!(container = ?self.id, ?incoming, "incompatible child");
            return None;
        }
        match &self.body {
            Body::Single { stack: None, .. } => Some(Placement::here(Target::Stack)),
            Body::Single {
                stack: Some(occupant),
                ..
            } => occupant
                .plan_stack(incoming)
                .map(|plan| plan.through(Hop::Stack)),
            Body::Multi { .. } => Some(Placement::here(Target::Append)),
            Body::Dual(_) => {
                trace!(container = ?self.id, ?incoming, "side slots need an explicit side");
                None
            }
            Body::Hybrid { .. } => {
                if compat::routes_to_sides(incoming) {
                    trace!(container = ?self.id, ?incoming, "side slots need an explicit side");
                    None
                } else {
                    Some(Placement::here(Target::Append))
                }
            }
        }
    }

    /// Plan a placement into one chosen side slot.
    ///
    /// An empty side takes the child directly; an occupied side hands the
    /// child to its occupant's generic placement. On a hybrid container only
    /// the side-routed tags are accepted here. Panics if this entity has no
    /// side slots.
    pub fn plan_side(&self, side: Side, incoming: EntityId) -> Option<Placement> {
        let (slots, hybrid) = match &self.body {
            Body::Dual(slots) => (slots, false),
            Body::Hybrid { slots, .. } => (slots, true),
            _ => panic!("{:?} has no side slots", self.id),
        };
        if !self.accepts(incoming) || (hybrid && !compat::routes_to_sides(incoming)) {
            trace!(container = ?self.id, ?incoming, ?side, "incompatible side child");
            return None;
        }
        match slots.get(side) {
            None => Some(Placement::here(Target::Side(side))),
            Some(occupant) => occupant
                .plan_stack(incoming)
                .map(|plan| plan.through(Hop::Side(side))),
        }
    }

    /// Stack the registry entity `other` onto this entity.
    ///
    /// On success `other` is detached from the registry and owned by this
    /// tree. On failure nothing changes and `error` is returned.
    ///
    /// Panics if `other` is not tracked by `registry`.
    pub fn add_to_stack<R, E>(&mut self, registry: &mut R, other: R::Key, error: E) -> Result<(), E>
    where
        R: Registry + ?Sized,
    {
        let incoming = tracked_tag(registry, other);
        let plan = self.plan_stack(incoming);
        self.place_planned(plan, registry, other, error)
    }

    /// Stack the registry entity `other` into the chosen side slot.
    ///
    /// Generic placement always fails on side slots; this is the only way
    /// to fill them. Panics if this entity has no side slots or `other` is
    /// not tracked by `registry`.
    pub fn add_to_side<R, E>(
        &mut self,
        side: Side,
        registry: &mut R,
        other: R::Key,
        error: E,
    ) -> Result<(), E>
    where
        R: Registry + ?Sized,
    {
        let incoming = tracked_tag(registry, other);
        let plan = self.plan_side(side, incoming);
        self.place_planned(plan, registry, other, error)
    }

    fn place_planned<R, E>(
        &mut self,
        plan: Option<Placement>,
        registry: &mut R,
        other: R::Key,
        error: E,
    ) -> Result<(), E>
    where
        R: Registry + ?Sized,
    {
        let Some(plan) = plan else {
            return Err(error);
        };
        let child = registry
            .detach(other)
            .unwrap_or_else(|| panic!("{other:?} vanished from the registry during placement"));
        debug!(container = ?self.id, child = ?child.id(), depth = plan.depth(), "stacked");
        self.commit(&plan, child);
        Ok(())
    }

    /// Attach an already detached `child` at a planned location.
    pub(crate) fn commit(&mut self, plan: &Placement, mut child: Entity) {
        child.position = Position::UNPLACED;
        self.commit_at(&plan.path, plan.target, child);
    }

    fn commit_at(&mut self, path: &[Hop], target: Target, child: Entity) {
        match path.split_first() {
            Some((hop, rest)) => self.hop_mut(*hop).commit_at(rest, target, child),
            None => self.attach(target, child),
        }
    }

    fn hop_mut(&mut self, hop: Hop) -> &mut Entity {
        let id = self.id;
        match (hop, &mut self.body) {
            (Hop::Stack, Body::Single { stack: Some(next), .. }) => next.as_mut(),
            (Hop::Side(side), Body::Dual(slots) | Body::Hybrid { slots, .. }) => {
                match slots.slot_mut(side) {
                    Some(next) => next.as_mut(),
                    None => panic!("placement walks into empty {side:?} slot of {id:?}"),
                }
            }
            (hop, _) => panic!("placement hop {hop:?} does not fit {id:?}"),
        }
    }

    fn attach(&mut self, target: Target, child: Entity) {
        let id = self.id;
        match (target, &mut self.body) {
            (Target::Stack, Body::Single { stack: slot @ None, .. }) => {
                *slot = Some(Box::new(child))
            }
            (Target::Append, Body::Multi { children, .. } | Body::Hybrid { children, .. }) => {
                children.push(child)
            }
            (Target::Side(side), Body::Dual(slots) | Body::Hybrid { slots, .. }) => {
                let slot = slots.slot_mut(side);
                assert!(slot.is_none(), "{side:?} slot of {id:?} is already occupied");
                *slot = Some(Box::new(child));
            }
            (target, _) => panic!("cannot attach to {id:?} at {target:?}"),
        }
    }

    // -- Comparison --

    /// Composite structural ordering: tag, history, then body fields.
    ///
    /// This is a total order used for sorting and snapshots. It does not
    /// apply the placeholder equality rule.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.operations.cmp(&other.operations))
            .then_with(|| self.body.total_cmp(&other.body))
    }

    fn eq_ignoring_tag(&self, other: &Self) -> bool {
        self.operations == other.operations && self.body.eq_structural(&other.body)
    }

    /// Rewrite this tree into its canonical form: order-insensitive lists
    /// sorted, side occupants sorted, zero fluid counts dropped, cup
    /// capacities cleared, and every nested position reset to
    /// [`Position::UNPLACED`]. Only the root keeps its position.
    ///
    /// Canonical trees that are equal serialize identically, except for the
    /// placeholder rule and the maki on plates. The result is meant for
    /// snapshots and comparison, not for further simulation: a cup that
    /// has lost its capacity accepts no more fluid.
    pub fn canonicalize(&mut self) {
        match &mut self.body {
            Body::Single { stack, payload } => {
                if let Some(child) = stack {
                    canonicalize_child(child);
                }
                match payload {
                    Payload::Cup(cup) | Payload::PaintableCup { cup, .. } => cup.canonicalize(),
                    _ => {}
                }
            }
            Body::Multi { children, order } => {
                children.iter_mut().for_each(canonicalize_child);
                if *order == StackOrder::Unordered {
                    children.sort_by(Entity::total_cmp);
                }
            }
            Body::Dual(slots) => canonicalize_slots(slots),
            Body::Hybrid { slots, children } => {
                canonicalize_slots(slots);
                children.iter_mut().for_each(canonicalize_child);
                children.sort_by(Entity::total_cmp);
            }
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_placeholder(), other.is_placeholder()) {
            (false, false) => self.id == other.id && self.eq_ignoring_tag(other),
            (true, false) => PLACEHOLDER_MATCHES.contains(&other.id) && self.eq_ignoring_tag(other),
            (false, true) => PLACEHOLDER_MATCHES.contains(&self.id) && other.eq_ignoring_tag(self),
            (true, true) => false,
        }
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tracked_tag<R: Registry + ?Sized>(registry: &R, key: R::Key) -> EntityId {
    registry
        .tag(key)
        .unwrap_or_else(|| panic!("{key:?} is not tracked at top level"))
}

fn canonicalize_child(child: &mut Entity) {
    child.position = Position::UNPLACED;
    child.canonicalize();
}

fn canonicalize_slots(slots: &mut DualSlots) {
    for child in [&mut slots.left, &mut slots.right].into_iter().flatten() {
        canonicalize_child(child);
    }
    if cmp_optional(slots.left.as_deref(), slots.right.as_deref()) == Ordering::Greater {
        std::mem::swap(&mut slots.left, &mut slots.right);
    }
}

fn sorted_refs(children: &[Entity]) -> Vec<&Entity> {
    let mut refs: Vec<&Entity> = children.iter().collect();
    refs.sort_by(|a, b| a.total_cmp(b));
    refs
}

fn eq_optional(a: Option<&Entity>, b: Option<&Entity>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn cmp_optional(a: Option<&Entity>, b: Option<&Entity>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(b),
    }
}

fn eq_sequence(a: &[&Entity], b: &[&Entity]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

fn cmp_sequence(a: &[&Entity], b: &[&Entity]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor::Floor;
    use crate::geometry::Position;

    fn spawn(floor: &mut Floor, entity: Entity) -> crate::id::EntityKey {
        floor.spawn(entity, Position::new(0, 0)).unwrap()
    }

    #[test]
    #[should_panic(expected = "dedicated constructor")]
    fn plain_cup_is_rejected() {
        let _ = Entity::new(EntityId::Cup);
    }

    #[test]
    fn new_entity_is_unplaced_and_empty() {
        let e = Entity::new(EntityId::Nacho);
        assert_eq!(e.id(), EntityId::Nacho);
        assert!(e.operations().is_empty());
        assert!(!e.position().is_placed());
        assert!(e.stack().is_none());
        assert_eq!(e.count(), 1);
    }

    #[test]
    fn plan_on_empty_slot() {
        let tray = Entity::new(EntityId::Tray);
        let plan = tray.plan_stack(EntityId::Nacho).unwrap();
        assert_eq!(plan.depth(), 0);
        assert_eq!(plan.target(), Target::Stack);
    }

    #[test]
    fn plan_walks_up_existing_stack() {
        let bun = Entity::new(EntityId::Bun).with_stack(Entity::new(EntityId::Meat));
        let plan = bun.plan_stack(EntityId::Cheese).unwrap();
        assert_eq!(plan.path(), &[Hop::Stack]);
        assert_eq!(plan.target(), Target::Stack);
    }

    #[test]
    fn plan_fails_when_occupant_rejects() {
        // Trays take cups, but cups do not take nachos.
        let tray = Entity::new(EntityId::Tray).with_stack(Entity::cup(2));
        assert!(tray.plan_stack(EntityId::Nacho).is_none());
        assert!(tray.plan_stack(EntityId::Lid).is_none());
    }

    #[test]
    fn plan_checks_every_level() {
        let tray = Entity::new(EntityId::Tray).with_stack(Entity::cup(2));
        // Ice is excluded from trays, so the tray rejects it before the cup is asked.
        assert!(tray.plan_stack(EntityId::Ice).is_none());
        let tray = Entity::new(EntityId::Tray).with_stack(Entity::new(EntityId::Bun));
        assert_eq!(tray.plan_stack(EntityId::Meat).unwrap().depth(), 1);
    }

    #[test]
    fn multi_stack_always_appends() {
        let tray = Entity::multitray().with_children([Entity::new(EntityId::Nacho)]);
        let plan = tray.plan_stack(EntityId::Pretzel).unwrap();
        assert_eq!(plan.target(), Target::Append);
        assert_eq!(plan.depth(), 0);
    }

    #[test]
    fn dual_slots_reject_generic_placement() {
        assert!(Entity::nori().plan_stack(EntityId::Rice).is_none());
        assert!(Entity::sushi_bowl().plan_stack(EntityId::Rice).is_none());
    }

    #[test]
    fn hybrid_routes_by_tag() {
        let plate = Entity::sushi_plate();
        assert!(plate.plan_stack(EntityId::Rice).is_none());
        assert_eq!(plate.plan_stack(EntityId::TunaMaki).unwrap().target(), Target::Append);
        assert_eq!(
            plate.plan_side(Side::Left, EntityId::Rice).unwrap().target(),
            Target::Side(Side::Left)
        );
        assert!(plate.plan_side(Side::Left, EntityId::TunaMaki).is_none());
    }

    #[test]
    fn side_plan_recurses_into_occupant() {
        let nori = Entity::nori().with_side(Side::Right, Entity::new(EntityId::Rice));
        let plan = nori.plan_side(Side::Right, EntityId::Tuna);
        // Nori does not accept fish directly.
        assert!(plan.is_none());

        let bowl = Entity::sushi_bowl().with_side(Side::Left, Entity::new(EntityId::Rice));
        let plan = bowl.plan_side(Side::Left, EntityId::Rice);
        // Rice does not take rice.
        assert!(plan.is_none());
    }

    #[test]
    #[should_panic(expected = "has no side slots")]
    fn side_plan_on_single_stack_panics() {
        let _ = Entity::new(EntityId::Tray).plan_side(Side::Left, EntityId::Nacho);
    }

    #[test]
    fn add_to_stack_detaches_from_registry() {
        let mut floor = Floor::default();
        let fries = spawn(&mut floor, Entity::new(EntityId::Curly));
        let mut tray = Entity::new(EntityId::Tray);
        assert_eq!(tray.add_to_stack(&mut floor, fries, "occupied"), Ok(()));
        assert!(floor.get(fries).is_none());
        assert_eq!(tray.stack().map(Entity::id), Some(EntityId::Curly));
        assert!(!tray.stack().unwrap().position().is_placed());
    }

    #[test]
    fn failed_add_leaves_everything_in_place() {
        let mut floor = Floor::default();
        let lid = spawn(&mut floor, Entity::new(EntityId::Lid));
        let mut tray = Entity::new(EntityId::Tray);
        assert_eq!(tray.add_to_stack(&mut floor, lid, "wrong"), Err("wrong"));
        assert!(floor.get(lid).is_some());
        assert!(tray.stack().is_none());
    }

    #[test]
    fn add_to_side_fills_one_side() {
        let mut floor = Floor::default();
        let rice = spawn(&mut floor, Entity::new(EntityId::Rice));
        let mut nori = Entity::nori();
        assert_eq!(nori.add_to_side(Side::Left, &mut floor, rice, ()), Ok(()));
        assert_eq!(nori.side(Side::Left).map(Entity::id), Some(EntityId::Rice));
        assert!(nori.side(Side::Right).is_none());
        assert!(floor.is_empty());
    }

    #[test]
    fn bowl_side_rejects_fish_even_over_rice() {
        let mut floor = Floor::default();
        let tuna = spawn(&mut floor, Entity::new(EntityId::Tuna));
        let mut bowl = Entity::sushi_bowl().with_side(Side::Left, Entity::new(EntityId::Rice));
        assert_eq!(bowl.add_to_side(Side::Left, &mut floor, tuna, "wrong"), Err("wrong"));
        assert!(bowl.side(Side::Left).unwrap().stack().is_none());
        assert!(floor.get(tuna).is_some());
    }

    #[test]
    fn occupied_side_rejects_second_rice() {
        let mut floor = Floor::default();
        let rice = spawn(&mut floor, Entity::new(EntityId::Rice));
        let mut plate = Entity::sushi_plate().with_side(Side::Right, Entity::new(EntityId::Rice));
        assert_eq!(plate.add_to_side(Side::Right, &mut floor, rice, "full"), Err("full"));
        assert_eq!(plate.add_to_side(Side::Left, &mut floor, rice, "full"), Ok(()));
        assert_eq!(plate.count(), 3);
    }

    #[test]
    fn structural_equality_covers_history() {
        let a = Entity::new(EntityId::Meat).with_operations(Operation::CookGrill.repeat(4));
        let b = Entity::new(EntityId::Meat).with_operations(Operation::CookGrill.repeat(4));
        let c = Entity::new(EntityId::Meat).with_operations(Operation::CookGrill.repeat(3));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(c < a);
    }

    #[test]
    fn position_is_not_part_of_equality() {
        let a = Entity::new(EntityId::Nacho).with_position(Position::new(1, 1));
        let b = Entity::new(EntityId::Nacho);
        assert_eq!(a, b);
        assert_eq!(a.total_cmp(&b), Ordering::Equal);
    }

    #[test]
    fn side_placement_is_irrelevant_to_equality() {
        let nigiri = || Entity::new(EntityId::Rice).with_stack(Entity::new(EntityId::Tuna));
        let left = Entity::sushi_bowl().with_side(Side::Left, nigiri());
        let right = Entity::sushi_bowl().with_side(Side::Right, nigiri());
        assert_eq!(left, right);
        assert_eq!(left.total_cmp(&right), Ordering::Equal);
        assert_ne!(left, Entity::sushi_bowl());
        assert!(Entity::sushi_bowl() < left);
    }

    #[test]
    fn plate_comparison_ignores_maki() {
        let tuna = Entity::sushi_plate().with_children(vec![Entity::new(EntityId::TunaMaki); 4]);
        let salmon = Entity::sushi_plate().with_children(vec![Entity::new(EntityId::SalmonMaki); 4]);
        assert_eq!(tuna, salmon);
        assert_eq!(tuna.total_cmp(&salmon), Ordering::Equal);
        assert_eq!(tuna, Entity::sushi_plate());

        let nigiri = Entity::new(EntityId::Rice).with_stack(Entity::new(EntityId::Salmon));
        let with_nigiri = Entity::sushi_plate().with_side(Side::Right, nigiri);
        assert_ne!(tuna, with_nigiri);
        assert!(tuna < with_nigiri);
    }

    #[test]
    fn canonical_form_clears_nested_positions() {
        let mut tray = Entity::new(EntityId::Tray)
            .with_position(Position::new(2, 3))
            .with_stack(Entity::new(EntityId::Cone).with_position(Position::new(1, 1)));
        tray.canonicalize();
        assert_eq!(tray.position(), Position::new(2, 3));
        assert!(!tray.stack().unwrap().position().is_placed());

        let mut plate = Entity::sushi_plate()
            .with_side(Side::Left, Entity::new(EntityId::Rice).with_position(Position::new(0, 4)))
            .with_children([Entity::new(EntityId::TunaMaki).with_position(Position::new(3, 0))]);
        plate.canonicalize();
        assert!(plate.direct_children().iter().all(|c| !c.position().is_placed()));
    }

    #[test]
    fn canonical_form_clears_cup_capacity() {
        let mut cup = Entity::cup(5).with_fluids([(ToppingId::Cola, 2)]);
        cup.canonicalize();
        assert_eq!(cup.fluids().unwrap().capacity(), 0);
        assert_eq!(cup, Entity::cup(0).with_fluids([(ToppingId::Cola, 2)]));
    }

    #[test]
    fn paintable_cup_differs_from_cup() {
        let painted = Entity::paintable_cup(2);
        assert_eq!(painted.colors(), Some(&UNPAINTED));
        assert_ne!(painted, Entity::cup(2));
        assert_eq!(Entity::cup(2), Entity::cup(5));
    }

    #[test]
    fn canonical_form_sorts_unordered_parts() {
        let mut a = Entity::multitray().with_children([
            Entity::new(EntityId::Pretzel),
            Entity::new(EntityId::Nacho),
        ]);
        a.canonicalize();
        let ids: Vec<_> = a.children().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![EntityId::Nacho, EntityId::Pretzel]);

        let mut burger = Entity::burger().with_children([
            Entity::new(EntityId::Cheese),
            Entity::new(EntityId::Meat),
        ]);
        burger.canonicalize();
        assert_eq!(burger.children()[0].id(), EntityId::Cheese);

        // Empty slots sort first.
        let mut bowl = Entity::sushi_bowl().with_side(Side::Left, Entity::new(EntityId::Rice));
        bowl.canonicalize();
        assert!(bowl.side(Side::Left).is_none());
        assert!(bowl.side(Side::Right).is_some());
    }
}
