//! Non-stacking data carried by specialized entities: fluids, sauces,
//! toppings, and paint layers.
//!
//! Guarded mutators take a caller-supplied failure value and return it as
//! `Err` when a game rule is broken. Misuse that can only come from a bug in
//! the calling layer (removing a fluid that is not there, an unknown sauce)
//! panics instead.

use crate::id::{PaintColor, ToppingId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Selects one half of a two-sided entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

// ---------------------------------------------------------------------------
// FluidCup
// ---------------------------------------------------------------------------

/// Unordered fluid contents with a capacity counted in units, not kinds.
///
/// Only strictly positive counts take part in comparisons, and the capacity
/// does not take part at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FluidCup {
    contents: BTreeMap<ToppingId, u32>,
    capacity: u32,
}

impl FluidCup {
    pub fn new(capacity: u32) -> Self {
        Self {
            contents: BTreeMap::new(),
            capacity,
        }
    }

    /// Build a cup with preset contents, e.g. for goal products. The capacity
    /// is not checked against the contents.
    pub fn with_contents(capacity: u32, contents: impl IntoIterator<Item = (ToppingId, u32)>) -> Self {
        let mut cup = Self::new(capacity);
        for (fluid, count) in contents {
            let entry = cup.contents.entry(fluid).or_insert(0);
            *entry = entry.saturating_add(count);
        }
        cup
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units of `fluid` in the cup.
    pub fn count(&self, fluid: ToppingId) -> u32 {
        self.contents.get(&fluid).copied().unwrap_or(0)
    }

    /// Total units across all fluids.
    pub fn total(&self) -> u32 {
        self.contents
            .values()
            .fold(0u32, |total, &count| total.saturating_add(count))
    }

    pub fn is_full(&self) -> bool {
        self.total() >= self.capacity
    }

    /// Fluids with a positive count, in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (ToppingId, u32)> + '_ {
        self.contents
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(fluid, count)| (*fluid, *count))
    }

    /// Pour one unit of `fluid`. Fails with `error` once the cup is full.
    pub fn add<E>(&mut self, fluid: ToppingId, error: E) -> Result<(), E> {
        if self.is_full() {
            return Err(error);
        }
        *self.contents.entry(fluid).or_insert(0) += 1;
        Ok(())
    }

    /// Take one unit of `fluid` out. The fluid must be present.
    pub fn remove(&mut self, fluid: ToppingId) {
        let count = self
            .contents
            .get_mut(&fluid)
            .filter(|count| **count > 0)
            .unwrap_or_else(|| panic!("removing {fluid:?} from a cup that does not contain it"));
        *count -= 1;
        if *count == 0 {
            self.contents.remove(&fluid);
        }
    }

    /// Drop zero-count entries.
    pub fn normalize(&mut self) {
        self.contents.retain(|_, count| *count > 0);
    }

    /// Comparison form: zero counts dropped and capacity cleared, since
    /// capacity never takes part in equality.
    pub fn canonicalize(&mut self) {
        self.normalize();
        self.capacity = 0;
    }
}

impl PartialEq for FluidCup {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for FluidCup {}

impl PartialOrd for FluidCup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FluidCup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

// ---------------------------------------------------------------------------
// SauceSet
// ---------------------------------------------------------------------------

/// The three sauces a chaat dough can receive.
pub const SAUCES: [ToppingId; 3] = [ToppingId::Tomato, ToppingId::Mint, ToppingId::Yogurt];

/// At most one of each sauce.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SauceSet(BTreeSet<ToppingId>);

impl SauceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sauce`. A second helping of the same sauce fails with `error`.
    pub fn add<E>(&mut self, sauce: ToppingId, error: E) -> Result<(), E> {
        assert!(SAUCES.contains(&sauce), "{sauce:?} is not a sauce");
        if self.0.contains(&sauce) {
            return Err(error);
        }
        self.0.insert(sauce);
        Ok(())
    }

    pub fn contains(&self, sauce: ToppingId) -> bool {
        self.0.contains(&sauce)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ToppingId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ToppingId> for SauceSet {
    fn from_iter<I: IntoIterator<Item = ToppingId>>(iter: I) -> Self {
        let set: BTreeSet<ToppingId> = iter.into_iter().collect();
        assert!(set.iter().all(|s| SAUCES.contains(s)), "sauce set holds a non-sauce topping");
        Self(set)
    }
}

// ---------------------------------------------------------------------------
// SidedToppings
// ---------------------------------------------------------------------------

/// Independent topping sets for the two halves of a pizza. Unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SidedToppings {
    pub left: BTreeSet<ToppingId>,
    pub right: BTreeSet<ToppingId>,
}

impl SidedToppings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self, side: Side) -> &BTreeSet<ToppingId> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BTreeSet<ToppingId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Add to both halves at once.
    pub fn add_both(&mut self, topping: ToppingId) {
        self.left.insert(topping);
        self.right.insert(topping);
    }

    /// Exchange the halves, as a rotated pizza does.
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

// ---------------------------------------------------------------------------
// PaintLayers
// ---------------------------------------------------------------------------

/// Paint colors of a cup, top to bottom.
pub type PaintLayers = [PaintColor; 3];

/// Fresh, unpainted layers.
pub const UNPAINTED: PaintLayers = [PaintColor::White; 3];

/// Paint the layers in `range` (top is index 0).
pub fn paint(layers: &mut PaintLayers, range: std::ops::Range<usize>, color: PaintColor) {
    for layer in &mut layers[range] {
        *layer = color;
    }
}
