//! Operation history entries recorded on entities by machines.

use crate::id::ToppingId;
use serde::{Deserialize, Serialize};

/// One action a machine performed on an entity.
///
/// Ordering follows the operation kind first, then the topping payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    CookFryer,
    CookMicrowave,
    CookGrill,
    Dock,
    Flatten,
    DispenseFluid(ToppingId),
    /// Two different fluids dispensed together. The lower tag is always first;
    /// build with [`Operation::dispense_fluid_mixed`].
    DispenseFluidMixed(ToppingId, ToppingId),
    CoatFluid(ToppingId),
    DispenseTopping(ToppingId),
}

impl Operation {
    /// Mixed dispense, normalized so the argument order does not matter.
    pub fn dispense_fluid_mixed(a: ToppingId, b: ToppingId) -> Self {
        assert_ne!(a, b, "mixed dispense needs two different fluids");
        if a < b {
            Operation::DispenseFluidMixed(a, b)
        } else {
            Operation::DispenseFluidMixed(b, a)
        }
    }

    /// `count` copies of the same operation, as cooking machines record one
    /// entry per tick.
    pub fn repeat(self, count: usize) -> Vec<Operation> {
        vec![self; count]
    }
}
