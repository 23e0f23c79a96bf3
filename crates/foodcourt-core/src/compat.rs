//! Static compatibility table: which child tags a container tag accepts.
//!
//! This is the single source of truth for "can X sit on Y". It mirrors the
//! game's recipes exactly, including the tray exclusion list, and must be
//! kept in lockstep with [`EntityId`].

use crate::id::EntityId;

/// Tags a tray or multitray never accepts, grouped by the restaurant that
/// needs them kept off trays.
pub const TRAY_EXCLUSIONS: [EntityId; 19] = [
    EntityId::Lid,          // soda trench, belly's
    EntityId::Roast,        // sweet heat bbq
    EntityId::Ribs,         // sweet heat bbq
    EntityId::Ice,          // the walrus
    EntityId::Paper,        // cafe triste
    EntityId::Cigarette4x,  // cafe triste
    EntityId::Cigarette2x,  // cafe triste
    EntityId::Potato,       // belly's
    EntityId::Onion,        // belly's
    EntityId::Nori,         // sushi yeah!
    EntityId::Rice,         // sushi yeah!
    EntityId::Tuna,         // sushi yeah!
    EntityId::Salmon,       // sushi yeah!
    EntityId::TunaMaki4x,   // sushi yeah!
    EntityId::TunaMaki2x,   // sushi yeah!
    EntityId::TunaMaki,     // sushi yeah!
    EntityId::SalmonMaki4x, // sushi yeah!
    EntityId::SalmonMaki2x, // sushi yeah!
    EntityId::SalmonMaki,   // sushi yeah!
];

/// Burger parts. Each of them accepts every other part.
pub const BURGER_PARTS: [EntityId; 7] = [
    EntityId::Bun,
    EntityId::BunBottom,
    EntityId::BunTop,
    EntityId::Meat,
    EntityId::Cheese,
    EntityId::Pickle,
    EntityId::Tomato,
];

/// Whether a container tagged `container` accepts a child tagged `child`.
pub fn accepts(container: EntityId, child: EntityId) -> bool {
    use EntityId::*;
    match container {
        Tray | Multitray => !TRAY_EXCLUSIONS.contains(&child),
        Cup => matches!(child, Lid | Ice | Potato | Onion),
        Bun | BunBottom | BunTop | Meat | Cheese | Pickle | Tomato => BURGER_PARTS.contains(&child),
        Nori => child == Rice,
        Rice => matches!(child, Tuna | Salmon),
        Bowl => child == Rice,
        Plate => matches!(child, TunaMaki | SalmonMaki | Rice),
        _ => false,
    }
}

/// All tags `container` accepts, in tag order.
pub fn accepted_children(container: EntityId) -> impl Iterator<Item = EntityId> {
    EntityId::ALL
        .into_iter()
        .filter(move |&child| accepts(container, child))
}

/// Whether a hybrid container routes `child` to its two side slots instead
/// of its multi-stack list.
pub fn routes_to_sides(child: EntityId) -> bool {
    child == EntityId::Rice
}
