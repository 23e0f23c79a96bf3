use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a top-level entity tracked by the floor registry.
    ///
    /// Keys compare by identity: two structurally identical entities spawned
    /// separately always get distinct keys.
    pub struct EntityKey;
}

/// Identity tag of an entity. Declaration order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Tray,
    Multitray,

    Nacho,
    Pretzel,

    Pocket,

    Glass,

    Dough,

    Cone,

    Pelmeni,

    Cup,
    Lid,

    Chicken,
    ChickenHalf,
    ChickenCutlet,
    ChickenLeg,

    WingPlaceholder,

    Roast,
    RoastSlice,
    Ribs,
    RibsSlice,

    Ice,

    Meat,
    Bowl,

    Paper,
    Cigarette4x,
    Cigarette2x,
    Cigarette,

    Pizza,
    Burger,
    Tender,
    Corndog,
    Curly,
    Crinkle,
    Tot,
    Plain,
    Choco,

    Bun,
    BunTop,
    BunBottom,
    Cheese,
    Pickle,
    Tomato,

    Egg,
    Bacon,
    Banger,
    Fungus,
    Black,
    Bread,

    Potato,
    Onion,

    Nori,
    Rice,
    Tuna,
    Salmon,
    Plate,
    TunaMaki4x,
    TunaMaki2x,
    TunaMaki,
    SalmonMaki4x,
    SalmonMaki2x,
    SalmonMaki,
}

impl EntityId {
    /// Every tag, in declaration order.
    pub const ALL: [EntityId; 61] = [
        EntityId::Tray,
        EntityId::Multitray,
        EntityId::Nacho,
        EntityId::Pretzel,
        EntityId::Pocket,
        EntityId::Glass,
        EntityId::Dough,
        EntityId::Cone,
        EntityId::Pelmeni,
        EntityId::Cup,
        EntityId::Lid,
        EntityId::Chicken,
        EntityId::ChickenHalf,
        EntityId::ChickenCutlet,
        EntityId::ChickenLeg,
        EntityId::WingPlaceholder,
        EntityId::Roast,
        EntityId::RoastSlice,
        EntityId::Ribs,
        EntityId::RibsSlice,
        EntityId::Ice,
        EntityId::Meat,
        EntityId::Bowl,
        EntityId::Paper,
        EntityId::Cigarette4x,
        EntityId::Cigarette2x,
        EntityId::Cigarette,
        EntityId::Pizza,
        EntityId::Burger,
        EntityId::Tender,
        EntityId::Corndog,
        EntityId::Curly,
        EntityId::Crinkle,
        EntityId::Tot,
        EntityId::Plain,
        EntityId::Choco,
        EntityId::Bun,
        EntityId::BunTop,
        EntityId::BunBottom,
        EntityId::Cheese,
        EntityId::Pickle,
        EntityId::Tomato,
        EntityId::Egg,
        EntityId::Bacon,
        EntityId::Banger,
        EntityId::Fungus,
        EntityId::Black,
        EntityId::Bread,
        EntityId::Potato,
        EntityId::Onion,
        EntityId::Nori,
        EntityId::Rice,
        EntityId::Tuna,
        EntityId::Salmon,
        EntityId::Plate,
        EntityId::TunaMaki4x,
        EntityId::TunaMaki2x,
        EntityId::TunaMaki,
        EntityId::SalmonMaki4x,
        EntityId::SalmonMaki2x,
        EntityId::SalmonMaki,
    ];

    /// Tags that only exist as a dedicated entity variant and must never be
    /// built as a plain single-stack entity.
    pub const fn requires_variant(self) -> bool {
        matches!(
            self,
            EntityId::Multitray
                | EntityId::Cup
                | EntityId::WingPlaceholder
                | EntityId::BunBottom
                | EntityId::Nori
                | EntityId::Plate
        )
    }
}

/// Topping, fluid, and sauce tags. Declaration order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ToppingId {
    Cheese,

    Red,
    White,

    Tomato,
    Mint,
    Yogurt,

    Choco,
    Vanilla,

    Cola,

    Berry,
    Candy,

    Breading,

    Vodka,
    Whisky,
    Lemon,

    Mac,
    Slaw,
    Greens,
    Beans,

    Leaves,
    Coffee,

    Sauce,

    Meat,
    Veggie,

    Milk,
    Water,
    Foam,

    Orange,
    Purple,

    Soup,
}

/// Paint applied to a paintable cup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PaintColor {
    Red,
    #[default]
    White,
    Blue,
}
