//! Deterministic binary snapshots of a set of top-level entities.
//!
//! Snapshots are written in canonical form: every tree is canonicalized and
//! the entities are sorted, so two states that hold the same entities at the
//! same positions encode to the same bytes regardless of how they were
//! built. That makes the bytes (and [`state_hash`]) usable for regression
//! comparison.
//!
//! Two comparison rules do not carry over to the bytes: a wing placeholder
//! encodes under its own tag, and a plate's maki are recorded even though
//! plates compare on their nigiri slots only.

use crate::entity::Entity;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an entity snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xF00D_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Prepended to every snapshot so the format can be checked before the
/// entities are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
}

impl SnapshotHeader {
    pub fn new() -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    header: SnapshotHeader,
    entities: Vec<Entity>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Canonical copies of `entities`, sorted structurally and then by position.
pub fn canonical_state<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Vec<Entity> {
    let mut state: Vec<Entity> = entities
        .into_iter()
        .map(|entity| {
            let mut entity = entity.clone();
            entity.canonicalize();
            entity
        })
        .collect();
    state.sort_by(|a, b| a.total_cmp(b).then_with(|| a.position().cmp(&b.position())));
    state
}

pub fn encode_state<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
) -> Result<Vec<u8>, SerializeError> {
    let snapshot = Snapshot {
        header: SnapshotHeader::new(),
        entities: canonical_state(entities),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot written by [`encode_state`]. Entities come back in
/// canonical order.
pub fn decode_state(data: &[u8]) -> Result<Vec<Entity>, DeserializeError> {
    let snapshot: Snapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot.entities)
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) over snapshot bytes. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of the canonical encoding of `entities`.
pub fn state_hash<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
) -> Result<StateHash, SerializeError> {
    let bytes = encode_state(entities)?;
    let mut hash = StateHash::new();
    hash.write(&bytes);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use crate::id::{EntityId, ToppingId};
    use crate::operation::Operation;

    fn tray_of(ids: &[EntityId]) -> Entity {
        Entity::multitray().with_children(ids.iter().map(|&id| Entity::new(id)))
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new().validate().is_ok());
        let bad_magic = SnapshotHeader { magic: 0, version: FORMAT_VERSION };
        assert!(matches!(bad_magic.validate(), Err(DeserializeError::InvalidMagic(0))));
        let future = SnapshotHeader { magic: SNAPSHOT_MAGIC, version: FORMAT_VERSION + 1 };
        assert!(matches!(future.validate(), Err(DeserializeError::FutureVersion(_))));
        let old = SnapshotHeader { magic: SNAPSHOT_MAGIC, version: 0 };
        assert!(matches!(old.validate(), Err(DeserializeError::UnsupportedVersion(0))));
    }

    #[test]
    fn permuted_multitrays_encode_identically() {
        let a = tray_of(&[EntityId::Nacho, EntityId::Pretzel, EntityId::Cone]);
        let b = tray_of(&[EntityId::Cone, EntityId::Nacho, EntityId::Pretzel]);
        assert_eq!(a, b);
        assert_eq!(encode_state([&a]).unwrap(), encode_state([&b]).unwrap());
        assert_eq!(state_hash([&a]).unwrap(), state_hash([&b]).unwrap());
    }

    #[test]
    fn entity_order_does_not_matter() {
        let a = Entity::new(EntityId::Nacho).with_position(Position::new(0, 0));
        let b = Entity::new(EntityId::Pretzel).with_position(Position::new(1, 0));
        assert_eq!(encode_state([&a, &b]).unwrap(), encode_state([&b, &a]).unwrap());
    }

    #[test]
    fn burger_order_is_kept() {
        let a = Entity::burger()
            .with_children([Entity::new(EntityId::Meat), Entity::new(EntityId::Cheese)]);
        let b = Entity::burger()
            .with_children([Entity::new(EntityId::Cheese), Entity::new(EntityId::Meat)]);
        assert_ne!(state_hash([&a]).unwrap(), state_hash([&b]).unwrap());
    }

    #[test]
    fn round_trip_returns_canonical_entities() {
        let cooked = Entity::new(EntityId::Meat).with_operations([Operation::CookGrill]);
        let tray = tray_of(&[EntityId::Pretzel, EntityId::Nacho]).with_position(Position::new(2, 4));
        let bytes = encode_state([&tray, &cooked]).unwrap();
        let decoded = decode_state(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded, canonical_state([&tray, &cooked]));
        let back = decoded.iter().find(|e| e.id() == EntityId::Multitray).unwrap();
        assert_eq!(back.position(), Position::new(2, 4));
        assert_eq!(back.children()[0].id(), EntityId::Nacho);
    }

    #[test]
    fn cup_capacity_is_not_encoded() {
        let goal = Entity::cup(0).with_fluids([(ToppingId::Cola, 2)]);
        let built = Entity::cup(5).with_fluids([(ToppingId::Cola, 2)]);
        assert_eq!(goal, built);
        assert_eq!(encode_state([&goal]).unwrap(), encode_state([&built]).unwrap());
        assert_eq!(state_hash([&Entity::cup(2)]).unwrap(), state_hash([&Entity::cup(5)]).unwrap());
    }

    #[test]
    fn nested_positions_are_not_encoded() {
        let stale = Entity::new(EntityId::Tray)
            .with_stack(Entity::new(EntityId::Cone).with_position(Position::new(1, 1)));
        let fresh = Entity::new(EntityId::Tray).with_stack(Entity::new(EntityId::Cone));
        assert_eq!(stale, fresh);
        assert_eq!(encode_state([&stale]).unwrap(), encode_state([&fresh]).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_state(&[1, 2, 3]), Err(DeserializeError::Decode(_))));
    }

    #[test]
    fn fnv_reference_value() {
        let mut hash = StateHash::new();
        hash.write(b"a");
        assert_eq!(hash.finish(), 0xaf63dc4c8601ec8c);
    }
}
