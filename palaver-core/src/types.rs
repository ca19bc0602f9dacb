//! Core type definitions shared by every Palaver crate.
//!
//! All types are serializable so they can cross the persistence boundary
//! without adapter structs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Opaque identifier for a player or NPC, stable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Reserved identity under which the shared server-wide history is kept.
    pub const SERVER: Self = Self(Uuid::nil());

    /// Create a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ID from its hyphenated string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a village produced by the clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VillageId(pub Uuid);

impl VillageId {
    /// Allocate a fresh village ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VillageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VillageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A world partition (dimension, level, shard). Distances are only
/// meaningful between locations in the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub String);

impl PartitionId {
    /// Construct a partition ID from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 3D position in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Location {
    /// Create a location from coordinates.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance to `other`.
    #[must_use]
    pub fn distance_squared(&self, other: &Location) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Where an NPC currently stands, as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcPosition {
    /// The NPC.
    pub id: EntityId,
    /// The partition it is in.
    pub partition: PartitionId,
    /// Its position inside that partition.
    pub location: Location,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Authoritative simulation tick counter.
pub type Tick = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_identity_is_nil_and_stable() {
        assert_eq!(EntityId::SERVER.0, Uuid::nil());
        assert_ne!(EntityId::new(), EntityId::SERVER);
    }

    #[test]
    fn entity_id_parse_round_trip() {
        let id = EntityId::new();
        assert_eq!(EntityId::parse(&id.to_string()), Some(id));
        assert_eq!(EntityId::parse("not-a-uuid"), None);
    }

    #[test]
    fn distance_squared_is_symmetric() {
        let a = Location::new(0.0, 0.0, 0.0);
        let b = Location::new(3.0, 4.0, 0.0);
        assert!((a.distance_squared(&b) - 25.0).abs() < f32::EPSILON);
        assert!((b.distance_squared(&a) - 25.0).abs() < f32::EPSILON);
    }
}
