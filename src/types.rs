//! Core construction types shared across all modules.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Globally unique, immutable identifier of a constructed piece.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PieceId(pub String);

impl PieceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PieceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a multi-piece structure container (base, vehicle bay …).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StructureId(pub String);

impl StructureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for StructureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External item-type identifier. Opaque to this crate – the simulation's
/// catalog decides what it instantiates.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CatalogId(pub String);

impl CatalogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a connected player on the server side.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Position + orientation pair, enough to reproduce a placement on a remote
/// peer deterministically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::identity())
    }
}

// ---------------------------------------------------------------------------
// Piece classification
// ---------------------------------------------------------------------------

/// Closed classification of constructible pieces.
///
/// Structural pieces are cells of a larger structure and can be built upon;
/// furniture is self-contained and merely attached to a structure. All
/// behavioral differences dispatch on this enum.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Structural,
    Furniture,
}

impl PieceKind {
    pub fn is_furniture(self) -> bool {
        matches!(self, PieceKind::Furniture)
    }
}

/// Reference to the structure a piece belongs to.
///
/// The very first piece of a brand-new structure has no stable structure
/// identifier until the server resolves one, so "no owner yet" is a real
/// state rather than an empty string.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureRef {
    Known(StructureId),
    PendingCreation,
}

impl StructureRef {
    pub fn known(&self) -> Option<&StructureId> {
        match self {
            StructureRef::Known(id) => Some(id),
            StructureRef::PendingCreation => None,
        }
    }
}

impl std::fmt::Display for StructureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureRef::Known(id) => write!(f, "{id}"),
            StructureRef::PendingCreation => write!(f, "<pending>"),
        }
    }
}

/// Extra placement data for structural pieces with orientation choices
/// (corridors, hatches …). Meaningless for furniture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RotationMetadata {
    pub rotation_index: i32,
}

// ---------------------------------------------------------------------------
// Build piece
// ---------------------------------------------------------------------------

/// The unit of constructible state tracked by the authoritative store and
/// replayed to late joiners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildPiece {
    pub id: PieceId,
    pub kind: PieceKind,
    /// Structure this piece belongs to; pending for a piece that is itself
    /// creating a brand-new structure.
    pub owner_structure: StructureRef,
    pub catalog_id: CatalogId,
    /// Pose of the piece itself.
    pub placement_pose: Pose,
    /// Pose of the placing actor at placement time.
    pub origin_pose: Pose,
    /// Fraction constructed, in `[0.0, 1.0]`.
    pub progress: f32,
    /// Eventually `completed == (progress == 1.0)`; may lag while updates
    /// are in flight.
    pub completed: bool,
    /// Redundant with `kind`; kept for wire compatibility.
    pub is_furniture: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_metadata: Option<RotationMetadata>,
}

impl BuildPiece {
    /// A freshly placed, zero-progress piece.
    pub fn new(
        id: PieceId,
        kind: PieceKind,
        owner_structure: StructureRef,
        catalog_id: CatalogId,
        placement_pose: Pose,
        origin_pose: Pose,
    ) -> Self {
        Self {
            id,
            kind,
            owner_structure,
            catalog_id,
            placement_pose,
            origin_pose,
            progress: 0.0,
            completed: false,
            is_furniture: kind.is_furniture(),
            rotation_metadata: None,
        }
    }

    pub fn with_rotation_metadata(mut self, metadata: RotationMetadata) -> Self {
        self.rotation_metadata = Some(metadata);
        self
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters exposed by the server store for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_pieces: usize,
    pub completed_pieces: usize,
}
