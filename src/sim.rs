//! Collaborator traits for the local simulation side.
//!
//! The replay engine never touches rendering or physics directly. Everything
//! it needs from the surrounding game is expressed through three small
//! traits:
//!
//! - [`Simulation`]: materialize/initialize/mutate/destroy building objects.
//! - [`IdRegistry`]: map opaque network identifiers to live simulation
//!   handles and back.
//! - [`WorldGate`]: whether the streaming world is in a state where build
//!   events may be applied at all.
//!
//! Handles are plain integers assigned by the simulation; they never travel
//! over the network.

use crate::error::Result;
use crate::types::{CatalogId, PieceId, PieceKind, Pose, RotationMetadata, StructureId};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque reference to a live simulation object. Only meaningful to the
/// [`Simulation`] that issued it.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimHandle(pub u64);

impl std::fmt::Display for SimHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sim#{}", self.0)
    }
}

/// Result of materializing a piece: the piece object itself and, for the
/// first piece of a brand-new structure, the container object the simulation
/// created around it.
#[derive(Debug, Clone, Copy)]
pub struct Materialized {
    pub handle: SimHandle,
    pub container: Option<SimHandle>,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The in-game object engine, as seen by the replay engine.
///
/// `initialize` is a first-class entry point: a freshly materialized object
/// must be usable within the same tick, and the engine calls it explicitly
/// right after placement instead of reaching into simulation internals.
pub trait Simulation {
    /// Instantiate the catalog item at `placement`, optionally attached to
    /// an existing container. `origin` is the placing actor's pose, needed
    /// for deterministic placement of orientation-sensitive pieces.
    fn materialize(
        &mut self,
        catalog_id: &CatalogId,
        placement: &Pose,
        origin: &Pose,
        target: Option<SimHandle>,
        rotation: Option<&RotationMetadata>,
    ) -> Result<Materialized>;

    /// Force-initialize a freshly materialized object so it can be
    /// interacted with in the same tick.
    fn initialize(&mut self, handle: SimHandle) -> Result<()>;

    /// Set the construction fraction on an object.
    fn set_progress(&mut self, handle: SimHandle, progress: f32) -> Result<()>;

    /// Run one construction step so visuals/colliders catch up with the
    /// current progress value.
    fn construct_step(&mut self, handle: SimHandle) -> Result<()>;

    /// Apply a direct completion-state change. Completing a structural piece
    /// may spawn a new container module; if so, its handle is returned so
    /// the caller can bind a stable identifier to it.
    fn set_state(
        &mut self,
        handle: SimHandle,
        value: bool,
        set_amount: bool,
    ) -> Result<Option<SimHandle>>;

    /// Begin removing an object from the world.
    fn begin_deconstruct(&mut self, handle: SimHandle) -> Result<()>;

    /// Finish removing an object from the world.
    fn finish_deconstruct(&mut self, handle: SimHandle) -> Result<()>;

    /// Release the simulation object entirely.
    fn destroy(&mut self, handle: SimHandle);
}

// ---------------------------------------------------------------------------
// Identifier registry
// ---------------------------------------------------------------------------

/// Bidirectional map between stable network identifiers and simulation
/// handles. Pieces and structures live in separate id spaces.
///
/// A piece binding also records the piece's kind: some wire messages
/// (completion) carry no kind of their own, and lookup dispatch needs it.
pub trait IdRegistry {
    fn bind_piece(&mut self, handle: SimHandle, id: PieceId, kind: PieceKind);
    fn bind_structure(&mut self, handle: SimHandle, id: StructureId);

    fn resolve_piece(&self, id: &PieceId) -> Option<SimHandle>;
    fn resolve_structure(&self, id: &StructureId) -> Option<SimHandle>;

    /// The kind recorded when the piece was bound.
    fn piece_kind(&self, id: &PieceId) -> Option<PieceKind>;

    /// Reverse lookup, used by the outbound reporter to tag locally-caused
    /// mutations with their stable identifier.
    fn piece_id_of(&self, handle: SimHandle) -> Option<PieceId>;

    /// Drop the binding for a fully deconstructed piece.
    fn unbind_piece(&mut self, id: &PieceId);
}

// ---------------------------------------------------------------------------
// World readiness
// ---------------------------------------------------------------------------

/// Gate reported by the world/streaming subsystem. Build events are held in
/// the queue until both checks pass; holding them indefinitely is safe since
/// the queue is unbounded.
pub trait WorldGate {
    fn is_ready(&self) -> bool;
    fn is_settled(&self) -> bool;
}
