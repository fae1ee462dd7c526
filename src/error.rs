//! Crate-level error type.
//!
//! Most failures in this crate degrade to "this one state update is skipped"
//! rather than propagating to a user; the variants here exist so each call
//! site can decide whether to log-and-continue (stale updates, orphaned
//! containers) or reject outright (duplicate placement).

use thiserror::Error;

use crate::types::PieceId;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// An identifier could not be resolved to a live simulation object.
    /// For progress/completion updates this is expected under network
    /// reordering and is treated as stale, not fatal.
    #[error("unknown identifier: {0}")]
    NotFound(String),

    /// A piece's owning structure no longer exists locally (e.g. a
    /// deconstruction race). The originating operation becomes a no-op.
    #[error("owning structure cannot be resolved for piece {0}")]
    OrphanedContainer(PieceId),

    /// Placement of an already-known piece id. The duplicate event is
    /// dropped without rebroadcast.
    #[error("piece id already registered: {0}")]
    DuplicateId(PieceId),

    /// The local simulation rejected an operation.
    #[error("simulation error: {0}")]
    Simulation(String),
}
