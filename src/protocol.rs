//! Construction lifecycle wire protocol.
//!
//! This module owns **every message that crosses the network boundary** for
//! construction state. Messages are the sole channel of truth between the
//! server and its clients – there is no out-of-band RPC for building state.
//!
//! ## Design rules
//!
//! 1. Every message is `Serialize + Deserialize` with snake_case JSON.
//! 2. No simulation-layer types leak out (handles stay local; only stable
//!    identifiers travel).
//! 3. Framing, delivery method and connection lifecycle belong to the
//!    transport collaborator, not here.

use serde::{Deserialize, Serialize};

use crate::types::{BuildPiece, PieceId, PieceKind, StructureId, StructureRef};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A construction lifecycle event, exchanged in both directions:
/// client → server when a local mutation is reported, server → client on
/// rebroadcast and during late-joiner replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BuildMessage {
    /// A new piece was placed. Carries the full piece plus the structure it
    /// is being attached to, if that structure already exists.
    PiecePlaced {
        piece: BuildPiece,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_structure: Option<StructureId>,
    },
    /// Construction progress moved (visual-only change on remote peers).
    ProgressChanged {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        progress: f32,
    },
    /// A piece reached full construction.
    ConstructionFinished {
        piece_id: PieceId,
        owner: StructureRef,
    },
    /// A piece started being taken apart.
    DeconstructionStarted {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    },
    /// A piece finished being taken apart and no longer exists.
    DeconstructionFinished {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    },
    /// Direct completion-state change. `set_amount` additionally resets the
    /// progress fraction to match `value`. Completing a structural piece may
    /// spawn a new container module on each peer; `new_container_id` is the
    /// stable identifier the spawned module must be bound to.
    StateSet {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        value: bool,
        set_amount: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_container_id: Option<StructureId>,
    },
}

impl BuildMessage {
    /// The piece this message is about.
    pub fn piece_id(&self) -> &PieceId {
        match self {
            BuildMessage::PiecePlaced { piece, .. } => &piece.id,
            BuildMessage::ProgressChanged { piece_id, .. }
            | BuildMessage::ConstructionFinished { piece_id, .. }
            | BuildMessage::DeconstructionStarted { piece_id, .. }
            | BuildMessage::DeconstructionFinished { piece_id, .. }
            | BuildMessage::StateSet { piece_id, .. } => piece_id,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            BuildMessage::PiecePlaced { .. } => MessageKind::PiecePlaced,
            BuildMessage::ProgressChanged { .. } => MessageKind::ProgressChanged,
            BuildMessage::ConstructionFinished { .. } => MessageKind::ConstructionFinished,
            BuildMessage::DeconstructionStarted { .. } => MessageKind::DeconstructionStarted,
            BuildMessage::DeconstructionFinished { .. } => MessageKind::DeconstructionFinished,
            BuildMessage::StateSet { .. } => MessageKind::StateSet,
        }
    }
}

/// Discriminant of [`BuildMessage`], used as the echo-suppression key.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    PiecePlaced,
    ProgressChanged,
    ConstructionFinished,
    DeconstructionStarted,
    DeconstructionFinished,
    StateSet,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::PiecePlaced => "piece_placed",
            MessageKind::ProgressChanged => "progress_changed",
            MessageKind::ConstructionFinished => "construction_finished",
            MessageKind::DeconstructionStarted => "deconstruction_started",
            MessageKind::DeconstructionFinished => "deconstruction_finished",
            MessageKind::StateSet => "state_set",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CatalogId, Pose, Vec3};

    fn sample_piece() -> BuildPiece {
        BuildPiece::new(
            PieceId::new("p1"),
            PieceKind::Structural,
            StructureRef::PendingCreation,
            CatalogId::new("corridor_x"),
            Pose::at(Vec3::new(1.0, 2.0, 3.0)),
            Pose::at(Vec3::zero()),
        )
    }

    #[test]
    fn piece_placed_roundtrip() {
        let msg = BuildMessage::PiecePlaced {
            piece: sample_piece(),
            target_structure: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: BuildMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        // Optional target is omitted entirely, not serialized as null.
        assert!(!json.contains("target_structure"));
    }

    #[test]
    fn state_set_roundtrip_with_container() {
        let msg = BuildMessage::StateSet {
            piece_id: PieceId::new("p1"),
            owner: StructureRef::Known(StructureId::new("s1")),
            kind: PieceKind::Structural,
            value: true,
            set_amount: true,
            new_container_id: Some(StructureId::new("s2")),
        };
        let json = serde_json::to_vec(&msg).unwrap();
        let back: BuildMessage = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn kind_matches_variant() {
        let msg = BuildMessage::DeconstructionStarted {
            piece_id: PieceId::new("p1"),
            owner: StructureRef::Known(StructureId::new("s1")),
            kind: PieceKind::Furniture,
        };
        assert_eq!(msg.kind(), MessageKind::DeconstructionStarted);
        assert_eq!(msg.piece_id(), &PieceId::new("p1"));
    }
}
