//! Client-side throttling queue.
//!
//! Build events can not always be applied in the same tick they arrive:
//! placing or removing a structural piece changes the surrounding
//! environment, and the simulation needs a tick to settle before the next
//! such change lands. Incoming packets are therefore converted to
//! [`BuildEvent`]s and held here for the replay engine
//! ([`crate::builder::ThrottledBuilder`]) to drain. The same event type is
//! reused for late-joiner replay, so initial-sync and live packets share one
//! application path.

use std::collections::VecDeque;

use crate::protocol::{BuildMessage, MessageKind};
use crate::types::{BuildPiece, PieceId, PieceKind, StructureId, StructureRef};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A queued construction mutation, mirroring the wire message that produced
/// it. Created transiently on receive and consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    PiecePlaced {
        piece: BuildPiece,
        target_structure: Option<StructureId>,
    },
    ProgressChanged {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        progress: f32,
    },
    ConstructionFinished {
        piece_id: PieceId,
        owner: StructureRef,
    },
    DeconstructionStarted {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    },
    DeconstructionFinished {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    },
    StateSet {
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        value: bool,
        set_amount: bool,
        new_container_id: Option<StructureId>,
    },
}

impl BuildEvent {
    /// Whether this event needs a tick to itself before another isolating
    /// event may run.
    ///
    /// Placement isolates only for structural pieces – furniture can not be
    /// built upon, so concurrent furniture placement in one tick is safe.
    /// Progress changes only affect visuals and batch freely. Everything
    /// that can restructure the surrounding world isolates.
    pub fn requires_isolated_slot(&self) -> bool {
        match self {
            BuildEvent::PiecePlaced { piece, .. } => !piece.kind.is_furniture(),
            BuildEvent::ProgressChanged { .. } => false,
            BuildEvent::ConstructionFinished { .. } => true,
            BuildEvent::DeconstructionStarted { .. } => true,
            BuildEvent::DeconstructionFinished { .. } => true,
            BuildEvent::StateSet { .. } => true,
        }
    }

    /// The wire kind this event replays, used as the echo-suppression key
    /// while it is applied.
    pub fn message_kind(&self) -> MessageKind {
        match self {
            BuildEvent::PiecePlaced { .. } => MessageKind::PiecePlaced,
            BuildEvent::ProgressChanged { .. } => MessageKind::ProgressChanged,
            BuildEvent::ConstructionFinished { .. } => MessageKind::ConstructionFinished,
            BuildEvent::DeconstructionStarted { .. } => MessageKind::DeconstructionStarted,
            BuildEvent::DeconstructionFinished { .. } => MessageKind::DeconstructionFinished,
            BuildEvent::StateSet { .. } => MessageKind::StateSet,
        }
    }

    pub fn piece_id(&self) -> &PieceId {
        match self {
            BuildEvent::PiecePlaced { piece, .. } => &piece.id,
            BuildEvent::ProgressChanged { piece_id, .. }
            | BuildEvent::ConstructionFinished { piece_id, .. }
            | BuildEvent::DeconstructionStarted { piece_id, .. }
            | BuildEvent::DeconstructionFinished { piece_id, .. }
            | BuildEvent::StateSet { piece_id, .. } => piece_id,
        }
    }
}

impl From<BuildMessage> for BuildEvent {
    fn from(message: BuildMessage) -> Self {
        match message {
            BuildMessage::PiecePlaced {
                piece,
                target_structure,
            } => BuildEvent::PiecePlaced {
                piece,
                target_structure,
            },
            BuildMessage::ProgressChanged {
                piece_id,
                owner,
                kind,
                progress,
            } => BuildEvent::ProgressChanged {
                piece_id,
                owner,
                kind,
                progress,
            },
            BuildMessage::ConstructionFinished { piece_id, owner } => {
                BuildEvent::ConstructionFinished { piece_id, owner }
            }
            BuildMessage::DeconstructionStarted {
                piece_id,
                owner,
                kind,
            } => BuildEvent::DeconstructionStarted {
                piece_id,
                owner,
                kind,
            },
            BuildMessage::DeconstructionFinished {
                piece_id,
                owner,
                kind,
            } => BuildEvent::DeconstructionFinished {
                piece_id,
                owner,
                kind,
            },
            BuildMessage::StateSet {
                piece_id,
                owner,
                kind,
                value,
                set_amount,
                new_container_id,
            } => BuildEvent::StateSet {
                piece_id,
                owner,
                kind,
                value,
                set_amount,
                new_container_id,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Unbounded FIFO of pending build events.
///
/// Enqueue happens from network-receive glue on the tick thread; draining
/// happens once per tick from the replay engine. No internal locking.
#[derive(Default)]
pub struct BuildQueue {
    events: VecDeque<BuildEvent>,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the head event needs an isolated slot. Used by the replay
    /// engine to decide when to stop draining this tick.
    pub fn head_requires_isolated_slot(&self) -> bool {
        self.events
            .front()
            .is_some_and(BuildEvent::requires_isolated_slot)
    }

    pub fn pop(&mut self) -> Option<BuildEvent> {
        self.events.pop_front()
    }

    /// Convert an incoming wire message into a queued event. The one-line
    /// entry point for network-receive glue.
    pub fn enqueue_message(&mut self, message: BuildMessage) {
        log::debug!(
            "enqueueing {} for piece {}",
            message.kind(),
            message.piece_id()
        );
        self.events.push_back(message.into());
    }

    pub fn enqueue_piece_placed(&mut self, piece: BuildPiece, target_structure: Option<StructureId>) {
        log::debug!(
            "enqueueing placement of piece {} (owner {})",
            piece.id,
            piece.owner_structure
        );
        self.events.push_back(BuildEvent::PiecePlaced {
            piece,
            target_structure,
        });
    }

    pub fn enqueue_progress_changed(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        progress: f32,
    ) {
        log::debug!("enqueueing progress change for piece {piece_id} (owner {owner})");
        self.events.push_back(BuildEvent::ProgressChanged {
            piece_id,
            owner,
            kind,
            progress,
        });
    }

    pub fn enqueue_construction_finished(&mut self, piece_id: PieceId, owner: StructureRef) {
        log::debug!("enqueueing construction finish for piece {piece_id} (owner {owner})");
        self.events
            .push_back(BuildEvent::ConstructionFinished { piece_id, owner });
    }

    pub fn enqueue_deconstruction_started(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    ) {
        log::debug!("enqueueing deconstruction start for piece {piece_id} (owner {owner})");
        self.events.push_back(BuildEvent::DeconstructionStarted {
            piece_id,
            owner,
            kind,
        });
    }

    pub fn enqueue_deconstruction_finished(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    ) {
        log::debug!("enqueueing deconstruction finish for piece {piece_id} (owner {owner})");
        self.events.push_back(BuildEvent::DeconstructionFinished {
            piece_id,
            owner,
            kind,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_state_set(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        value: bool,
        set_amount: bool,
        new_container_id: Option<StructureId>,
    ) {
        log::debug!(
            "enqueueing state set for piece {piece_id} (owner {owner}, value {value}, set_amount {set_amount})"
        );
        self.events.push_back(BuildEvent::StateSet {
            piece_id,
            owner,
            kind,
            value,
            set_amount,
            new_container_id,
        });
    }

    /// Expand a late-joiner snapshot into queued events: each piece is
    /// placed, then either completed outright or brought to its partial
    /// progress. The snapshot arrives ordered (completed history first), so
    /// plain FIFO replay preserves container dependencies.
    pub fn enqueue_replay(&mut self, pieces: Vec<BuildPiece>) {
        for piece in pieces {
            let id = piece.id.clone();
            let owner = piece.owner_structure.clone();
            let kind = piece.kind;
            let completed = piece.completed;
            let progress = piece.progress;

            self.enqueue_piece_placed(piece, owner.known().cloned());
            if completed {
                self.enqueue_state_set(id, owner, kind, true, true, None);
            } else {
                self.enqueue_progress_changed(id, owner, kind, progress);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CatalogId, Pose, Vec3};

    fn piece(id: &str, kind: PieceKind) -> BuildPiece {
        BuildPiece::new(
            PieceId::new(id),
            kind,
            StructureRef::Known(StructureId::new("s1")),
            CatalogId::new("chair"),
            Pose::at(Vec3::zero()),
            Pose::at(Vec3::zero()),
        )
    }

    #[test]
    fn structural_placement_isolates_furniture_does_not() {
        let structural = BuildEvent::PiecePlaced {
            piece: piece("p1", PieceKind::Structural),
            target_structure: None,
        };
        let furniture = BuildEvent::PiecePlaced {
            piece: piece("p2", PieceKind::Furniture),
            target_structure: None,
        };
        assert!(structural.requires_isolated_slot());
        assert!(!furniture.requires_isolated_slot());
    }

    #[test]
    fn progress_never_isolates_state_changes_always_do() {
        let progress = BuildEvent::ProgressChanged {
            piece_id: PieceId::new("p1"),
            owner: StructureRef::PendingCreation,
            kind: PieceKind::Structural,
            progress: 0.3,
        };
        let state_set = BuildEvent::StateSet {
            piece_id: PieceId::new("p1"),
            owner: StructureRef::PendingCreation,
            kind: PieceKind::Furniture,
            value: true,
            set_amount: true,
            new_container_id: None,
        };
        let decon = BuildEvent::DeconstructionStarted {
            piece_id: PieceId::new("p1"),
            owner: StructureRef::PendingCreation,
            kind: PieceKind::Furniture,
        };
        assert!(!progress.requires_isolated_slot());
        assert!(state_set.requires_isolated_slot());
        assert!(decon.requires_isolated_slot());
    }

    #[test]
    fn head_flag_tracks_front_of_queue() {
        let mut queue = BuildQueue::new();
        assert!(!queue.head_requires_isolated_slot());

        queue.enqueue_progress_changed(
            PieceId::new("p1"),
            StructureRef::PendingCreation,
            PieceKind::Structural,
            0.2,
        );
        assert!(!queue.head_requires_isolated_slot());

        queue.pop();
        queue.enqueue_piece_placed(piece("p2", PieceKind::Structural), None);
        assert!(queue.head_requires_isolated_slot());
    }

    #[test]
    fn replay_expands_completed_and_partial_pieces() {
        let mut done = piece("done", PieceKind::Structural);
        done.progress = 1.0;
        done.completed = true;
        let mut partial = piece("partial", PieceKind::Structural);
        partial.progress = 0.4;

        let mut queue = BuildQueue::new();
        queue.enqueue_replay(vec![done, partial]);

        assert_eq!(queue.len(), 4);
        assert!(matches!(queue.pop(), Some(BuildEvent::PiecePlaced { .. })));
        assert!(matches!(
            queue.pop(),
            Some(BuildEvent::StateSet {
                value: true,
                set_amount: true,
                ..
            })
        ));
        assert!(matches!(queue.pop(), Some(BuildEvent::PiecePlaced { .. })));
        match queue.pop() {
            Some(BuildEvent::ProgressChanged { progress, .. }) => {
                assert!((progress - 0.4).abs() < f32::EPSILON);
            }
            other => panic!("expected ProgressChanged, got {other:?}"),
        }
    }

    #[test]
    fn message_conversion_preserves_fields() {
        let mut queue = BuildQueue::new();
        queue.enqueue_message(BuildMessage::DeconstructionFinished {
            piece_id: PieceId::new("p9"),
            owner: StructureRef::Known(StructureId::new("s3")),
            kind: PieceKind::Structural,
        });
        match queue.pop() {
            Some(BuildEvent::DeconstructionFinished { piece_id, owner, kind }) => {
                assert_eq!(piece_id, PieceId::new("p9"));
                assert_eq!(owner, StructureRef::Known(StructureId::new("s3")));
                assert_eq!(kind, PieceKind::Structural);
            }
            other => panic!("expected DeconstructionFinished, got {other:?}"),
        }
    }
}
