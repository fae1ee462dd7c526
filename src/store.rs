//! Server-side authoritative construction store.
//!
//! One [`PieceStore`] holds the entire persistent building state: every
//! known piece plus the order in which pieces reached completion. That order
//! matters – a completed structural piece is the foundation later pieces
//! attach to, so late-joiner replay must re-complete pieces in the same
//! order the builders did.
//!
//! All mutation goes through one mutex over the whole state. Updates are
//! tiny compared to packet handling, and a single lock makes every operation
//! atomic with respect to concurrent sessions; there is no per-piece
//! locking to reason about.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{BuildError, Result};
use crate::types::{BuildPiece, PieceId, StoreStats, StructureId, StructureRef};

/// Progress a piece falls back to the moment deconstruction starts.
pub const DECONSTRUCTION_PROGRESS: f32 = 0.95;

#[derive(Debug, Default)]
struct StoreInner {
    pieces_by_id: HashMap<PieceId, BuildPiece>,
    /// Ids of completed pieces, in completion order.
    completed_history: Vec<PieceId>,
}

/// Authoritative store. Shared across sessions behind an `Arc`.
#[derive(Debug, Default)]
pub struct PieceStore {
    inner: Mutex<StoreInner>,
}

impl PieceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from persisted pieces and completion history. History
    /// entries without a matching piece are dropped.
    pub fn from_parts(pieces: Vec<BuildPiece>, completed_history: Vec<PieceId>) -> Self {
        let pieces_by_id: HashMap<PieceId, BuildPiece> =
            pieces.into_iter().map(|piece| (piece.id.clone(), piece)).collect();
        let completed_history = completed_history
            .into_iter()
            .filter(|id| {
                let known = pieces_by_id.contains_key(id);
                if !known {
                    log::warn!("dropping completion-history entry for unknown piece {id}");
                }
                known
            })
            .collect();
        Self {
            inner: Mutex::new(StoreInner {
                pieces_by_id,
                completed_history,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Register a newly placed piece.
    pub fn add_piece(&self, piece: BuildPiece) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.pieces_by_id.contains_key(&piece.id) {
            return Err(BuildError::DuplicateId(piece.id));
        }
        log::debug!("piece {} placed ({})", piece.id, piece.catalog_id);
        inner.pieces_by_id.insert(piece.id.clone(), piece);
        Ok(())
    }

    /// Update construction progress on a piece. An unknown id is a silent
    /// no-op: progress can arrive before its placement event on a different
    /// channel, so a miss here is stale, not an error.
    pub fn change_progress(&self, piece_id: &PieceId, progress: f32) {
        let mut inner = self.inner.lock();
        match inner.pieces_by_id.get_mut(piece_id) {
            Some(piece) => piece.progress = progress,
            None => log::debug!("ignoring progress for unknown piece {piece_id}"),
        }
    }

    /// A piece started being taken apart: it is no longer complete and its
    /// progress drops to the deconstruction threshold.
    pub fn begin_deconstruction(&self, piece_id: &PieceId) -> Result<()> {
        let mut inner = self.inner.lock();
        let piece = inner
            .pieces_by_id
            .get_mut(piece_id)
            .ok_or_else(|| BuildError::NotFound(piece_id.to_string()))?;
        piece.progress = DECONSTRUCTION_PROGRESS;
        piece.completed = false;
        inner.completed_history.retain(|id| id != piece_id);
        Ok(())
    }

    /// A piece finished being taken apart and ceases to exist.
    pub fn finish_deconstruction(&self, piece_id: &PieceId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.pieces_by_id.remove(piece_id).is_none() {
            return Err(BuildError::NotFound(piece_id.to_string()));
        }
        inner.completed_history.retain(|id| id != piece_id);
        log::debug!("piece {piece_id} deconstructed");
        Ok(())
    }

    /// Apply a direct completion-state change.
    ///
    /// Repeating the current state is a no-op, so a client retransmit cannot
    /// duplicate history entries. `set_amount` snaps progress to match the
    /// new state. A transition to complete appends to the completion history
    /// and, when the message carries one, rebinds the piece to its newly
    /// spawned container structure.
    pub fn set_completion_state(
        &self,
        piece_id: &PieceId,
        value: bool,
        set_amount: bool,
        new_container_id: Option<StructureId>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let piece = inner
            .pieces_by_id
            .get_mut(piece_id)
            .ok_or_else(|| BuildError::NotFound(piece_id.to_string()))?;
        if piece.completed == value {
            return Ok(());
        }
        piece.completed = value;
        if set_amount {
            piece.progress = if value { 1.0 } else { 0.0 };
        }
        if value {
            if let Some(container_id) = new_container_id {
                piece.owner_structure = StructureRef::Known(container_id);
            }
            inner.completed_history.push(piece_id.clone());
        } else {
            inner.completed_history.retain(|id| id != piece_id);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot for late-joiner replay: completed pieces first, in the order
    /// they were completed, then everything still under construction. The
    /// incomplete tail is sorted by id so two snapshots of the same state
    /// are identical.
    pub fn snapshot(&self) -> Vec<BuildPiece> {
        let inner = self.inner.lock();
        let mut pieces: Vec<BuildPiece> = inner
            .completed_history
            .iter()
            .filter_map(|id| inner.pieces_by_id.get(id).cloned())
            .collect();
        let mut remaining: Vec<BuildPiece> = inner
            .pieces_by_id
            .values()
            .filter(|piece| !piece.completed)
            .cloned()
            .collect();
        remaining.sort_by(|a, b| a.id.cmp(&b.id));
        pieces.extend(remaining);
        pieces
    }

    pub fn get(&self, piece_id: &PieceId) -> Option<BuildPiece> {
        self.inner.lock().pieces_by_id.get(piece_id).cloned()
    }

    pub fn contains(&self, piece_id: &PieceId) -> bool {
        self.inner.lock().pieces_by_id.contains_key(piece_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pieces_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pieces_by_id.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            total_pieces: inner.pieces_by_id.len(),
            completed_pieces: inner.completed_history.len(),
        }
    }

    /// Pieces and completion history for persistence.
    pub fn to_parts(&self) -> (Vec<BuildPiece>, Vec<PieceId>) {
        let inner = self.inner.lock();
        let mut pieces: Vec<BuildPiece> = inner.pieces_by_id.values().cloned().collect();
        pieces.sort_by(|a, b| a.id.cmp(&b.id));
        (pieces, inner.completed_history.clone())
    }
}
