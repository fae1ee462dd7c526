//! Server-side message handling.
//!
//! [`BuildService`] is the glue between session packet handling and the
//! authoritative [`PieceStore`]: apply the mutation to the store first, then
//! rebroadcast the message to every other connected client. A mutation for
//! a piece the store no longer knows is still forwarded – clients treat it
//! as stale themselves – but a duplicate placement is dropped outright,
//! since forwarding it would duplicate the piece on every peer.

use std::sync::Arc;

use crate::error::{BuildError, Result};
use crate::protocol::BuildMessage;
use crate::store::PieceStore;
use crate::types::{BuildPiece, PlayerId, StoreStats};

/// Fan-out half of the server transport. Session bookkeeping and framing
/// live behind this trait.
pub trait Broadcaster {
    /// Deliver `message` to every connected client except `source`.
    fn broadcast_except(&self, source: PlayerId, message: &BuildMessage);
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct BuildService {
    store: Arc<PieceStore>,
    broadcaster: Box<dyn Broadcaster>,
}

impl BuildService {
    pub fn new(store: Arc<PieceStore>, broadcaster: Box<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    pub fn store(&self) -> &Arc<PieceStore> {
        &self.store
    }

    /// Handle one construction message from a client: update the store,
    /// then fan it out to everyone else.
    pub fn handle(&self, source: PlayerId, message: BuildMessage) {
        match self.apply(&message) {
            Ok(()) => self.broadcaster.broadcast_except(source, &message),
            Err(BuildError::DuplicateId(id)) => {
                log::warn!("dropping duplicate placement of piece {id} from {source}");
            }
            Err(BuildError::NotFound(id)) => {
                // Expected when a mutation races a deconstruction; forward
                // anyway, the other clients ignore it as stale.
                log::debug!("{} for unknown piece {id} from {source}", message.kind());
                self.broadcaster.broadcast_except(source, &message);
            }
            Err(err) => {
                log::error!("error handling {} from {source}: {err}", message.kind());
            }
        }
    }

    fn apply(&self, message: &BuildMessage) -> Result<()> {
        match message {
            BuildMessage::PiecePlaced { piece, .. } => self.store.add_piece(piece.clone()),
            BuildMessage::ProgressChanged {
                piece_id, progress, ..
            } => {
                self.store.change_progress(piece_id, *progress);
                Ok(())
            }
            BuildMessage::ConstructionFinished { piece_id, .. } => {
                self.store.set_completion_state(piece_id, true, true, None)
            }
            BuildMessage::DeconstructionStarted { piece_id, .. } => {
                self.store.begin_deconstruction(piece_id)
            }
            BuildMessage::DeconstructionFinished { piece_id, .. } => {
                self.store.finish_deconstruction(piece_id)
            }
            BuildMessage::StateSet {
                piece_id,
                value,
                set_amount,
                new_container_id,
                ..
            } => self.store.set_completion_state(
                piece_id,
                *value,
                *set_amount,
                new_container_id.clone(),
            ),
        }
    }

    /// Building state for a joining client, completed pieces first in
    /// completion order. The client expands this into replay events.
    pub fn initial_sync(&self, joiner: PlayerId) -> Vec<BuildPiece> {
        let pieces = self.store.snapshot();
        log::info!("sending {} pieces to joining {joiner}", pieces.len());
        pieces
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}
