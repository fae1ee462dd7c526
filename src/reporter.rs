//! Outbound reporting of locally-caused mutations.
//!
//! The glue layer hooks the local simulation's build callbacks and forwards
//! them here with network identifiers already resolved. [`BuildReporter`]
//! decides what actually goes on the wire:
//!
//! - progress updates are rate-limited per piece, otherwise every held
//!   build-tool frame becomes a packet;
//! - progress at or beyond the completion threshold is not sent at all, the
//!   completion message that follows carries the authoritative state;
//! - everything funnels through [`PacketSender`], so replay-time echo
//!   suppression applies without the reporter knowing about it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::protocol::BuildMessage;
use crate::transport::PacketSender;
use crate::types::{BuildPiece, PieceId, PieceKind, StructureId, StructureRef};

/// Minimum spacing between progress packets for one piece.
pub const PROGRESS_COOLDOWN: Duration = Duration::from_millis(100);

/// Progress at or above this is left to the completion message.
pub const PROGRESS_REPORT_CUTOFF: f32 = 0.95;

/// Time source, injectable so the cooldown is testable.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock [`Clock`] used outside of tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

pub struct BuildReporter {
    sender: Arc<PacketSender>,
    clock: Box<dyn Clock>,
    last_progress: HashMap<PieceId, Instant>,
}

impl BuildReporter {
    pub fn new(sender: Arc<PacketSender>) -> Self {
        Self::with_clock(sender, Box::new(SystemClock))
    }

    pub fn with_clock(sender: Arc<PacketSender>, clock: Box<dyn Clock>) -> Self {
        Self {
            sender,
            clock,
            last_progress: HashMap::new(),
        }
    }

    /// A piece was placed locally.
    pub fn piece_placed(&mut self, piece: BuildPiece, target_structure: Option<StructureId>) {
        log::debug!("reporting placement of piece {}", piece.id);
        self.sender.send(BuildMessage::PiecePlaced {
            piece,
            target_structure,
        });
    }

    /// Construction progress moved on a piece being built locally. Throttled
    /// per piece; near-complete values are withheld in favor of the
    /// completion message.
    pub fn progress_changed(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        progress: f32,
    ) {
        if progress >= PROGRESS_REPORT_CUTOFF {
            return;
        }
        let now = self.clock.now();
        if let Some(last) = self.last_progress.get(&piece_id) {
            if now.duration_since(*last) < PROGRESS_COOLDOWN {
                return;
            }
        }
        self.last_progress.insert(piece_id.clone(), now);
        self.sender.send(BuildMessage::ProgressChanged {
            piece_id,
            owner,
            kind,
            progress,
        });
    }

    /// A piece finished constructing locally.
    pub fn construction_finished(&mut self, piece_id: PieceId, owner: StructureRef) {
        self.last_progress.remove(&piece_id);
        log::debug!("reporting construction finished for piece {piece_id}");
        self.sender
            .send(BuildMessage::ConstructionFinished { piece_id, owner });
    }

    /// A piece started being taken apart locally.
    pub fn deconstruction_started(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    ) {
        log::debug!("reporting deconstruction start for piece {piece_id}");
        self.sender.send(BuildMessage::DeconstructionStarted {
            piece_id,
            owner,
            kind,
        });
    }

    /// A piece finished being taken apart locally and no longer exists.
    pub fn deconstruction_finished(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
    ) {
        self.last_progress.remove(&piece_id);
        log::debug!("reporting deconstruction finish for piece {piece_id}");
        self.sender.send(BuildMessage::DeconstructionFinished {
            piece_id,
            owner,
            kind,
        });
    }

    /// A direct completion-state change happened locally. When completing a
    /// structural piece spawned a new container module, `new_container_id`
    /// carries the identifier the other peers must bind it to.
    #[allow(clippy::too_many_arguments)]
    pub fn state_set(
        &mut self,
        piece_id: PieceId,
        owner: StructureRef,
        kind: PieceKind,
        value: bool,
        set_amount: bool,
        new_container_id: Option<StructureId>,
    ) {
        log::debug!("reporting state change for piece {piece_id}: value={value}");
        self.sender.send(BuildMessage::StateSet {
            piece_id,
            owner,
            kind,
            value,
            set_amount,
            new_container_id,
        });
    }
}
