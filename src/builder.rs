//! Throttled replay engine.
//!
//! Build events can cause changes to the surrounding environment, so they
//! can not simply be applied the moment a packet arrives – the local
//! simulation may be mid-frame, and two world-restructuring events in the
//! same tick interfere with each other. [`ThrottledBuilder`] owns the
//! [`BuildQueue`] and drains it once per simulation tick:
//!
//! - nothing runs until the world/streaming subsystem reports ready and
//!   settled;
//! - events are applied in FIFO order, but after an isolating event the
//!   drain stops as soon as the next event also needs an isolated slot
//!   (at most one world-restructuring event per adjacent pair);
//! - a failing event is logged and skipped – one bad packet must never
//!   stall the queue;
//! - every application runs inside an echo-suppression scope so replaying
//!   a remote mutation does not re-enter the network send path.
//!
//! The builder is an explicitly constructed, owned value – the simulation
//! tick driver holds it and calls [`ThrottledBuilder::tick`]; there is no
//! global instance.

use std::sync::Arc;

use crate::error::{BuildError, Result};
use crate::protocol::{BuildMessage, MessageKind};
use crate::queue::{BuildEvent, BuildQueue};
use crate::sim::{IdRegistry, SimHandle, Simulation, WorldGate};
use crate::transport::PacketSender;
use crate::types::{BuildPiece, PieceId, PieceKind, StructureId, StructureRef};

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Summary of a single [`ThrottledBuilder::tick`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events applied successfully this tick.
    pub applied: usize,
    /// Events that failed and were skipped.
    pub failed: usize,
    /// The queue went from non-empty to empty this tick. External
    /// collaborators waiting for a consistent building state (e.g.
    /// initial-sync completion) key off this.
    pub drained: bool,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ThrottledBuilder {
    queue: BuildQueue,
    simulation: Box<dyn Simulation>,
    registry: Box<dyn IdRegistry>,
    world: Box<dyn WorldGate>,
    sender: Arc<PacketSender>,
    on_drained: Option<Box<dyn FnMut()>>,
}

impl ThrottledBuilder {
    pub fn new(
        simulation: Box<dyn Simulation>,
        registry: Box<dyn IdRegistry>,
        world: Box<dyn WorldGate>,
        sender: Arc<PacketSender>,
    ) -> Self {
        Self {
            queue: BuildQueue::new(),
            simulation,
            registry,
            world,
            sender,
            on_drained: None,
        }
    }

    /// Queue an incoming wire message for replay. Called from the
    /// network-receive glue on the tick thread.
    pub fn enqueue(&mut self, message: BuildMessage) {
        self.queue.enqueue_message(message);
    }

    /// Direct queue access for glue that enqueues pre-built events
    /// (late-joiner replay expansion, tests).
    pub fn queue_mut(&mut self) -> &mut BuildQueue {
        &mut self.queue
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Register the queue-drained notification.
    pub fn on_queue_drained(&mut self, callback: impl FnMut() + 'static) {
        self.on_drained = Some(Box::new(callback));
    }

    /// Drain the queue as far as this tick allows. Runs once per simulation
    /// tick; events are held whenever the world is not ready or settled.
    pub fn tick(&mut self) -> TickReport {
        if !self.world.is_ready() || !self.world.is_settled() {
            return TickReport::default();
        }

        let had_items = !self.queue.is_empty();
        let mut report = TickReport::default();
        let mut last_was_isolating = false;

        while !self.queue.is_empty() {
            if last_was_isolating && self.queue.head_requires_isolated_slot() {
                break;
            }
            // Queue is non-empty here, so pop always yields an event.
            let Some(event) = self.queue.pop() else { break };
            let isolating = event.requires_isolated_slot();
            let piece_id = event.piece_id().clone();

            match self.apply(event) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    log::error!("error applying build event for piece {piece_id}: {err}");
                    report.failed += 1;
                }
            }
            last_was_isolating = isolating;
        }

        if had_items && self.queue.is_empty() {
            report.drained = true;
            if let Some(callback) = self.on_drained.as_mut() {
                callback();
            }
        }
        report
    }

    // -----------------------------------------------------------------------
    // Event application
    // -----------------------------------------------------------------------

    /// Apply one event inside an echo-suppression scope for its own wire
    /// kind. Deconstruction additionally suppresses `StateSet`, because the
    /// simulation implements removal through a state change and the
    /// resulting local callback must not be re-sent either.
    fn apply(&mut self, event: BuildEvent) -> Result<()> {
        let kind = event.message_kind();
        let sender = Arc::clone(&self.sender);
        let _kind_guard = sender.suppress(kind);
        let _state_guard = matches!(
            kind,
            MessageKind::DeconstructionStarted | MessageKind::DeconstructionFinished
        )
        .then(|| sender.suppress(MessageKind::StateSet));

        match event {
            BuildEvent::PiecePlaced {
                piece,
                target_structure,
            } => self.apply_piece_placed(piece, target_structure),
            BuildEvent::ProgressChanged {
                piece_id,
                owner,
                kind,
                progress,
            } => self.apply_progress(&piece_id, &owner, kind, progress),
            BuildEvent::ConstructionFinished { piece_id, owner } => {
                // The completion message carries no kind; the registry
                // remembers it from placement. An unknown piece defaults to
                // structural so ghosts reachable only through their
                // container still resolve.
                let kind = self
                    .registry
                    .piece_kind(&piece_id)
                    .unwrap_or(PieceKind::Structural);
                self.apply_progress(&piece_id, &owner, kind, 1.0)
            }
            BuildEvent::DeconstructionStarted {
                piece_id,
                owner,
                kind,
            } => self.apply_deconstruction_started(&piece_id, &owner, kind),
            BuildEvent::DeconstructionFinished {
                piece_id,
                owner,
                kind,
            } => self.apply_deconstruction_finished(&piece_id, &owner, kind),
            BuildEvent::StateSet {
                piece_id,
                value,
                set_amount,
                new_container_id,
                ..
            } => self.apply_state_set(&piece_id, value, set_amount, new_container_id),
        }
    }

    fn apply_piece_placed(
        &mut self,
        piece: BuildPiece,
        target_structure: Option<StructureId>,
    ) -> Result<()> {
        let target = match piece.kind {
            // Furniture attaches under its owning structure; if that
            // structure is gone (deconstruction race) the placement is a
            // local no-op.
            PieceKind::Furniture => match piece.owner_structure.known() {
                Some(structure_id) => match self.registry.resolve_structure(structure_id) {
                    Some(handle) => Some(handle),
                    None => {
                        log::warn!(
                            "dropping furniture placement {}: owning structure {structure_id} is gone",
                            piece.id
                        );
                        return Ok(());
                    }
                },
                None => None,
            },
            // Structural pieces attach to the target structure when it
            // already exists locally; a brand-new structure has no target.
            PieceKind::Structural => target_structure
                .as_ref()
                .and_then(|id| self.registry.resolve_structure(id)),
        };

        let materialized = self.simulation.materialize(
            &piece.catalog_id,
            &piece.placement_pose,
            &piece.origin_pose,
            target,
            piece.rotation_metadata.as_ref(),
        )?;
        self.registry
            .bind_piece(materialized.handle, piece.id.clone(), piece.kind);

        // The first piece of a brand-new structure creates its container
        // locally; the server-assigned structure identifier is bound to it
        // retroactively.
        if piece.kind == PieceKind::Structural {
            if let (Some(container), Some(structure_id)) =
                (materialized.container, piece.owner_structure.known())
            {
                if self.registry.resolve_structure(structure_id).is_none() {
                    log::debug!(
                        "binding structure {structure_id} to locally created container {container}"
                    );
                    self.registry.bind_structure(container, structure_id.clone());
                }
            }
        }

        // The piece may be interacted with in this same tick.
        self.simulation.initialize(materialized.handle)
    }

    fn apply_progress(
        &mut self,
        piece_id: &PieceId,
        owner: &StructureRef,
        kind: PieceKind,
        progress: f32,
    ) -> Result<()> {
        let Some(handle) = self.locate(kind, piece_id, owner) else {
            // Expected under network reordering (progress on a different
            // channel than placement) – stale, not an error.
            log::debug!("ignoring stale progress update for unknown piece {piece_id}");
            return Ok(());
        };
        self.simulation.set_progress(handle, progress)?;
        self.simulation.construct_step(handle)
    }

    fn apply_deconstruction_started(
        &mut self,
        piece_id: &PieceId,
        owner: &StructureRef,
        kind: PieceKind,
    ) -> Result<()> {
        let Some(handle) = self.locate(kind, piece_id, owner) else {
            log::warn!("deconstruction start for {piece_id}: {}", orphaned(piece_id));
            return Ok(());
        };
        self.simulation.begin_deconstruct(handle)
    }

    fn apply_deconstruction_finished(
        &mut self,
        piece_id: &PieceId,
        owner: &StructureRef,
        kind: PieceKind,
    ) -> Result<()> {
        let Some(handle) = self.locate(kind, piece_id, owner) else {
            log::warn!(
                "deconstruction finish for {piece_id}: {}",
                orphaned(piece_id)
            );
            return Ok(());
        };
        self.simulation.finish_deconstruct(handle)?;
        self.simulation.destroy(handle);
        self.registry.unbind_piece(piece_id);
        Ok(())
    }

    fn apply_state_set(
        &mut self,
        piece_id: &PieceId,
        value: bool,
        set_amount: bool,
        new_container_id: Option<StructureId>,
    ) -> Result<()> {
        let Some(handle) = self.registry.resolve_piece(piece_id) else {
            log::debug!("ignoring stale state change for unknown piece {piece_id}");
            return Ok(());
        };
        let spawned = self.simulation.set_state(handle, value, set_amount)?;

        // Completing a structural piece spawns its finished module; bind the
        // server-assigned container identifier to it.
        if value && set_amount {
            match (spawned, new_container_id) {
                (Some(container), Some(container_id)) => {
                    self.registry.bind_structure(container, container_id);
                }
                (None, Some(container_id)) => {
                    log::error!(
                        "no spawned container to bind {container_id} to after state set on {piece_id}"
                    );
                }
                (Some(_), None) => {
                    log::error!("spawned container after state set on {piece_id} has no identifier");
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    /// Resolve the simulation object a mutation targets. The simulation
    /// associates construction state of structural pieces with their
    /// container object, not the leaf; furniture is looked up directly.
    fn locate(&self, kind: PieceKind, piece_id: &PieceId, owner: &StructureRef) -> Option<SimHandle> {
        match kind {
            PieceKind::Furniture => self.registry.resolve_piece(piece_id),
            PieceKind::Structural => owner
                .known()
                .and_then(|structure_id| self.registry.resolve_structure(structure_id))
                .or_else(|| self.registry.resolve_piece(piece_id)),
        }
    }
}

fn orphaned(piece_id: &PieceId) -> BuildError {
    BuildError::OrphanedContainer(piece_id.clone())
}
