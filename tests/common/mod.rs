//! Shared fakes for the integration tests: a recording simulation, an
//! in-memory id registry, and recording transport/broadcast sinks.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use build_sync::{
    Broadcaster, BuildError, BuildMessage, BuildPiece, CatalogId, IdRegistry, Materialized,
    PacketSender, PieceId, PieceKind, PlayerId, Pose, Result, RotationMetadata, SimHandle,
    Simulation, StructureId, StructureRef, ThrottledBuilder, Transport, Vec3, WorldGate,
};

// ---------------------------------------------------------------------------
// Simulation fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Materialize {
        catalog: CatalogId,
        target: Option<SimHandle>,
    },
    Initialize(SimHandle),
    SetProgress(SimHandle, f32),
    ConstructStep(SimHandle),
    SetState {
        handle: SimHandle,
        value: bool,
        set_amount: bool,
    },
    BeginDeconstruct(SimHandle),
    FinishDeconstruct(SimHandle),
    Destroy(SimHandle),
}

#[derive(Default)]
pub struct FakeSimulationState {
    pub calls: Vec<SimCall>,
    pub next_handle: u64,
    /// Spawn a container object when materializing without a target, as a
    /// real engine does for the first piece of a new structure.
    pub container_when_untargeted: bool,
    /// Handle returned once from the next completing `set_state`.
    pub spawn_on_set_state: Option<SimHandle>,
    /// Fail the next materialize call.
    pub fail_next_materialize: bool,
    /// When set, `begin_deconstruct` tries to re-send messages through this
    /// sender, imitating local engine callbacks firing during replay.
    pub echo_sender: Option<Arc<PacketSender>>,
}

#[derive(Clone, Default)]
pub struct FakeSimulation {
    pub state: Arc<Mutex<FakeSimulationState>>,
}

impl FakeSimulation {
    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }
}

impl Simulation for FakeSimulation {
    fn materialize(
        &mut self,
        catalog_id: &CatalogId,
        _placement: &Pose,
        _origin: &Pose,
        target: Option<SimHandle>,
        _rotation: Option<&RotationMetadata>,
    ) -> Result<Materialized> {
        let mut state = self.state.lock();
        if state.fail_next_materialize {
            state.fail_next_materialize = false;
            return Err(BuildError::Simulation("materialize failed".into()));
        }
        state.next_handle += 1;
        let handle = SimHandle(state.next_handle);
        let container = if target.is_none() && state.container_when_untargeted {
            state.next_handle += 1;
            Some(SimHandle(state.next_handle))
        } else {
            None
        };
        state.calls.push(SimCall::Materialize {
            catalog: catalog_id.clone(),
            target,
        });
        Ok(Materialized { handle, container })
    }

    fn initialize(&mut self, handle: SimHandle) -> Result<()> {
        self.state.lock().calls.push(SimCall::Initialize(handle));
        Ok(())
    }

    fn set_progress(&mut self, handle: SimHandle, progress: f32) -> Result<()> {
        self.state
            .lock()
            .calls
            .push(SimCall::SetProgress(handle, progress));
        Ok(())
    }

    fn construct_step(&mut self, handle: SimHandle) -> Result<()> {
        self.state.lock().calls.push(SimCall::ConstructStep(handle));
        Ok(())
    }

    fn set_state(
        &mut self,
        handle: SimHandle,
        value: bool,
        set_amount: bool,
    ) -> Result<Option<SimHandle>> {
        let mut state = self.state.lock();
        state.calls.push(SimCall::SetState {
            handle,
            value,
            set_amount,
        });
        if value && set_amount {
            Ok(state.spawn_on_set_state.take())
        } else {
            Ok(None)
        }
    }

    fn begin_deconstruct(&mut self, handle: SimHandle) -> Result<()> {
        let echo = self.state.lock().echo_sender.clone();
        if let Some(sender) = echo {
            // A real engine fires progress/state callbacks while removing a
            // piece; replay-time suppression must swallow these.
            sender.send(BuildMessage::DeconstructionStarted {
                piece_id: PieceId::new("echo"),
                owner: StructureRef::PendingCreation,
                kind: PieceKind::Structural,
            });
            sender.send(BuildMessage::StateSet {
                piece_id: PieceId::new("echo"),
                owner: StructureRef::PendingCreation,
                kind: PieceKind::Structural,
                value: false,
                set_amount: true,
                new_container_id: None,
            });
        }
        self.state
            .lock()
            .calls
            .push(SimCall::BeginDeconstruct(handle));
        Ok(())
    }

    fn finish_deconstruct(&mut self, handle: SimHandle) -> Result<()> {
        self.state
            .lock()
            .calls
            .push(SimCall::FinishDeconstruct(handle));
        Ok(())
    }

    fn destroy(&mut self, handle: SimHandle) {
        self.state.lock().calls.push(SimCall::Destroy(handle));
    }
}

// ---------------------------------------------------------------------------
// Registry fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RegistryState {
    pub pieces: HashMap<PieceId, (SimHandle, PieceKind)>,
    pub structures: HashMap<StructureId, SimHandle>,
}

#[derive(Clone, Default)]
pub struct FakeRegistry {
    pub state: Arc<Mutex<RegistryState>>,
}

impl FakeRegistry {
    pub fn prebind_piece(&self, id: &str, handle: SimHandle, kind: PieceKind) {
        self.state
            .lock()
            .pieces
            .insert(PieceId::new(id), (handle, kind));
    }

    pub fn prebind_structure(&self, id: &str, handle: SimHandle) {
        self.state
            .lock()
            .structures
            .insert(StructureId::new(id), handle);
    }

    pub fn structure(&self, id: &str) -> Option<SimHandle> {
        self.state
            .lock()
            .structures
            .get(&StructureId::new(id))
            .copied()
    }

    pub fn piece(&self, id: &str) -> Option<SimHandle> {
        self.state
            .lock()
            .pieces
            .get(&PieceId::new(id))
            .map(|(handle, _)| *handle)
    }
}

impl IdRegistry for FakeRegistry {
    fn bind_piece(&mut self, handle: SimHandle, id: PieceId, kind: PieceKind) {
        self.state.lock().pieces.insert(id, (handle, kind));
    }

    fn bind_structure(&mut self, handle: SimHandle, id: StructureId) {
        self.state.lock().structures.insert(id, handle);
    }

    fn resolve_piece(&self, id: &PieceId) -> Option<SimHandle> {
        self.state
            .lock()
            .pieces
            .get(id)
            .map(|(handle, _)| *handle)
    }

    fn resolve_structure(&self, id: &StructureId) -> Option<SimHandle> {
        self.state.lock().structures.get(id).copied()
    }

    fn piece_kind(&self, id: &PieceId) -> Option<PieceKind> {
        self.state.lock().pieces.get(id).map(|(_, kind)| *kind)
    }

    fn piece_id_of(&self, handle: SimHandle) -> Option<PieceId> {
        self.state
            .lock()
            .pieces
            .iter()
            .find(|(_, (bound, _))| *bound == handle)
            .map(|(id, _)| id.clone())
    }

    fn unbind_piece(&mut self, id: &PieceId) {
        self.state.lock().pieces.remove(id);
    }
}

// ---------------------------------------------------------------------------
// World gate fake
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeWorld {
    pub ready: Arc<Mutex<bool>>,
    pub settled: Arc<Mutex<bool>>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            ready: Arc::new(Mutex::new(true)),
            settled: Arc::new(Mutex::new(true)),
        }
    }
}

impl WorldGate for FakeWorld {
    fn is_ready(&self) -> bool {
        *self.ready.lock()
    }

    fn is_settled(&self) -> bool {
        *self.settled.lock()
    }
}

// ---------------------------------------------------------------------------
// Transport / broadcast sinks
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub delivered: Arc<Mutex<Vec<BuildMessage>>>,
}

impl Transport for RecordingTransport {
    fn deliver(&self, message: &BuildMessage) {
        self.delivered.lock().push(message.clone());
    }
}

#[derive(Clone, Default)]
pub struct RecordingBroadcaster {
    pub sent: Arc<Mutex<Vec<(PlayerId, BuildMessage)>>>,
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast_except(&self, source: PlayerId, message: &BuildMessage) {
        self.sent.lock().push((source, message.clone()));
    }
}

// ---------------------------------------------------------------------------
// Client rig
// ---------------------------------------------------------------------------

pub struct ClientRig {
    pub builder: ThrottledBuilder,
    pub sim: FakeSimulation,
    pub registry: FakeRegistry,
    pub world: FakeWorld,
    pub sender: Arc<PacketSender>,
    pub delivered: Arc<Mutex<Vec<BuildMessage>>>,
}

pub fn client_rig() -> ClientRig {
    let sim = FakeSimulation::default();
    let registry = FakeRegistry::default();
    let world = FakeWorld::default();
    let transport = RecordingTransport::default();
    let delivered = transport.delivered.clone();
    let sender = Arc::new(PacketSender::new(Box::new(transport)));
    let builder = ThrottledBuilder::new(
        Box::new(sim.clone()),
        Box::new(registry.clone()),
        Box::new(world.clone()),
        sender.clone(),
    );
    ClientRig {
        builder,
        sim,
        registry,
        world,
        sender,
        delivered,
    }
}

// ---------------------------------------------------------------------------
// Piece helpers
// ---------------------------------------------------------------------------

pub fn structural_piece(id: &str, owner: StructureRef) -> BuildPiece {
    BuildPiece::new(
        PieceId::new(id),
        PieceKind::Structural,
        owner,
        CatalogId::new("corridor_x"),
        Pose::at(Vec3::new(1.0, 0.0, 0.0)),
        Pose::at(Vec3::zero()),
    )
}

pub fn furniture_piece(id: &str, owner: &str) -> BuildPiece {
    BuildPiece::new(
        PieceId::new(id),
        PieceKind::Furniture,
        StructureRef::Known(StructureId::new(owner)),
        CatalogId::new("chair"),
        Pose::at(Vec3::new(0.0, 1.0, 0.0)),
        Pose::at(Vec3::zero()),
    )
}
