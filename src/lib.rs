//! Construction-state synchronization core.
//!
//! Keeps the constructed world of a multiplayer session consistent: every
//! placement, progress change, completion and deconstruction is reported to
//! an authoritative server, rebroadcast to the other clients, and replayed
//! there against the local simulation. Late joiners receive the full
//! building state as an ordered snapshot and rebuild it through the same
//! replay path.
//!
//! ```text
//!  local sim callbacks                         remote peers
//!        │                                          ▲
//!        ▼                                          │ broadcast_except
//!  BuildReporter ──► PacketSender ──► wire ──► BuildService ──► PieceStore
//!                        ▲                          │
//!        suppression ────┘                          │ snapshot (join)
//!                                                   ▼
//!  Simulation ◄── ThrottledBuilder ◄── BuildQueue ◄── incoming messages
//! ```
//!
//! Client side: [`BuildQueue`] buffers incoming events, [`ThrottledBuilder`]
//! drains it once per tick with isolation between world-restructuring
//! events, and [`BuildReporter`] rate-limits the outbound path. Server side:
//! [`PieceStore`] is the single authoritative copy and [`BuildService`]
//! applies-then-rebroadcasts. The simulation, transport and id mapping are
//! collaborator traits; this crate contains no engine or socket code.

pub mod builder;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod reporter;
pub mod service;
pub mod sim;
pub mod store;
pub mod transport;
pub mod types;

pub use builder::{ThrottledBuilder, TickReport};
pub use error::{BuildError, Result};
pub use protocol::{BuildMessage, MessageKind};
pub use queue::{BuildEvent, BuildQueue};
pub use reporter::{BuildReporter, Clock, SystemClock};
pub use service::{Broadcaster, BuildService};
pub use sim::{IdRegistry, Materialized, SimHandle, Simulation, WorldGate};
pub use store::PieceStore;
pub use transport::{PacketSender, SuppressGuard, Transport};
pub use types::{
    BuildPiece, CatalogId, PieceId, PieceKind, PlayerId, Pose, Quat, RotationMetadata, StoreStats,
    StructureId, StructureRef, Vec3,
};
