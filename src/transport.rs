//! Outbound message path with echo suppression.
//!
//! [`PacketSender`] wraps the external transport and owns per-kind
//! suppression counters. While the replay engine applies a server-originated
//! mutation, it holds a [`SuppressGuard`] for that message's kind; any
//! attempt by local simulation callbacks to re-send a message of the same
//! kind is silently dropped. This is what breaks the echo loop:
//! local change → server → remote replay must never re-enter the send path
//! on the replaying client.
//!
//! Counters (not booleans) so nested scopes compose – deconstruction
//! suppresses both its own kind and `StateSet`.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::protocol::{BuildMessage, MessageKind};

/// Delivery half of the external transport. Framing, channel selection and
/// connection lifecycle live behind this trait.
pub trait Transport {
    fn deliver(&self, message: &BuildMessage);
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Suppression-aware wrapper around the transport.
pub struct PacketSender {
    transport: Box<dyn Transport>,
    suppressed: Mutex<HashMap<MessageKind, u32>>,
}

impl PacketSender {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            suppressed: Mutex::new(HashMap::new()),
        }
    }

    /// Send a message unless its kind is currently suppressed.
    pub fn send(&self, message: BuildMessage) {
        let kind = message.kind();
        if self.is_suppressed(kind) {
            log::debug!("suppressed outbound {kind} for {}", message.piece_id());
            return;
        }
        self.transport.deliver(&message);
    }

    pub fn is_suppressed(&self, kind: MessageKind) -> bool {
        self.suppressed
            .lock()
            .get(&kind)
            .is_some_and(|count| *count > 0)
    }

    /// Suppress outbound messages of `kind` until the returned guard drops.
    pub fn suppress(&self, kind: MessageKind) -> SuppressGuard<'_> {
        *self.suppressed.lock().entry(kind).or_insert(0) += 1;
        SuppressGuard { sender: self, kind }
    }
}

/// RAII scope for one suppressed message kind.
pub struct SuppressGuard<'a> {
    sender: &'a PacketSender,
    kind: MessageKind,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        let mut suppressed = self.sender.suppressed.lock();
        if let Some(count) = suppressed.get_mut(&self.kind) {
            *count = count.saturating_sub(1);
        }
    }
}
