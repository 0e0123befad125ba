//! Outbound transport seam.
//!
//! The core only needs "send this message, don't block". Delivery,
//! liveness and reconnection belong to the transport. Sends are
//! at-most-once; nothing here retries.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ProtocolError};

/// Errors from handing a message to a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Something that can queue outbound messages without blocking.
pub trait Transport: Send + Sync {
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError>;

    /// True once `send` can only fail with [`TransportError::Closed`].
    fn is_closed(&self) -> bool {
        false
    }
}

/// Transport that forwards messages into an in-process channel.
///
/// Used by tests and by embedders that run the wire themselves.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        self.tx.send(message.clone()).map_err(|_| TransportError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Shared slot for the outbound transport.
///
/// Every client snapshot holds the same slot, so attaching a transport
/// after construction is visible to all of them. This is the one piece of
/// client state that changes in place.
#[derive(Clone, Default)]
pub struct Connection {
    slot: Arc<RwLock<Option<Arc<dyn Transport>>>>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, transport: Arc<dyn Transport>) {
        *self.slot.write() = Some(transport);
    }

    pub fn detach(&self) {
        *self.slot.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Current transport, if attached.
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.slot.read().clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("attached", &self.is_attached()).finish()
    }
}
