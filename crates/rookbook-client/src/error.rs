//! Client-level errors.

use rookbook_overlay::OverlayError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors from [`ClientState`](crate::ClientState) operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The path does not fit the pending overlay's shape.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// No transport has been attached yet.
    #[error("not connected to server")]
    NotConnected,

    #[error("send failed: {0}")]
    Transport(#[from] TransportError),

    /// Edits were submitted while the book is read-only.
    #[error("book is read-only")]
    ReadOnly,
}
