//! Error types for overlay operations.

use thiserror::Error;

use crate::Path;

/// Errors raised by path operations on a keyed tree.
///
/// Both variants are caller bugs: the path does not fit the tree's
/// current shape. They are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// A path tried to descend through a leaf, or a leaf was scoped into.
    ///
    /// `path` is the prefix that resolved to the leaf.
    #[error("cannot descend into leaf at {path}")]
    TypeMismatch { path: Path },

    /// A leaf edit addressed the overlay root.
    #[error("pending edits need a non-empty path")]
    EmptyPath,
}
