//! Optimistic-edit overlay for the rookbook client.
//!
//! The server owns the book. Edits made locally are shown immediately by
//! layering them, tagged with the epoch they were submitted at, over the
//! server-confirmed data. When the server acknowledges an epoch every
//! pending edit at or below it is pruned away.
//!
//! # Layers
//!
//! ```text
//! Path            ["t1", "5", "name"]      widget → row → column
//!   │
//! KeyedTree<L>    persistent map of maps   set_at_path / map_leaves
//!   │
//! PendingOverlay  KeyedTree<PendingEntry>  submit / read / prune_acknowledged
//!   │
//! OverlayView     prefix + shared subtree  scope / read
//! ```
//!
//! Every tree is immutable. Updates copy only the path from the changed
//! leaf to the root; untouched subtrees keep their `Arc` so consumers can
//! compare them with [`KeyedTree::ptr_eq`] and skip unchanged work.

mod epoch;
mod error;
mod overlay;
mod path;
mod tree;
mod view;

pub use epoch::{Epoch, EpochCounter};
pub use error::OverlayError;
pub use overlay::{PendingEntry, PendingOverlay};
pub use path::Path;
pub use tree::{KeyedTree, LeafUpdate};
pub use view::OverlayView;

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;
