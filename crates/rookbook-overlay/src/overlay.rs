//! The pending overlay: unconfirmed edits keyed by path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::{Epoch, KeyedTree, LeafUpdate, OverlayError, OverlayView, Path, Result};

/// One unconfirmed edit: the value the user entered and the epoch it was
/// submitted at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub value: Value,
    pub epoch: Epoch,
}

/// Tree of [`PendingEntry`] leaves layered over confirmed server data.
///
/// Reads consult the overlay first and fall back to the caller's confirmed
/// value. The last submit at a path always wins locally; epochs only decide
/// when an acknowledgment clears an entry.
#[derive(Debug, Clone, Default)]
pub struct PendingOverlay {
    root: KeyedTree<PendingEntry>,
}

impl PendingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &KeyedTree<PendingEntry> {
        &self.root
    }

    /// Record `value` at `path`, replacing whatever was pending there.
    pub fn submit(&self, path: &Path, value: Value, epoch: Epoch) -> Result<Self> {
        if path.is_root() {
            return Err(OverlayError::EmptyPath);
        }
        let root = self.root.set_at_path(path.segments(), PendingEntry { value, epoch })?;
        trace!(%path, %epoch, "pending edit recorded");
        Ok(Self { root })
    }

    /// The pending entry at exactly `path`, if any.
    ///
    /// An internal node at `path` means edits are pending *below* it, not at
    /// it, so that is `None` too.
    pub fn pending(&self, path: &Path) -> Result<Option<&PendingEntry>> {
        Ok(self.root.get_path(path.segments())?.and_then(KeyedTree::as_leaf))
    }

    /// The pending value at `path`, or `fallback` when nothing is pending.
    pub fn read<'a>(&'a self, path: &Path, fallback: &'a Value) -> Result<&'a Value> {
        Ok(self.pending(path)?.map_or(fallback, |entry| &entry.value))
    }

    /// Drop every entry the server has acknowledged (`epoch <= server_epoch`).
    ///
    /// Subtrees holding no covered entry keep their identity, so a stale or
    /// repeated acknowledgment returns `self` unchanged.
    pub fn prune_acknowledged(&self, server_epoch: Epoch) -> Self {
        let root = self.root.map_leaves(|entry| {
            if entry.epoch.is_covered_by(server_epoch) {
                LeafUpdate::Remove
            } else {
                LeafUpdate::Keep
            }
        });
        Self { root }
    }

    /// Read-only projection of the whole overlay.
    pub fn view(&self) -> OverlayView {
        OverlayView::new(Path::root(), Some(self.root.clone()))
    }

    /// Projection of the subtree under `segment`.
    pub fn scope(&self, segment: &str) -> Result<OverlayView> {
        self.view().scope(segment)
    }

    /// Projection at an arbitrary path.
    pub fn view_at(&self, path: &Path) -> Result<OverlayView> {
        let subtree = self.root.get_path(path.segments())?.cloned();
        Ok(OverlayView::new(path.clone(), subtree))
    }

    pub fn pending_count(&self) -> usize {
        self.root.leaf_count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Whether both overlays share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.root.ptr_eq(&other.root)
    }
}
