//! Scoped, read-only projections of the overlay.

use serde_json::Value;

use crate::{KeyedTree, OverlayError, Path, PendingEntry, Result};

/// A path prefix plus the overlay subtree found there (if any).
///
/// Views borrow nothing and own only their prefix; the subtree is a shared
/// handle into the overlay they were taken from. Two views compare equal
/// when they address the same path and hold the same subtree node, which is
/// the cheap "did anything pending change here" test for renderers.
#[derive(Debug, Clone)]
pub struct OverlayView {
    prefix: Path,
    subtree: Option<KeyedTree<PendingEntry>>,
}

impl OverlayView {
    pub(crate) fn new(prefix: Path, subtree: Option<KeyedTree<PendingEntry>>) -> Self {
        Self { prefix, subtree }
    }

    /// The absolute path this view addresses.
    pub fn path(&self) -> &Path {
        &self.prefix
    }

    /// Narrow the view by one segment.
    ///
    /// Scoping into a pending leaf is a `TypeMismatch`; scoping into a
    /// missing subtree yields an empty view.
    pub fn scope(&self, segment: &str) -> Result<OverlayView> {
        let subtree = match &self.subtree {
            Some(tree) if tree.is_leaf() => {
                return Err(OverlayError::TypeMismatch { path: self.prefix.clone() });
            }
            Some(tree) => tree.get(segment)?.cloned(),
            None => None,
        };
        Ok(OverlayView { prefix: self.prefix.child(segment), subtree })
    }

    /// The pending entry at this view's path.
    pub fn pending(&self) -> Option<&PendingEntry> {
        self.subtree.as_ref().and_then(KeyedTree::as_leaf)
    }

    /// The pending value here, or `fallback`.
    pub fn read<'a>(&'a self, fallback: &'a Value) -> &'a Value {
        self.pending().map_or(fallback, |entry| &entry.value)
    }

    /// Whether anything is pending at or below this path.
    pub fn has_pending(&self) -> bool {
        self.subtree.as_ref().is_some_and(|tree| tree.leaf_count() > 0)
    }

    pub fn subtree(&self) -> Option<&KeyedTree<PendingEntry>> {
        self.subtree.as_ref()
    }
}

impl PartialEq for OverlayView {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && match (&self.subtree, &other.subtree) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            }
    }
}
