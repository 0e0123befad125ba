//! Persistent keyed tree with structural sharing.
//!
//! A node is explicitly either a leaf or an internal map of segment →
//! child, so "is this a leaf" is never guessed from the payload's shape.
//! Nodes sit behind `Arc`; every update copies only the nodes on the
//! changed path, and everything else is shared with the previous version.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{OverlayError, Path, Result};

#[derive(Debug)]
enum Node<L> {
    Leaf(L),
    Internal(BTreeMap<String, KeyedTree<L>>),
}

/// Handle to an immutable tree node. Cloning is an `Arc` bump.
#[derive(Debug)]
pub struct KeyedTree<L> {
    node: Arc<Node<L>>,
}

impl<L> Clone for KeyedTree<L> {
    fn clone(&self) -> Self {
        Self { node: Arc::clone(&self.node) }
    }
}

impl<L> Default for KeyedTree<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`KeyedTree::map_leaves`] should do with one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafUpdate<L> {
    /// Leave the leaf (and its `Arc`) as it is.
    Keep,
    /// Swap in a new leaf value.
    Replace(L),
    /// Drop the leaf from the tree.
    Remove,
}

enum Mapped<L> {
    Unchanged,
    Changed(KeyedTree<L>),
    Removed,
}

impl<L> KeyedTree<L> {
    /// An empty internal node.
    pub fn new() -> Self {
        Self::internal(BTreeMap::new())
    }

    pub fn leaf(value: L) -> Self {
        Self { node: Arc::new(Node::Leaf(value)) }
    }

    fn internal(children: BTreeMap<String, KeyedTree<L>>) -> Self {
        Self { node: Arc::new(Node::Internal(children)) }
    }

    /// Reference identity: both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(*self.node, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match &*self.node {
            Node::Leaf(value) => Some(value),
            Node::Internal(_) => None,
        }
    }

    /// True for an internal node without children.
    pub fn is_empty(&self) -> bool {
        match &*self.node {
            Node::Leaf(_) => false,
            Node::Internal(children) => children.is_empty(),
        }
    }

    /// Child under `segment`. Missing keys are `Ok(None)`; asking a leaf
    /// for a child is a `TypeMismatch` at the root of this tree.
    pub fn get(&self, segment: &str) -> Result<Option<&KeyedTree<L>>> {
        match &*self.node {
            Node::Leaf(_) => Err(OverlayError::TypeMismatch { path: Path::root() }),
            Node::Internal(children) => Ok(children.get(segment)),
        }
    }

    /// Walk `path` from this node.
    ///
    /// Returns `Ok(None)` as soon as a segment is missing. Walking through a
    /// leaf fails with the prefix that resolved to it.
    pub fn get_path(&self, path: &[String]) -> Result<Option<&KeyedTree<L>>> {
        let mut current = self;
        for (depth, segment) in path.iter().enumerate() {
            match &*current.node {
                Node::Leaf(_) => {
                    return Err(OverlayError::TypeMismatch { path: path[..depth].iter().cloned().collect() });
                }
                Node::Internal(children) => match children.get(segment) {
                    Some(child) => current = child,
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(current))
    }

    /// A new tree with `leaf` stored at `path`.
    ///
    /// Missing intermediate nodes are created empty. An existing leaf at
    /// `path` is replaced; an empty `path` replaces this node itself.
    pub fn set_at_path(&self, path: &[String], leaf: L) -> Result<Self> {
        self.set_from(path, 0, leaf)
    }

    fn set_from(&self, path: &[String], depth: usize, leaf: L) -> Result<Self> {
        let Some(segment) = path.get(depth) else {
            return Ok(Self::leaf(leaf));
        };
        let children = match &*self.node {
            Node::Leaf(_) => {
                return Err(OverlayError::TypeMismatch { path: path[..depth].iter().cloned().collect() });
            }
            Node::Internal(children) => children,
        };
        let child = match children.get(segment) {
            Some(existing) => existing.set_from(path, depth + 1, leaf)?,
            None => Self::new().set_from(path, depth + 1, leaf)?,
        };
        let mut children = children.clone();
        children.insert(segment.clone(), child);
        Ok(Self::internal(children))
    }

    /// Apply `f` to every leaf.
    ///
    /// When every leaf is kept the result is `ptr_eq` to `self`. Otherwise
    /// only ancestors of changed leaves are rebuilt. Removed leaves vanish,
    /// and so do internal nodes left without children, except `self`.
    pub fn map_leaves<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&L) -> LeafUpdate<L>,
    {
        match self.map_inner(&mut f) {
            Mapped::Unchanged => self.clone(),
            Mapped::Changed(tree) => tree,
            Mapped::Removed => Self::new(),
        }
    }

    fn map_inner<F>(&self, f: &mut F) -> Mapped<L>
    where
        F: FnMut(&L) -> LeafUpdate<L>,
    {
        match &*self.node {
            Node::Leaf(value) => match f(value) {
                LeafUpdate::Keep => Mapped::Unchanged,
                LeafUpdate::Replace(value) => Mapped::Changed(Self::leaf(value)),
                LeafUpdate::Remove => Mapped::Removed,
            },
            Node::Internal(children) => {
                let mut updated: Option<BTreeMap<String, KeyedTree<L>>> = None;
                for (key, child) in children {
                    match child.map_inner(f) {
                        Mapped::Unchanged => {}
                        Mapped::Changed(new_child) => {
                            updated
                                .get_or_insert_with(|| children.clone())
                                .insert(key.clone(), new_child);
                        }
                        Mapped::Removed => {
                            updated.get_or_insert_with(|| children.clone()).remove(key);
                        }
                    }
                }
                match updated {
                    None => Mapped::Unchanged,
                    Some(children) if children.is_empty() => Mapped::Removed,
                    Some(children) => Mapped::Changed(Self::internal(children)),
                }
            }
        }
    }

    /// Every leaf with its path relative to this node, in key order.
    pub fn leaves(&self) -> Vec<(Path, &L)> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.collect_leaves(&mut prefix, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(Path, &'a L)>) {
        match &*self.node {
            Node::Leaf(value) => out.push((Path::from(prefix.clone()), value)),
            Node::Internal(children) => {
                for (key, child) in children {
                    prefix.push(key.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// Number of leaves under this node.
    pub fn leaf_count(&self) -> usize {
        match &*self.node {
            Node::Leaf(_) => 1,
            Node::Internal(children) => children.values().map(KeyedTree::leaf_count).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    fn leaf_at(tree: &KeyedTree<i32>, path: &[&str]) -> Option<i32> {
        tree.get_path(&segs(path)).unwrap().and_then(|t| t.as_leaf().copied())
    }

    #[test]
    fn test_set_creates_intermediate_nodes() {
        let tree = KeyedTree::new().set_at_path(&segs(&["w", "r", "c"]), 1).unwrap();

        assert_eq!(leaf_at(&tree, &["w", "r", "c"]), Some(1));
        let row = tree.get_path(&segs(&["w", "r"])).unwrap().unwrap();
        assert!(!row.is_leaf());
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let tree: KeyedTree<i32> = KeyedTree::new();
        assert!(tree.get("nope").unwrap().is_none());
        assert!(tree.get_path(&segs(&["a", "b"])).unwrap().is_none());
    }

    #[test]
    fn test_descending_through_leaf_is_type_mismatch() {
        let tree = KeyedTree::new().set_at_path(&segs(&["a", "b"]), 1).unwrap();

        let err = tree.set_at_path(&segs(&["a", "b", "c"]), 2).unwrap_err();
        assert_eq!(err, OverlayError::TypeMismatch { path: Path::from(["a", "b"]) });

        let err = tree.get_path(&segs(&["a", "b", "c"])).unwrap_err();
        assert_eq!(err, OverlayError::TypeMismatch { path: Path::from(["a", "b"]) });

        let leaf = tree.get_path(&segs(&["a", "b"])).unwrap().unwrap();
        assert!(leaf.get("c").is_err());
    }

    #[test]
    fn test_set_replaces_existing_leaf() {
        let tree = KeyedTree::new()
            .set_at_path(&segs(&["a"]), 1)
            .unwrap()
            .set_at_path(&segs(&["a"]), 2)
            .unwrap();
        assert_eq!(leaf_at(&tree, &["a"]), Some(2));
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_set_shares_untouched_siblings() {
        let before = KeyedTree::new()
            .set_at_path(&segs(&["left", "x"]), 1)
            .unwrap()
            .set_at_path(&segs(&["right", "y"]), 2)
            .unwrap();
        let after = before.set_at_path(&segs(&["right", "y"]), 3).unwrap();

        let left_before = before.get("left").unwrap().unwrap();
        let left_after = after.get("left").unwrap().unwrap();
        assert!(left_before.ptr_eq(left_after));
        assert!(!before.ptr_eq(&after));
        assert_eq!(leaf_at(&before, &["right", "y"]), Some(2), "old version untouched");
    }

    #[test]
    fn test_map_leaves_keep_returns_same_reference() {
        let tree = KeyedTree::new()
            .set_at_path(&segs(&["a", "b"]), 1)
            .unwrap()
            .set_at_path(&segs(&["c"]), 2)
            .unwrap();
        let mapped = tree.map_leaves(|_| LeafUpdate::Keep);
        assert!(mapped.ptr_eq(&tree));
    }

    #[test]
    fn test_map_leaves_rebuilds_only_changed_path() {
        let tree = KeyedTree::new()
            .set_at_path(&segs(&["a", "b"]), 1)
            .unwrap()
            .set_at_path(&segs(&["c", "d"]), 2)
            .unwrap();
        let mapped = tree.map_leaves(|v| if *v == 2 { LeafUpdate::Replace(20) } else { LeafUpdate::Keep });

        assert!(!mapped.ptr_eq(&tree));
        assert!(mapped.get("a").unwrap().unwrap().ptr_eq(tree.get("a").unwrap().unwrap()));
        assert_eq!(leaf_at(&mapped, &["c", "d"]), Some(20));
    }

    #[test]
    fn test_map_leaves_remove_compacts_empty_branches() {
        let tree = KeyedTree::new()
            .set_at_path(&segs(&["a", "b", "c"]), 1)
            .unwrap()
            .set_at_path(&segs(&["z"]), 2)
            .unwrap();
        let mapped = tree.map_leaves(|v| if *v == 1 { LeafUpdate::Remove } else { LeafUpdate::Keep });

        assert!(mapped.get("a").unwrap().is_none());
        assert_eq!(leaf_at(&mapped, &["z"]), Some(2));

        let emptied = mapped.map_leaves(|_| LeafUpdate::Remove);
        assert!(emptied.is_empty());
        assert!(!emptied.is_leaf(), "root stays an internal node");
    }

    #[test]
    fn test_leaves_lists_paths_in_key_order() {
        let tree = KeyedTree::new()
            .set_at_path(&segs(&["b"]), 2)
            .unwrap()
            .set_at_path(&segs(&["a", "x"]), 1)
            .unwrap();
        let leaves: Vec<_> = tree.leaves().into_iter().map(|(p, v)| (p.to_string(), *v)).collect();
        assert_eq!(leaves, vec![("a/x".to_string(), 1), ("b".to_string(), 2)]);
    }
}
