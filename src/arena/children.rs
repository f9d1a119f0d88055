//! Cursors over the immediate children of one node, optionally restricted to the children
//! with a given key.
//!
//! [ChildCursor] borrows the tree immutably and can be copied around freely.
//! [ChildCursorMut] holds the only (mutable) borrow of the tree and is the one place where a
//! child can be removed during the iteration: [ChildCursorMut::remove] leaves the cursor at the
//! next matching child, so the cursor never dangles.

use super::depth::{same_position, Position};
use super::{Node, NodeId, Tree};
use crate::TreeError;
use core::fmt;
use tracing::trace;

/// Restricts the children a cursor visits. `Exact("")` only matches children with an empty
/// key and is different from `Any`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum KeyFilter {
    #[default]
    Any,
    Exact(String),
}

impl KeyFilter {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::Any => true,
            KeyFilter::Exact(expected) => expected == key,
        }
    }
}

impl From<&str> for KeyFilter {
    fn from(key: &str) -> Self {
        KeyFilter::Exact(key.to_string())
    }
}

/// Position within the child list of `parent`. `slot` is an index into that list, `None` is
/// the terminal position.
///
/// Also used for each level of the depth-first cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ChildPosition {
    pub(super) parent: NodeId,
    pub(super) slot: Option<usize>,
    filter: KeyFilter,
}

impl ChildPosition {
    pub(super) fn first<Elem>(tree: &Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Self {
        let mut position = ChildPosition {
            parent,
            slot: None,
            filter,
        };
        position.slot = position.seek_forward(tree, 0);
        position
    }

    pub(super) fn last<Elem>(tree: &Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Self {
        let mut position = ChildPosition {
            parent,
            slot: None,
            filter,
        };
        position.slot = position.seek_backward(tree, usize::MAX);
        position
    }

    fn siblings<'a, Elem>(&self, tree: &'a Tree<Elem>) -> &'a [NodeId] {
        tree.get(self.parent).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    fn accepts<Elem>(&self, tree: &Tree<Elem>, id: NodeId) -> bool {
        tree.get(id).is_some_and(|node| self.filter.matches(&node.key))
    }

    /// First matching slot at or after `from`
    fn seek_forward<Elem>(&self, tree: &Tree<Elem>, from: usize) -> Option<usize> {
        let siblings = self.siblings(tree);
        (from..siblings.len()).find(|slot| self.accepts(tree, siblings[*slot]))
    }

    /// Last matching slot strictly before `before`
    fn seek_backward<Elem>(&self, tree: &Tree<Elem>, before: usize) -> Option<usize> {
        let siblings = self.siblings(tree);
        (0..before.min(siblings.len()))
            .rev()
            .find(|slot| self.accepts(tree, siblings[*slot]))
    }

    pub(super) fn current<Elem>(&self, tree: &Tree<Elem>) -> Option<NodeId> {
        self.slot.and_then(|slot| self.siblings(tree).get(slot).copied())
    }

    pub(super) fn move_next<Elem>(&mut self, tree: &Tree<Elem>) -> bool {
        if let Some(slot) = self.slot {
            self.slot = self.seek_forward(tree, slot + 1);
        }
        self.slot.is_some()
    }

    pub(super) fn move_prev<Elem>(&mut self, tree: &Tree<Elem>) -> bool {
        if let Some(slot) = self.slot {
            self.slot = self.seek_backward(tree, slot);
        }
        self.slot.is_some()
    }

    /// After the child in the current slot has been removed, its successor moved into that
    /// slot. Re-validates the slot against the filter.
    pub(super) fn resume<Elem>(&mut self, tree: &Tree<Elem>) -> bool {
        if let Some(slot) = self.slot {
            self.slot = self.seek_forward(tree, slot);
        }
        self.slot.is_some()
    }

    fn position<Elem>(&self, tree: &Tree<Elem>) -> Position {
        self.current(tree).map_or(Position::End, Position::Node)
    }
}

/// Read-only cursor over the children of a node.
pub struct ChildCursor<'a, Elem> {
    tree: &'a Tree<Elem>,
    position: ChildPosition,
}

impl<'a, Elem> ChildCursor<'a, Elem> {
    /// Cursor at the first child of `parent` that passes `filter`
    pub fn first(tree: &'a Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Result<Self, TreeError> {
        tree.node(parent)?;
        Ok(ChildCursor {
            tree,
            position: ChildPosition::first(tree, parent, filter),
        })
    }

    /// Cursor at the last child of `parent` that passes `filter`
    pub fn last(tree: &'a Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Result<Self, TreeError> {
        tree.node(parent)?;
        Ok(ChildCursor {
            tree,
            position: ChildPosition::last(tree, parent, filter),
        })
    }

    pub fn move_next(&mut self) -> bool {
        let moved = self.position.move_next(self.tree);
        trace!(position = ?self.position(), "Child cursor moved forward");
        moved
    }

    pub fn move_prev(&mut self) -> bool {
        let moved = self.position.move_prev(self.tree);
        trace!(position = ?self.position(), "Child cursor moved backward");
        moved
    }

    /// The denoted child. Fails with [TreeError::InvalidOperation] at the terminal position.
    pub fn node(&self) -> Result<&'a Node<Elem>, TreeError> {
        self.position
            .current(self.tree)
            .and_then(|id| self.tree.get(id))
            .ok_or(TreeError::InvalidOperation("dereferencing a terminal child cursor"))
    }

    pub fn value(&self) -> Result<&'a Elem, TreeError> {
        Ok(&self.node()?.value)
    }

    pub fn position(&self) -> Position {
        self.position.position(self.tree)
    }

    pub fn is_terminal(&self) -> bool {
        self.position.slot.is_none()
    }

    /// The node whose children are visited
    pub fn parent(&self) -> NodeId {
        self.position.parent
    }

    pub fn filter(&self) -> &KeyFilter {
        &self.position.filter
    }
}

impl<Elem> Clone for ChildCursor<'_, Elem> {
    fn clone(&self) -> Self {
        ChildCursor {
            tree: self.tree,
            position: self.position.clone(),
        }
    }
}

impl<Elem> fmt::Debug for ChildCursor<'_, Elem> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCursor")
            .field("parent", &self.position.parent)
            .field("position", &self.position())
            .field("filter", &self.position.filter)
            .finish()
    }
}

/// Cursor over the children of a node that may modify the tree.
pub struct ChildCursorMut<'a, Elem> {
    tree: &'a mut Tree<Elem>,
    position: ChildPosition,
}

impl<'a, Elem> ChildCursorMut<'a, Elem> {
    pub fn first(tree: &'a mut Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Result<Self, TreeError> {
        tree.node(parent)?;
        let position = ChildPosition::first(tree, parent, filter);
        Ok(ChildCursorMut { tree, position })
    }

    pub fn last(tree: &'a mut Tree<Elem>, parent: NodeId, filter: KeyFilter) -> Result<Self, TreeError> {
        tree.node(parent)?;
        let position = ChildPosition::last(tree, parent, filter);
        Ok(ChildCursorMut { tree, position })
    }

    pub fn move_next(&mut self) -> bool {
        let moved = self.position.move_next(&*self.tree);
        trace!(position = ?self.position(), "Child cursor moved forward");
        moved
    }

    pub fn move_prev(&mut self) -> bool {
        let moved = self.position.move_prev(&*self.tree);
        trace!(position = ?self.position(), "Child cursor moved backward");
        moved
    }

    pub fn node(&self) -> Result<&Node<Elem>, TreeError> {
        self.position
            .current(&*self.tree)
            .and_then(|id| self.tree.get(id))
            .ok_or(TreeError::InvalidOperation("dereferencing a terminal child cursor"))
    }

    pub fn value_mut(&mut self) -> Result<&mut Elem, TreeError> {
        let id = self
            .position
            .current(&*self.tree)
            .ok_or(TreeError::InvalidOperation("dereferencing a terminal child cursor"))?;
        Ok(&mut self.tree.node_mut(id)?.value)
    }

    pub fn position(&self) -> Position {
        self.position.position(&*self.tree)
    }

    pub fn is_terminal(&self) -> bool {
        self.position.slot.is_none()
    }

    pub fn parent(&self) -> NodeId {
        self.position.parent
    }

    /// Destroys the denoted child and its subtree, then moves on to the next matching child
    /// (or the terminal position if it was the last one).
    pub fn remove(&mut self) -> Result<(), TreeError> {
        let slot = self
            .position
            .slot
            .ok_or(TreeError::InvalidOperation("removing through a terminal child cursor"))?;
        self.tree.remove_child_at(self.position.parent, slot)?;
        self.position.resume(&*self.tree);
        Ok(())
    }

    /// Read-only view of this cursor for the duration of the borrow.
    pub fn as_cursor(&self) -> ChildCursor<'_, Elem> {
        ChildCursor {
            tree: &*self.tree,
            position: self.position.clone(),
        }
    }
}

impl<Elem> fmt::Debug for ChildCursorMut<'_, Elem> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCursorMut")
            .field("parent", &self.position.parent)
            .field("position", &self.position())
            .field("filter", &self.position.filter)
            .finish()
    }
}

/// Mutable cursors can be downgraded. The reverse is not possible.
impl<'a, Elem> From<ChildCursorMut<'a, Elem>> for ChildCursor<'a, Elem> {
    fn from(cursor: ChildCursorMut<'a, Elem>) -> Self {
        ChildCursor {
            tree: cursor.tree,
            position: cursor.position,
        }
    }
}

impl<Elem> PartialEq for ChildCursor<'_, Elem> {
    fn eq(&self, other: &Self) -> bool {
        same_position(self.tree, self.position(), other.tree, other.position())
    }
}

impl<Elem> PartialEq<ChildCursorMut<'_, Elem>> for ChildCursor<'_, Elem> {
    fn eq(&self, other: &ChildCursorMut<'_, Elem>) -> bool {
        same_position(self.tree, self.position(), &*other.tree, other.position())
    }
}

impl<Elem> PartialEq for ChildCursorMut<'_, Elem> {
    fn eq(&self, other: &Self) -> bool {
        same_position(&*self.tree, self.position(), &*other.tree, other.position())
    }
}

impl<Elem> PartialEq<ChildCursor<'_, Elem>> for ChildCursorMut<'_, Elem> {
    fn eq(&self, other: &ChildCursor<'_, Elem>) -> bool {
        same_position(&*self.tree, self.position(), other.tree, other.position())
    }
}

impl<Elem> PartialEq<Position> for ChildCursor<'_, Elem> {
    fn eq(&self, other: &Position) -> bool {
        self.position() == *other
    }
}

impl<Elem> PartialEq<Position> for ChildCursorMut<'_, Elem> {
    fn eq(&self, other: &Position) -> bool {
        self.position() == *other
    }
}

/// Iterator over the (matching) children of a node
pub struct Children<'a, Elem> {
    cursor: ChildCursor<'a, Elem>,
}

impl<'a, Elem> From<ChildCursor<'a, Elem>> for Children<'a, Elem> {
    fn from(cursor: ChildCursor<'a, Elem>) -> Self {
        Children { cursor }
    }
}

impl<'a, Elem> Iterator for Children<'a, Elem> {
    type Item = &'a Node<Elem>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor.node().ok()?;
        self.cursor.move_next();
        Some(node)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::Nodelike;
    use itertools::Itertools;
    use test_log;

    /// Children of the root: x, y, x, z, x (values 1..=5)
    fn sample() -> Tree<i32> {
        let mut tree = Tree::with_key("root", 0);
        let root = tree.root();
        for (value, key) in ["x", "y", "x", "z", "x"].iter().enumerate() {
            tree.add_keyed_child(root, *key, value as i32 + 1).unwrap();
        }
        tree
    }

    fn values(tree: &Tree<i32>) -> Vec<i32> {
        tree.iter_children(tree.root()).unwrap().map(|n| *n.get()).collect_vec()
    }

    #[test_log::test]
    fn test_forward_and_backward() {
        let tree = sample();
        let mut cursor = tree.first_child(tree.root()).unwrap();
        assert_eq!(*cursor.value().unwrap(), 1);
        assert!(cursor.move_next());
        assert_eq!(*cursor.value().unwrap(), 2);
        assert!(cursor.move_prev());
        assert_eq!(*cursor.value().unwrap(), 1);
        assert!(!cursor.move_prev());
        assert!(cursor.is_terminal());
        assert_eq!(cursor, Tree::<i32>::end());
        // terminal is sticky
        assert!(!cursor.move_next());

        let mut cursor = tree.last_child(tree.root()).unwrap();
        assert_eq!(*cursor.value().unwrap(), 5);
        assert!(!cursor.move_next());
        assert_eq!(
            cursor.node().map(|n| n.id()),
            Err(TreeError::InvalidOperation("dereferencing a terminal child cursor"))
        );
    }

    #[test_log::test]
    fn test_key_filter() {
        let tree = sample();
        let root = tree.root();
        let matching = Children::from(tree.find_child(root, "x").unwrap())
            .map(|n| *n.get())
            .collect_vec();
        assert_eq!(matching, &[1, 3, 5]);

        let mut cursor = ChildCursor::last(&tree, root, "x".into()).unwrap();
        assert_eq!(*cursor.value().unwrap(), 5);
        assert!(cursor.move_prev());
        assert_eq!(*cursor.value().unwrap(), 3);

        // filtering by the empty key is not the same as not filtering
        assert!(tree.find_child(root, "").unwrap().is_terminal());
        assert!(tree.find_child(root, "w").unwrap().is_terminal());
        assert!(KeyFilter::Any.matches(""));
        assert!(!KeyFilter::Exact("a".into()).matches(""));
    }

    #[test_log::test]
    fn test_no_children() {
        let mut tree = Tree::new(0);
        let root = tree.root();
        let leaf = tree.add_child(root, 1).unwrap();
        assert!(tree.first_child(leaf).unwrap().is_terminal());
        assert!(tree.last_child(leaf).unwrap().is_terminal());
        assert_eq!(tree.iter_children(leaf).unwrap().count(), 0);
    }

    #[test_log::test]
    fn test_remove_advances() {
        let mut tree = sample();
        let root = tree.root();
        let before = tree.attached_count();
        let mut cursor = tree.first_child_mut(root).unwrap();
        assert!(cursor.move_next());
        cursor.remove().unwrap();
        assert_eq!(*cursor.node().unwrap().get(), 3);

        // removing the last child leaves the cursor at the terminal position
        let mut cursor = tree.last_child_mut(root).unwrap();
        cursor.remove().unwrap();
        assert!(cursor.is_terminal());
        assert_eq!(
            cursor.remove(),
            Err(TreeError::InvalidOperation("removing through a terminal child cursor"))
        );

        assert_eq!(values(&tree), &[1, 3, 4]);
        assert_eq!(tree.attached_count(), before - 2);
    }

    #[test_log::test]
    fn test_remove_with_filter() {
        let mut tree = sample();
        let root = tree.root();
        let deep = tree.first_child(root).unwrap().node().unwrap().id();
        tree.add_child(deep, 10).unwrap();

        let mut cursor = tree.find_child_mut(root, "x").unwrap();
        while !cursor.is_terminal() {
            cursor.remove().unwrap();
        }
        assert_eq!(values(&tree), &[2, 4]);
        assert_eq!(tree.attached_count(), 3);
        assert_eq!(tree.node_count(), 3);
    }

    #[test_log::test]
    fn test_value_mut_and_conversion() {
        let mut tree = sample();
        let root = tree.root();
        let mut cursor = tree.first_child_mut(root).unwrap();
        *cursor.value_mut().unwrap() = 100;
        cursor.move_next();

        let read_only = cursor.as_cursor();
        assert!(read_only == cursor);
        assert_eq!(*read_only.value().unwrap(), 2);

        let read_only: ChildCursor<'_, i32> = cursor.into();
        assert_eq!(*read_only.value().unwrap(), 2);
        assert_eq!(values(&tree), &[100, 2, 3, 4, 5]);
    }

    #[test_log::test]
    fn test_equality() {
        let tree = sample();
        let other = sample();
        let root = tree.root();

        let mut first = tree.first_child(root).unwrap();
        let second = first.clone();
        assert_eq!(first, second);
        first.move_next();
        assert_ne!(first, second);

        // same handles in a different tree denote different nodes
        assert_ne!(second, other.first_child(other.root()).unwrap());

        // all terminal positions compare equal
        let empty = Tree::new(0);
        assert_eq!(
            tree.find_child(root, "w").unwrap(),
            empty.first_child(empty.root()).unwrap()
        );
    }
}
