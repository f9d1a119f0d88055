//! Depth-first (pre-order) cursors over the subtree of a declared root.
//!
//! A cursor keeps one [ChildPosition] per level between its root and the current node. To
//! advance, it descends into the first child if there is one, and otherwise moves the
//! innermost position to the next sibling, climbing up as long as a level is exhausted. When
//! the root level is exhausted the cursor reaches [Position::End].
//!
//! Because the positions are slots in the child lists, a removal through
//! [DepthFirstCursorMut::remove] only has to re-validate the innermost slot: the next sibling
//! of the removed node slides into it. The traversal then continues as if the removed subtree
//! had been visited completely.

use super::children::{ChildPosition, KeyFilter};
use super::{Node, NodeId, Tree};
use crate::TreeError;
use core::fmt;
use tracing::{debug, trace};

/// What a cursor denotes: a node, or the terminal position shared by all trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Node(NodeId),
    End,
}

impl Position {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Position::Node(id) => Some(id),
            Position::End => None,
        }
    }

    pub fn is_end(self) -> bool {
        self == Position::End
    }
}

/// Cursors of different trees never denote the same node, even if the handles coincide.
/// Terminal positions are equal regardless of the tree.
pub(super) fn same_position<Elem>(tree: &Tree<Elem>, lhs: Position, other: &Tree<Elem>, rhs: Position) -> bool {
    match (lhs, rhs) {
        (Position::End, Position::End) => true,
        (Position::Node(lhs), Position::Node(rhs)) => lhs == rhs && std::ptr::eq(tree, other),
        _ => false,
    }
}

/// Traversal state shared by both cursor variants
#[derive(Debug, Clone)]
struct Traversal {
    root: NodeId,
    current: Option<NodeId>,
    /// `path[i]` is the position in the child list of the `i`-th node on the path from `root`
    path: Vec<ChildPosition>,
}

impl Traversal {
    fn new<Elem>(tree: &Tree<Elem>, root: NodeId) -> Self {
        Traversal {
            root,
            current: tree.get(root).map(|_| root),
            path: Vec::with_capacity(tree.max_depth),
        }
    }

    fn position(&self) -> Position {
        self.current.map_or(Position::End, Position::Node)
    }

    fn advance<Elem>(&mut self, tree: &Tree<Elem>) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let has_children = tree.get(current).is_some_and(|node| !node.children.is_empty());
        if has_children {
            let position = ChildPosition::first(tree, current, KeyFilter::Any);
            self.current = position.current(tree);
            self.path.push(position);
            return true;
        }
        self.climb(tree)
    }

    /// Moves to the next sibling of the current node or of its closest ancestor that has one.
    fn climb<Elem>(&mut self, tree: &Tree<Elem>) -> bool {
        while let Some(position) = self.path.last_mut() {
            if position.move_next(tree) {
                self.current = position.current(tree);
                return true;
            }
            self.path.pop();
        }
        self.current = None;
        false
    }

    fn remove<Elem>(&mut self, tree: &mut Tree<Elem>) -> Result<(), TreeError> {
        let current = self
            .current
            .ok_or(TreeError::InvalidOperation("removing through an end cursor"))?;
        if current == self.root || current == tree.root() {
            return Err(TreeError::NoSuchNode(current));
        }
        let position = self.path.last_mut().ok_or(TreeError::NoSuchNode(current))?;
        let slot = position
            .slot
            .ok_or(TreeError::InvalidOperation("removing through an end cursor"))?;
        tree.remove_child_at(position.parent, slot)?;

        // the next sibling (if any) now occupies the slot
        if position.resume(tree) {
            self.current = position.current(tree);
        } else {
            self.path.pop();
            self.climb(tree);
        }
        debug!(removed = %current, next = ?self.position(), "Removed descendant");
        Ok(())
    }

    fn seek<Elem>(&mut self, tree: &Tree<Elem>, predicate: impl Fn(&Node<Elem>) -> bool) {
        while let Some(current) = self.current {
            if tree.get(current).is_some_and(&predicate) {
                break;
            }
            self.advance(tree);
        }
    }
}

/// Read-only depth-first cursor.
pub struct DepthFirstCursor<'a, Elem> {
    tree: &'a Tree<Elem>,
    traversal: Traversal,
}

impl<'a, Elem> DepthFirstCursor<'a, Elem> {
    /// Cursor at `root`, visiting the subtree of `root` only
    pub fn new(tree: &'a Tree<Elem>, root: NodeId) -> Result<Self, TreeError> {
        tree.node(root)?;
        Ok(Self::starting_at(tree, root))
    }

    pub(super) fn starting_at(tree: &'a Tree<Elem>, root: NodeId) -> Self {
        DepthFirstCursor {
            tree,
            traversal: Traversal::new(tree, root),
        }
    }

    /// Moves to the pre-order successor. Returns `false` once [Position::End] is reached; the
    /// cursor stays there.
    pub fn move_next(&mut self) -> bool {
        let moved = self.traversal.advance(self.tree);
        trace!(position = ?self.position(), "Depth-first cursor moved");
        moved
    }

    /// The denoted node. Fails with [TreeError::InvalidOperation] at [Position::End].
    pub fn node(&self) -> Result<&'a Node<Elem>, TreeError> {
        self.traversal
            .current
            .and_then(|id| self.tree.get(id))
            .ok_or(TreeError::InvalidOperation("dereferencing an end cursor"))
    }

    pub fn value(&self) -> Result<&'a Elem, TreeError> {
        Ok(&self.node()?.value)
    }

    pub fn position(&self) -> Position {
        self.traversal.position()
    }

    pub fn is_end(&self) -> bool {
        self.traversal.current.is_none()
    }

    /// The declared root; fixed for the lifetime of the cursor
    pub fn root(&self) -> NodeId {
        self.traversal.root
    }

    /// Distance of the current node from the declared root
    pub fn depth(&self) -> usize {
        self.traversal.path.len()
    }

    pub(super) fn seek(&mut self, predicate: impl Fn(&Node<Elem>) -> bool) {
        self.traversal.seek(self.tree, predicate);
    }
}

impl<Elem> Clone for DepthFirstCursor<'_, Elem> {
    fn clone(&self) -> Self {
        DepthFirstCursor {
            tree: self.tree,
            traversal: self.traversal.clone(),
        }
    }
}

impl<Elem> fmt::Debug for DepthFirstCursor<'_, Elem> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthFirstCursor")
            .field("root", &self.traversal.root)
            .field("position", &self.position())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Depth-first cursor that may modify the tree.
pub struct DepthFirstCursorMut<'a, Elem> {
    tree: &'a mut Tree<Elem>,
    traversal: Traversal,
}

impl<'a, Elem> DepthFirstCursorMut<'a, Elem> {
    pub fn new(tree: &'a mut Tree<Elem>, root: NodeId) -> Result<Self, TreeError> {
        tree.node(root)?;
        Ok(Self::starting_at(tree, root))
    }

    pub(super) fn starting_at(tree: &'a mut Tree<Elem>, root: NodeId) -> Self {
        let traversal = Traversal::new(tree, root);
        DepthFirstCursorMut { tree, traversal }
    }

    pub fn move_next(&mut self) -> bool {
        let moved = self.traversal.advance(&*self.tree);
        trace!(position = ?self.position(), "Depth-first cursor moved");
        moved
    }

    pub fn node(&self) -> Result<&Node<Elem>, TreeError> {
        self.traversal
            .current
            .and_then(|id| self.tree.get(id))
            .ok_or(TreeError::InvalidOperation("dereferencing an end cursor"))
    }

    pub fn value_mut(&mut self) -> Result<&mut Elem, TreeError> {
        let id = self
            .traversal
            .current
            .ok_or(TreeError::InvalidOperation("dereferencing an end cursor"))?;
        Ok(&mut self.tree.node_mut(id)?.value)
    }

    pub fn position(&self) -> Position {
        self.traversal.position()
    }

    pub fn is_end(&self) -> bool {
        self.traversal.current.is_none()
    }

    pub fn root(&self) -> NodeId {
        self.traversal.root
    }

    pub fn depth(&self) -> usize {
        self.traversal.path.len()
    }

    /// Appends a child to the current node. The traversal will visit it in due course.
    pub fn add_child(&mut self, key: impl Into<String>, value: Elem) -> Result<NodeId, TreeError> {
        let current = self
            .traversal
            .current
            .ok_or(TreeError::InvalidOperation("adding a child to an end cursor"))?;
        self.tree.add_keyed_child(current, key, value)
    }

    /// Destroys the current node with its subtree and moves to the node that pre-order would
    /// visit after that subtree.
    ///
    /// Fails with [TreeError::NoSuchNode] when the cursor denotes its declared root (or the root
    /// of the tree) and with [TreeError::InvalidOperation] at [Position::End]. The tree is left
    /// unchanged in both cases.
    pub fn remove(&mut self) -> Result<(), TreeError> {
        self.traversal.remove(self.tree)
    }

    /// Read-only view of this cursor for the duration of the borrow.
    pub fn as_cursor(&self) -> DepthFirstCursor<'_, Elem> {
        DepthFirstCursor {
            tree: &*self.tree,
            traversal: self.traversal.clone(),
        }
    }

    pub(super) fn seek(&mut self, predicate: impl Fn(&Node<Elem>) -> bool) {
        self.traversal.seek(&*self.tree, predicate);
    }
}

impl<Elem> fmt::Debug for DepthFirstCursorMut<'_, Elem> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthFirstCursorMut")
            .field("root", &self.traversal.root)
            .field("position", &self.position())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Mutable cursors can be downgraded. The reverse is not possible.
impl<'a, Elem> From<DepthFirstCursorMut<'a, Elem>> for DepthFirstCursor<'a, Elem> {
    fn from(cursor: DepthFirstCursorMut<'a, Elem>) -> Self {
        DepthFirstCursor {
            tree: cursor.tree,
            traversal: cursor.traversal,
        }
    }
}

impl<Elem> PartialEq for DepthFirstCursor<'_, Elem> {
    fn eq(&self, other: &Self) -> bool {
        same_position(self.tree, self.position(), other.tree, other.position())
    }
}

impl<Elem> PartialEq<DepthFirstCursorMut<'_, Elem>> for DepthFirstCursor<'_, Elem> {
    fn eq(&self, other: &DepthFirstCursorMut<'_, Elem>) -> bool {
        same_position(self.tree, self.position(), &*other.tree, other.position())
    }
}

impl<Elem> PartialEq for DepthFirstCursorMut<'_, Elem> {
    fn eq(&self, other: &Self) -> bool {
        same_position(&*self.tree, self.position(), &*other.tree, other.position())
    }
}

impl<Elem> PartialEq<DepthFirstCursor<'_, Elem>> for DepthFirstCursorMut<'_, Elem> {
    fn eq(&self, other: &DepthFirstCursor<'_, Elem>) -> bool {
        same_position(&*self.tree, self.position(), other.tree, other.position())
    }
}

impl<Elem> PartialEq<Position> for DepthFirstCursor<'_, Elem> {
    fn eq(&self, other: &Position) -> bool {
        self.position() == *other
    }
}

impl<Elem> PartialEq<Position> for DepthFirstCursorMut<'_, Elem> {
    fn eq(&self, other: &Position) -> bool {
        self.position() == *other
    }
}

/// Iterator for a depth-first (pre-order) iteration
pub struct DepthFirst<'a, Elem> {
    cursor: DepthFirstCursor<'a, Elem>,
}

impl<'a, Elem> From<DepthFirstCursor<'a, Elem>> for DepthFirst<'a, Elem> {
    fn from(cursor: DepthFirstCursor<'a, Elem>) -> Self {
        DepthFirst { cursor }
    }
}

impl<'a, Elem> Iterator for DepthFirst<'a, Elem> {
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

    /// Layout of the tree
    ///      R
    ///    / | \
    ///   A  B  C
    ///   |
    ///   A1
    fn scenario() -> Tree<&'static str> {
        let mut tree = Tree::with_key("R", "r");
        let root = tree.root();
        let a = tree.add_keyed_child(root, "A", "a").unwrap();
        tree.add_keyed_child(a, "A1", "a1").unwrap();
        tree.add_keyed_child(root, "B", "b").unwrap();
        tree.add_keyed_child(root, "C", "c").unwrap();
        tree
    }

    fn keys<Elem>(tree: &Tree<Elem>) -> Vec<String> {
        tree.iter_depth().map(|n| n.key().to_string()).collect_vec()
    }

    #[test_log::test]
    fn test_preorder() {
        let tree = scenario();
        assert_eq!(keys(&tree), &["R", "A", "A1", "B", "C"]);

        let mut cursor = tree.begin();
        let mut depths = vec![cursor.depth()];
        while cursor.move_next() {
            depths.push(cursor.depth());
        }
        assert_eq!(depths, &[0, 1, 2, 1, 1]);
        assert!(cursor.is_end());
        assert_eq!(cursor, Tree::<&str>::end());
        assert!(!cursor.move_next());
        assert!(cursor.is_end());
        assert_eq!(
            cursor.node().map(|n| n.id()),
            Err(TreeError::InvalidOperation("dereferencing an end cursor"))
        );
    }

    #[test_log::test]
    fn test_subtree_traversal_stays_below_root() {
        let tree = scenario();
        let a = tree.find(&"a").position().node().unwrap();
        let visited = tree.iter_depth_sub(a).unwrap().map(|n| n.key()).collect_vec();
        assert_eq!(visited, &["A", "A1"]);

        let leaf = tree.find(&"c").position().node().unwrap();
        let mut cursor = tree.depth_first(leaf).unwrap();
        assert_eq!(cursor.root(), leaf);
        assert!(!cursor.move_next());
    }

    #[test_log::test]
    fn test_remove_descendant_continues_at_successor() {
        let mut tree = scenario();
        let mut cursor = tree.begin_mut();
        cursor.move_next();
        assert_eq!(cursor.node().unwrap().key(), "A");

        cursor.remove().unwrap();
        assert_eq!(cursor.node().unwrap().key(), "B");
        assert_eq!(cursor.depth(), 1);
        assert!(cursor.move_next());
        assert_eq!(cursor.node().unwrap().key(), "C");
        assert!(!cursor.move_next());

        assert_eq!(keys(&tree), &["R", "B", "C"]);
        assert_eq!(tree.attached_count(), 3);
    }

    #[test_log::test]
    fn test_remove_last_descendants_climbs() {
        let mut tree = scenario();
        let a1 = tree.find(&"a1").position().node().unwrap();
        tree.add_keyed_child(a1, "A11", "a11").unwrap();

        // A11 is the last child of A1, which is the last child of A: next is B
        let mut cursor = tree.find_mut(&"a11");
        cursor.remove().unwrap();
        assert_eq!(cursor.node().unwrap().key(), "B");

        // C is the last node of the traversal
        let mut cursor = tree.find_mut(&"c");
        cursor.remove().unwrap();
        assert!(cursor.is_end());
        assert_eq!(keys(&tree), &["R", "A", "A1", "B"]);
    }

    #[test_log::test]
    fn test_remove_root_fails() {
        let mut tree = scenario();
        let mut cursor = tree.begin_mut();
        let root = cursor.root();
        assert_eq!(cursor.remove(), Err(TreeError::NoSuchNode(root)));
        assert_eq!(cursor.position(), Position::Node(root));

        // the declared root of a subtree cursor cannot be removed either
        let a = tree.find(&"a").position().node().unwrap();
        let mut cursor = tree.depth_first_mut(a).unwrap();
        assert_eq!(cursor.remove(), Err(TreeError::NoSuchNode(a)));

        while cursor.move_next() {}
        assert_eq!(
            cursor.remove(),
            Err(TreeError::InvalidOperation("removing through an end cursor"))
        );
        assert_eq!(keys(&tree), &["R", "A", "A1", "B", "C"]);
    }

    #[test_log::test]
    fn test_remove_below_subtree_root_ends_traversal() {
        let mut tree = scenario();
        let a = tree.find(&"a").position().node().unwrap();
        let mut cursor = tree.depth_first_mut(a).unwrap();
        assert!(cursor.move_next());
        assert_eq!(cursor.node().unwrap().key(), "A1");

        // the siblings of `A` lie outside the traversal
        cursor.remove().unwrap();
        assert!(cursor.is_end());
        assert_eq!(cursor.position(), Position::End);
        assert!(!cursor.move_next());
        assert_eq!(keys(&tree), &["R", "A", "B", "C"]);
    }

    #[test_log::test]
    fn test_add_child_during_traversal() {
        let mut tree = scenario();
        let mut cursor = tree.find_mut(&"b");
        cursor.add_child("B1", "b1").unwrap();
        *cursor.value_mut().unwrap() = "beta";

        let mut visited = vec![];
        while cursor.move_next() {
            visited.push(cursor.node().unwrap().key().to_string());
        }
        assert_eq!(visited, &["B1", "C"]);
        assert_eq!(keys(&tree), &["R", "A", "A1", "B", "B1", "C"]);
        assert!(tree.find(&"beta") != Tree::<&str>::end());
    }

    #[test_log::test]
    fn test_conversion_and_equality() {
        let mut tree = scenario();
        let other = scenario();
        assert_ne!(tree.begin(), other.begin());

        let mut cursor = tree.begin_mut();
        cursor.move_next();
        let view = cursor.as_cursor();
        assert!(view == cursor);
        assert_eq!(view.node().unwrap().key(), "A");

        let read_only: DepthFirstCursor<'_, &str> = cursor.into();
        let mut fresh = read_only.clone();
        assert_eq!(read_only, fresh);
        fresh.move_next();
        assert_ne!(read_only, fresh);
        while fresh.move_next() {}
        assert_eq!(fresh, other.find(&"missing"));
    }
}
