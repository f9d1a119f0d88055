//! ## About
//!
//! This crate provides a generic, mutable N-ary tree ([Tree]) whose nodes carry a text key and
//! a value of arbitrary type. The nodes are stored in an arena and addressed by [NodeId]
//! handles.
//!
//! Two families of cursors traverse the tree:
//! * child-list cursors ([ChildCursor], [ChildCursorMut]) visit the immediate children of one
//!   node, optionally only those with a given key,
//! * depth-first cursors ([DepthFirstCursor], [DepthFirstCursorMut]) visit a subtree in
//!   pre-order.
//!
//! The mutable variants can remove the node they denote and stay valid, pointing at the node
//! the traversal would have visited next.
//!
//! ```
//! use arbor::{Nodelike, Tree};
//!
//! let mut tree = Tree::with_key("R", 0);
//! let root = tree.root();
//! let a = tree.add_keyed_child(root, "A", 1).unwrap();
//! tree.add_keyed_child(a, "A1", 2).unwrap();
//! tree.add_keyed_child(root, "B", 3).unwrap();
//!
//! let mut cursor = tree.find_mut(&1);
//! cursor.remove().unwrap();
//! assert_eq!(cursor.node().unwrap().key(), "B");
//!
//! let keys: Vec<_> = tree.iter_depth().map(|node| node.key()).collect();
//! assert_eq!(keys, ["R", "B"]);
//! ```
//!
//! ## Naming conventions
//! * Traits – adjectives that indicate capability ([Nodelike])
//! * Structs – substantives for the entities ([Tree], [Node]) and their cursors
//! * Methods – imperative forms for mutations (`attach`, `detach`, `remove`). Getters and
//!   factories use substantives without a `get_` prefix (`root`, `node`, `first_child`), much
//!   like the standard library.

pub mod arena;
pub mod errors;

pub use arena::{
    ChildCursor, ChildCursorMut, Children, DepthFirst, DepthFirstCursor, DepthFirstCursorMut, KeyFilter, Node,
    NodeId, Nodelike, Position, Tree,
};
pub use errors::TreeError;
