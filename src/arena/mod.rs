//! [Arena memory allocated](https://en.wikipedia.org/wiki/Region-based_memory_management)
//! N-ary tree with child-list and depth-first cursors.
//!
//! The read-only cursors ([ChildCursor], [DepthFirstCursor]) borrow the tree immutably, the
//! mutable ones ([ChildCursorMut], [DepthFirstCursorMut]) hold its exclusive borrow. Structural
//! changes during a traversal are therefore only possible through a mutable cursor, which
//! repositions itself on the next valid node.

pub mod children;
pub mod depth;
pub mod iterables;
pub mod tree;
mod utils;

pub use children::{ChildCursor, ChildCursorMut, Children, KeyFilter};
pub use depth::{DepthFirst, DepthFirstCursor, DepthFirstCursorMut, Position};
pub use iterables::Nodelike;
pub use tree::{Node, NodeId, Tree};
