//! Definition of the interfaces shared by the nodes of a tree

use super::NodeId;

/// Container that holds data in a [crate::Tree]
pub trait Nodelike<Elem> {
    fn is_leaf(&self) -> bool;
    fn get(&self) -> &Elem;

    /// Text identifier used for key-qualified child lookup. Not required to be unique.
    fn key(&self) -> &str;

    fn id(&self) -> NodeId;

    /// Handle of the owning node, `None` for a root or the top of a detached subtree.
    fn parent(&self) -> Option<NodeId>;
}
