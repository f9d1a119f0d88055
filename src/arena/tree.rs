//! Storage of an N-ary tree in an
//! [arena allocation](https://en.wikipedia.org/wiki/Region-based_memory_management).
//!
//! The [Tree] is the sole owner of its nodes. Parent and child relations are [NodeId] handles
//! into the arena, so detaching or destroying a subtree never leaves a dangling reference:
//! a handle to a freed node simply stops resolving.
//!
//! Every tree keeps a registry of the nodes that are currently attached (reachable from the
//! root). Nodes can also live in the arena *detached*, either freshly created with
//! [Tree::create_detached] or released with [Tree::detach], and be attached later by
//! reference with [Tree::attach]. The registry rejects any attachment that would make a node
//! reachable twice or introduce a cycle.

use super::children::{ChildCursor, ChildCursorMut, Children, KeyFilter};
use super::depth::{DepthFirst, DepthFirstCursor, DepthFirstCursorMut, Position};
use super::iterables::Nodelike;
use super::utils::{flatten_cloned, flatten_taken, preorder, FlatNode};
use crate::TreeError;
use core::fmt;
use std::collections::HashSet;
use tracing::{debug, trace};
use tracing_attributes::instrument;

/// Generational handle of a node in a [Tree].
///
/// Slots of removed nodes are reused with a new generation, hence an outdated handle never
/// aliases a node created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Index in the arena allocation
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// A node structure to be used in an arena allocated tree.
#[derive(Debug, Clone)]
pub struct Node<Elem> {
    /// identifier for qualified child lookups
    pub(super) key: String,
    /// The user-defined value that the node owns
    pub(super) value: Elem,
    /// Handle in the arena allocation
    pub(super) id: NodeId,
    /// Back reference, never an ownership relation
    pub(super) parent: Option<NodeId>,
    /// references for children, in traversal order
    pub(super) children: Vec<NodeId>,
}

impl<Elem> Node<Elem> {
    fn new(key: String, value: Elem, id: NodeId, parent: Option<NodeId>) -> Self {
        Node {
            key,
            value,
            id,
            parent,
            children: vec![],
        }
    }

    pub fn value(&self) -> &Elem {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Elem {
        &mut self.value
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl<Elem> Nodelike<Elem> for Node<Elem> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn get(&self) -> &Elem {
        &self.value
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

impl<Elem> fmt::Display for Node<Elem>
where
    Elem: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node {} '{}', children: {:?}, value: {}",
            self.id,
            self.key,
            self.children.iter().map(|c| c.index).collect::<Vec<_>>(),
            self.value
        )
    }
}

#[derive(Debug, Clone)]
struct Slot<Elem> {
    generation: u32,
    node: Option<Node<Elem>>,
}

/// Mutable N-ary tree that uses arena allocation.
///
/// Cloning a tree deep copies every node into a new arena; no node is shared with the source.
///
/// The tree does no internal locking. All mutation requires `&mut self` (directly or through a
/// mutable cursor), so concurrent mutation, or mutation during a read-only traversal, is
/// rejected at compile time rather than synchronized.
#[derive(Debug, Clone)]
pub struct Tree<Elem> {
    /// Memory allocated area for nodes
    slots: Vec<Slot<Elem>>,
    /// Vacated slots, reused before the arena grows
    free: Vec<usize>,
    root: NodeId,
    /// Nodes reachable from the root
    registry: HashSet<NodeId>,
    /// Expected depth of the tree, used to pre-allocate cursor stacks
    pub(super) max_depth: usize,
}

impl<Elem> Tree<Elem> {
    /// Creates a tree that only consists of a root with an empty key.
    pub fn new(value: Elem) -> Self {
        Self::with_key(String::new(), value)
    }

    pub fn with_key(key: impl Into<String>, value: Elem) -> Self {
        Self::with_capacity(1, key, value)
    }

    /// Contructor that pre-allocates space for `capacity` nodes.
    pub fn with_capacity(capacity: usize, key: impl Into<String>, value: Elem) -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.push(Slot {
            generation: 0,
            node: Some(Node::new(key.into(), value, root, None)),
        });
        let mut registry = HashSet::with_capacity(capacity);
        registry.insert(root);

        Tree {
            slots,
            free: vec![],
            root,
            registry,
            max_depth: 42,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Hint for the expected depth. Only affects pre-allocation of depth-first cursors.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<Elem>> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<Elem>> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Like [Tree::get] but fails with [TreeError::NoSuchNode] for an unknown handle.
    pub fn node(&self, id: NodeId) -> Result<&Node<Elem>, TreeError> {
        self.get(id).ok_or(TreeError::NoSuchNode(id))
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<Elem>, TreeError> {
        self.get_mut(id).ok_or(TreeError::NoSuchNode(id))
    }

    /// Whether the handle resolves to a node in the arena, attached or detached.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Whether the node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.registry.contains(&id)
    }

    /// Number of nodes reachable from the root (the root included).
    pub fn attached_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of nodes in the arena, including detached subtrees.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.node(id)?.parent)
    }

    /// Distance to the root of the tree, or of the detached subtree the node belongs to.
    pub fn depth(&self, id: NodeId) -> Result<usize, TreeError> {
        let mut depth = 0;
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            current = self.node(parent)?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Replaces the value of a node and returns the previous one.
    pub fn set_value(&mut self, id: NodeId, value: Elem) -> Result<Elem, TreeError> {
        Ok(std::mem::replace(&mut self.node_mut(id)?.value, value))
    }

    pub fn set_key(&mut self, id: NodeId, key: impl Into<String>) -> Result<(), TreeError> {
        self.node_mut(id)?.set_key(key);
        Ok(())
    }

    /// Places a node into a vacant slot (or a new one). Linking is up to the caller.
    fn allocate(&mut self, key: String, value: Elem, parent: Option<NodeId>) -> NodeId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        let id = NodeId {
            index,
            generation: slot.generation,
        };
        slot.node = Some(Node::new(key, value, id, parent));
        id
    }

    /// Frees a single slot and deregisters the node. Links are not touched.
    pub(super) fn release(&mut self, id: NodeId) -> Option<Node<Elem>> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.registry.remove(&id);
        Some(node)
    }

    /// Appends `child` to the children of `parent` and registers its subtree if `parent` is attached.
    fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        if self.registry.contains(&parent) {
            let subtree = preorder(self, child);
            self.registry.extend(subtree);
        }
        Ok(())
    }

    /// Removes `child` from its parent's list and returns the slot it occupied.
    fn unlink(&mut self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        let parent_node = self.node_mut(parent)?;
        let slot = parent_node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(TreeError::NoSuchNode(child))?;
        parent_node.children.remove(slot);
        self.node_mut(child)?.parent = None;
        Ok(slot)
    }

    /// Frees a whole (already unlinked) subtree and returns the number of freed nodes.
    fn destroy(&mut self, id: NodeId) -> usize {
        let subtree = preorder(self, id);
        let count = subtree.len();
        subtree.into_iter().for_each(|id| {
            self.release(id);
        });
        debug!(node = %id, count, "Destroyed subtree");
        count
    }

    /// Inserts a flattened subtree. Entries without a parent position are linked to `anchor`.
    /// Returns the handles in the order of `entries`.
    fn splice(
        &mut self,
        anchor: Option<NodeId>,
        entries: impl IntoIterator<Item = FlatNode<Elem>>,
        ids: &mut Vec<NodeId>,
    ) -> Result<(), TreeError> {
        let register = anchor.is_some_and(|anchor| self.registry.contains(&anchor));
        let first_new = ids.len();
        for entry in entries {
            let parent = match entry.parent {
                Some(position) => Some(
                    *ids.get(position)
                        .ok_or(TreeError::InvalidOperation("malformed flattened subtree"))?,
                ),
                None => anchor,
            };
            let id = self.allocate(entry.key, entry.value, parent);
            if let Some(parent) = parent {
                self.node_mut(parent)?.children.push(id);
            }
            ids.push(id);
        }
        if register {
            self.registry.extend(ids[first_new..].iter().copied());
        }
        Ok(())
    }

    /// Builds a new tree from a flattened subtree whose first entry becomes the root.
    fn from_flat(flat: Vec<FlatNode<Elem>>, max_depth: usize) -> Result<Self, TreeError> {
        let capacity = flat.len();
        let mut entries = flat.into_iter();
        let first = entries
            .next()
            .ok_or(TreeError::InvalidOperation("cannot build a tree from an empty subtree"))?;
        let mut tree = Tree::with_capacity(capacity, first.key, first.value);
        tree.max_depth = max_depth;
        let mut ids = vec![tree.root];
        tree.splice(None, entries, &mut ids)?;
        // everything below the new root is reachable from it
        tree.registry.extend(ids.iter().copied());
        Ok(tree)
    }

    /// Appends a new child with an empty key and returns its handle. The tree keeps ownership.
    pub fn add_child(&mut self, parent: NodeId, value: Elem) -> Result<NodeId, TreeError> {
        self.add_keyed_child(parent, String::new(), value)
    }

    #[instrument(level = "debug", skip_all, fields(parent = %parent))]
    pub fn add_keyed_child(
        &mut self,
        parent: NodeId,
        key: impl Into<String>,
        value: Elem,
    ) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        let id = self.allocate(key.into(), value, Some(parent));
        self.link(parent, id)?;
        trace!(node = %id, "Added child");
        Ok(id)
    }

    /// Creates a node that is not part of the hierarchy yet. Use [Tree::attach] to insert it
    /// (after optionally growing a subtree under it with [Tree::add_child]).
    pub fn create_detached(&mut self, key: impl Into<String>, value: Elem) -> NodeId {
        self.allocate(key.into(), value, None)
    }

    /// Attaches a detached subtree of this arena by reference, as the last child of `parent`.
    ///
    /// Fails with [TreeError::InvalidTreeStructure] if `node` is the root, is attached or owned
    /// by another parent, or if `parent` lies within the subtree of `node`. Nothing is modified
    /// in case of failure.
    #[instrument(level = "debug", skip_all, fields(parent = %parent, node = %node))]
    pub fn attach(&mut self, parent: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.node(parent)?;
        let attached = self.node(node)?;
        if node == self.root || attached.parent.is_some() || self.registry.contains(&node) {
            return Err(TreeError::InvalidTreeStructure(node));
        }
        // cycle check: `node` must not be an ancestor of (or equal to) `parent`
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == node {
                return Err(TreeError::InvalidTreeStructure(node));
            }
            ancestor = self.get(current).and_then(|n| n.parent);
        }
        self.link(parent, node)?;
        debug!("Attached subtree");
        Ok(())
    }

    /// Unlinks a subtree from its parent. It stays in the arena, deregistered, and can be
    /// attached again. Returns the handle for convenience.
    #[instrument(level = "debug", skip_all, fields(node = %id))]
    pub fn detach(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let parent = match self.node(id)?.parent {
            Some(parent) if id != self.root => parent,
            _ => return Err(TreeError::NoSuchNode(id)),
        };
        self.unlink(parent, id)?;
        for id in preorder(self, id) {
            self.registry.remove(&id);
        }
        debug!("Detached subtree");
        Ok(id)
    }

    /// Moves a subtree out of this tree into a new one, which takes ownership of it.
    #[instrument(level = "debug", skip_all, fields(node = %id))]
    pub fn split_off(&mut self, id: NodeId) -> Result<Tree<Elem>, TreeError> {
        let parent = self.node(id)?.parent;
        if id == self.root {
            return Err(TreeError::NoSuchNode(id));
        }
        if let Some(parent) = parent {
            self.unlink(parent, id)?;
        }
        let flat = flatten_taken(self, id);
        debug!(count = flat.len(), "Split off subtree");
        Tree::from_flat(flat, self.max_depth)
    }

    /// Moves all attached nodes of another tree under `parent`. Its detached nodes are dropped.
    /// Returns the handle of the former root of `other`.
    #[instrument(level = "debug", skip_all, fields(parent = %parent))]
    pub fn graft(&mut self, parent: NodeId, mut other: Tree<Elem>) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        let root = other.root;
        let flat = flatten_taken(&mut other, root);
        let mut ids = Vec::with_capacity(flat.len());
        self.splice(Some(parent), flat, &mut ids)?;
        debug!(count = ids.len(), "Grafted tree");
        ids.first()
            .copied()
            .ok_or(TreeError::InvalidOperation("grafted tree was empty"))
    }

    /// Removes a subtree given by its handle. The root cannot be removed.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        if id == self.root {
            return Err(TreeError::NoSuchNode(id));
        }
        if let Some(parent) = parent {
            self.unlink(parent, id)?;
        }
        self.destroy(id);
        Ok(())
    }

    /// Removes the child in `slot` of `parent`'s list together with its subtree.
    pub(super) fn remove_child_at(&mut self, parent: NodeId, slot: usize) -> Result<NodeId, TreeError> {
        let parent_node = self.node_mut(parent)?;
        if slot >= parent_node.children.len() {
            return Err(TreeError::InvalidOperation("child position out of bounds"));
        }
        let child = parent_node.children.remove(slot);
        self.destroy(child);
        Ok(child)
    }

    /// Child cursor at the first child of `id` (or at the terminal position)
    pub fn first_child(&self, id: NodeId) -> Result<ChildCursor<'_, Elem>, TreeError> {
        ChildCursor::first(self, id, KeyFilter::Any)
    }

    pub fn last_child(&self, id: NodeId) -> Result<ChildCursor<'_, Elem>, TreeError> {
        ChildCursor::last(self, id, KeyFilter::Any)
    }

    pub fn first_child_mut(&mut self, id: NodeId) -> Result<ChildCursorMut<'_, Elem>, TreeError> {
        ChildCursorMut::first(self, id, KeyFilter::Any)
    }

    pub fn last_child_mut(&mut self, id: NodeId) -> Result<ChildCursorMut<'_, Elem>, TreeError> {
        ChildCursorMut::last(self, id, KeyFilter::Any)
    }

    /// Child cursor restricted to the children of `id` whose key equals `key`, positioned at the
    /// first of them.
    pub fn find_child(&self, id: NodeId, key: impl Into<String>) -> Result<ChildCursor<'_, Elem>, TreeError> {
        ChildCursor::first(self, id, KeyFilter::Exact(key.into()))
    }

    pub fn find_child_mut(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
    ) -> Result<ChildCursorMut<'_, Elem>, TreeError> {
        ChildCursorMut::first(self, id, KeyFilter::Exact(key.into()))
    }

    pub fn iter_children(&self, id: NodeId) -> Result<Children<'_, Elem>, TreeError> {
        Ok(self.first_child(id)?.into())
    }

    /// Depth-first cursor over the whole tree, positioned at the root.
    pub fn begin(&self) -> DepthFirstCursor<'_, Elem> {
        DepthFirstCursor::starting_at(self, self.root)
    }

    pub fn begin_mut(&mut self) -> DepthFirstCursorMut<'_, Elem> {
        let root = self.root;
        DepthFirstCursorMut::starting_at(self, root)
    }

    /// Depth-first cursor over the subtree of `id`.
    pub fn depth_first(&self, id: NodeId) -> Result<DepthFirstCursor<'_, Elem>, TreeError> {
        DepthFirstCursor::new(self, id)
    }

    pub fn depth_first_mut(&mut self, id: NodeId) -> Result<DepthFirstCursorMut<'_, Elem>, TreeError> {
        DepthFirstCursorMut::new(self, id)
    }

    /// The terminal position shared by all exhausted cursors of all trees.
    pub fn end() -> Position {
        Position::End
    }

    /// Iterates the whole tree in depth-first pre-order.
    pub fn iter_depth(&self) -> DepthFirst<'_, Elem> {
        self.begin().into()
    }

    pub fn iter_depth_sub(&self, id: NodeId) -> Result<DepthFirst<'_, Elem>, TreeError> {
        Ok(self.depth_first(id)?.into())
    }
}

impl<Elem> Tree<Elem>
where
    Elem: PartialEq,
{
    /// Depth-first cursor at the first node (pre-order) whose value equals `value`, or at
    /// [Position::End].
    pub fn find(&self, value: &Elem) -> DepthFirstCursor<'_, Elem> {
        let mut cursor = self.begin();
        cursor.seek(|node| node.value == *value);
        cursor
    }

    /// Like [Tree::find] but restricted to the subtree of `id`.
    pub fn find_in(&self, id: NodeId, value: &Elem) -> Result<DepthFirstCursor<'_, Elem>, TreeError> {
        let mut cursor = self.depth_first(id)?;
        cursor.seek(|node| node.value == *value);
        Ok(cursor)
    }

    pub fn find_mut(&mut self, value: &Elem) -> DepthFirstCursorMut<'_, Elem> {
        let mut cursor = self.begin_mut();
        cursor.seek(|node| node.value == *value);
        cursor
    }
}

impl<Elem> Tree<Elem>
where
    Elem: Clone,
{
    /// Deep copies the subtree of `source` (which may be an ancestor of `parent`) and appends the
    /// copy to the children of `parent`. Returns the handle of the copied subtree's top node.
    #[instrument(level = "debug", skip_all, fields(parent = %parent, source = %source))]
    pub fn copy_subtree(&mut self, parent: NodeId, source: NodeId) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        self.node(source)?;
        let flat = flatten_cloned(self, source);
        let mut ids = Vec::with_capacity(flat.len());
        self.splice(Some(parent), flat, &mut ids)?;
        debug!(count = ids.len(), "Copied subtree");
        ids.first()
            .copied()
            .ok_or(TreeError::InvalidOperation("copied subtree was empty"))
    }

    /// Deep copies the subtree of `source` in another tree and appends it to `parent`.
    #[instrument(level = "debug", skip_all, fields(parent = %parent, source = %source))]
    pub fn copy_from(&mut self, parent: NodeId, other: &Tree<Elem>, source: NodeId) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        other.node(source)?;
        let flat = flatten_cloned(other, source);
        let mut ids = Vec::with_capacity(flat.len());
        self.splice(Some(parent), flat, &mut ids)?;
        debug!(count = ids.len(), "Copied subtree from other tree");
        ids.first()
            .copied()
            .ok_or(TreeError::InvalidOperation("copied subtree was empty"))
    }

    /// Deep copy of a subtree as a tree on its own.
    pub fn subtree(&self, id: NodeId) -> Result<Tree<Elem>, TreeError> {
        self.node(id)?;
        Tree::from_flat(flatten_cloned(self, id), self.max_depth)
    }
}
