//! Provides the error type used throughout this crate.

use crate::arena::NodeId;
use thiserror::Error;

/// Errors raised by structural operations on a [crate::Tree] and by its cursors.
///
/// All errors are reported to the immediate caller. An operation that fails leaves
/// the tree exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Attaching the node would make it reachable twice, or would create a cycle
    #[error("Node {0} is already attached or would become its own ancestor")]
    InvalidTreeStructure(NodeId),
    /// The cursor is at a terminal position
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),
    /// Stale handle, or a root that has no parent to be detached from
    #[error("No such node: {0}")]
    NoSuchNode(NodeId),
}
