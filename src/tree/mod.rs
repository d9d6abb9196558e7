//! In-memory tree of named file and directory nodes.
//!
//! Nodes live in an arena owned by [`Tree`] and reference each other through
//! [`NodeId`] handles: the parent link is a plain back index, never
//! ownership, so the structure stays a strict tree with a single owner.

mod node;
mod tree;

pub use node::{Node, NodeId, NodeKind, NodePatch, NodeSpec, Snapshot, Timestamp};
pub use tree::{ROOT_NAME, Tree, TreeError};
