use std::time::SystemTime;

use bincode::{Decode, Encode};
use derive_more::Display;
use hashlink::LinkedHashMap;

use crate::ext::SystemTimeExt;

/// Handle to a node slot inside a [`crate::tree::Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Display)]
pub enum NodeKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

/// Milliseconds since the Unix epoch. Stable and sortable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Display)]
#[display("{_0}")]
pub struct Timestamp(pub(crate) u64);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(SystemTime::now().to_epoch_millis())
    }
}

/// One prior content state of a file node.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Snapshot {
    pub content: String,
    pub timestamp: Timestamp,
}

/// A file or directory entry owned by the tree arena.
///
/// The sibling-name uniqueness and parent/children consistency invariants
/// are enforced by the tree operations, not by this type.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Text payload; empty and ignored for directories.
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Append-only log of prior content states.
    pub history: Vec<Snapshot>,
    /// Back index to the owning directory; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Present exactly for directories. Insertion order is preserved so
    /// listings stay stable across sessions.
    pub children: Option<LinkedHashMap<String, NodeId>>,
}

impl Node {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Detached description of a node to be inserted into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    pub content: String,
}

impl NodeSpec {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        NodeSpec {
            name: name.into(),
            kind: NodeKind::File,
            content: content.into(),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        NodeSpec {
            name: name.into(),
            kind: NodeKind::Directory,
            content: String::new(),
        }
    }
}

/// Subset of mutable node fields applied by an update.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl NodePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        NodePatch {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        NodePatch {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_spec_carries_content() {
        let spec = NodeSpec::file("a.md", "# Title");
        assert_eq!(spec.kind, NodeKind::File);
        assert_eq!(spec.content, "# Title");
    }

    #[test]
    fn directory_spec_has_empty_content() {
        let spec = NodeSpec::directory("docs");
        assert_eq!(spec.kind, NodeKind::Directory);
        assert!(spec.content.is_empty());
    }

    #[test]
    fn timestamps_are_sortable() {
        let earlier = Timestamp(1_000);
        let later = Timestamp(2_000);
        assert!(earlier < later);
    }

    #[test]
    fn node_kind_displays_lowercase() {
        assert_eq!(NodeKind::File.to_string(), "file");
        assert_eq!(NodeKind::Directory.to_string(), "directory");
    }
}
