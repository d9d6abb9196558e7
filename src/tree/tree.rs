use std::hash::Hasher;

use hashlink::LinkedHashMap;
use metrohash::MetroHash64;
use snafu::{Snafu, ensure};
use tracing::debug;

use crate::tree::node::{Node, NodeId, NodeKind, NodePatch, NodeSpec, Snapshot, Timestamp};

/// Name of the single root directory, also the leading path segment.
pub const ROOT_NAME: &str = "root";

/// Suffix appended to a node's name when deriving a copy of it.
const COPY_SUFFIX: &str = " (copy)";

/// Upper bound for the sibling-name disambiguation probe. Reaching it means
/// the uniqueness invariant is broken, not that the tree is merely full.
const MAX_NAME_PROBES: usize = 10_000;

/// Arena owning every node of one hierarchical store.
///
/// All structural algorithms are methods here; they perform no I/O. Freed
/// slots are recycled through a free list, so a [`NodeId`] is only valid
/// while the node it was handed out for is still part of the tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl Tree {
    /// Creates a tree holding only an empty root directory.
    pub fn new() -> Self {
        let now = Timestamp::now();
        let root = Node {
            name: ROOT_NAME.to_owned(),
            kind: NodeKind::Directory,
            content: String::new(),
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            parent: None,
            children: Some(LinkedHashMap::new()),
        };
        Tree {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Resolves a `/`-separated path to a node.
    ///
    /// Empty segments are ignored, so `""`, `"/"` and the root's own name
    /// all mean the root itself. Resolution fails on the first segment that
    /// is absent or would descend into a file.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments
            .peek()
            .is_some_and(|s| *s == self.node(self.root).name)
        {
            segments.next();
        }

        let mut current = self.root;
        for segment in segments {
            current = *self.node(current).children.as_ref()?.get(segment)?;
        }
        Some(current)
    }

    /// Root-relative path of a node, `/`-joined from ancestor names.
    pub fn path(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.parent {
            Some(parent) => format!("{}/{}", self.path(parent), node.name),
            None => node.name.clone(),
        }
    }

    /// Inserts a new node under `parent_path`, falling back to the root when
    /// the path does not resolve. The requested name is disambiguated
    /// against existing siblings, so an insert never overwrites.
    pub fn insert(&mut self, parent_path: &str, spec: NodeSpec) -> Result<NodeId, TreeError> {
        ensure_valid_name(&spec.name)?;
        let parent = self.resolve(parent_path).unwrap_or(self.root);
        ensure!(
            self.node(parent).is_directory(),
            NotADirectorySnafu {
                path: self.path(parent),
            }
        );

        let final_name = unique_name_in(self.children(parent), &spec.name)?;
        if final_name != spec.name {
            debug!(
                "Name '{}' taken under '{}', inserting as '{}'",
                spec.name,
                self.path(parent),
                final_name
            );
        }

        let now = Timestamp::now();
        let node = Node {
            name: final_name.clone(),
            kind: spec.kind,
            content: spec.content,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            parent: Some(parent),
            children: (spec.kind == NodeKind::Directory).then(LinkedHashMap::new),
        };
        let id = self.alloc(node);
        self.children_mut(parent).insert(final_name, id);
        Ok(id)
    }

    /// Applies a patch of mutable fields, refreshing `updated_at`.
    ///
    /// A content change appends the prior content to the node's history
    /// unless it would duplicate the latest snapshot. A name change rekeys
    /// the parent's children map in one step, applying the same sibling
    /// disambiguation as insert.
    pub fn update(&mut self, id: NodeId, patch: NodePatch) -> Result<(), TreeError> {
        let NodePatch { name, content } = patch;

        if let Some(content) = content {
            let node = self.node_mut(id);
            if node.is_file() && node.content != content {
                let prior = std::mem::replace(&mut node.content, content);
                let became_current_at = node.updated_at;
                let duplicate = node
                    .history
                    .last()
                    .is_some_and(|s| content_fingerprint(&s.content) == content_fingerprint(&prior));
                if !duplicate {
                    node.history.push(Snapshot {
                        content: prior,
                        timestamp: became_current_at,
                    });
                }
            }
        }

        if let Some(name) = name {
            self.rename(id, name)?;
        }

        self.node_mut(id).updated_at = Timestamp::now();
        Ok(())
    }

    /// Unlinks a node from its parent and frees its entire subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        ensure!(id != self.root, RootLockedSnafu);
        let name = self.node(id).name.clone();
        if let Some(parent) = self.node(id).parent {
            self.children_mut(parent).remove(&name);
        }
        self.free_subtree(id);
        Ok(())
    }

    /// Re-homes a node under the directory at `new_parent_path`, applying
    /// the insert disambiguation policy on a name collision.
    pub fn move_to(&mut self, id: NodeId, new_parent_path: &str) -> Result<(), TreeError> {
        ensure!(id != self.root, RootLockedSnafu);
        let dest = self
            .resolve(new_parent_path)
            .ok_or_else(|| TreeError::NotFound {
                path: new_parent_path.to_owned(),
            })?;
        ensure!(
            self.node(dest).is_directory(),
            NotADirectorySnafu {
                path: self.path(dest),
            }
        );
        ensure!(
            dest != id && !self.is_descendant(dest, id),
            MoveIntoOwnSubtreeSnafu {
                path: self.path(id),
            }
        );

        let name = self.node(id).name.clone();
        if let Some(old_parent) = self.node(id).parent {
            self.children_mut(old_parent).remove(&name);
        }
        let final_name = unique_name_in(self.children(dest), &name)?;

        let node = self.node_mut(id);
        node.parent = Some(dest);
        node.name = final_name.clone();
        node.updated_at = Timestamp::now();
        self.children_mut(dest).insert(final_name, id);
        Ok(())
    }

    /// Detached spec describing a copy of a node: copy-marked name, same
    /// kind and content, empty history. The source is left untouched.
    pub fn copy_spec(&self, id: NodeId) -> NodeSpec {
        let node = self.node(id);
        NodeSpec {
            name: format!("{}{}", node.name, COPY_SUFFIX),
            kind: node.kind,
            content: node.content.clone(),
        }
    }

    /// Ids of a node and all of its descendants.
    pub(crate) fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = vec![id];
        if let Some(children) = &self.node(id).children {
            for child in children.values() {
                ids.extend(self.subtree_ids(*child));
            }
        }
        ids
    }

    /// Raw attach used when rebuilding a tree from its persisted form: the
    /// name is trusted to be unique among its new siblings.
    pub(crate) fn attach_raw(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        node.parent = Some(parent);
        let name = node.name.clone();
        let id = self.alloc(node);
        self.children_mut(parent).insert(name, id);
        id
    }

    /// Replaces the root node's own fields, keeping its identity and its
    /// (empty) children map. Also used only when rebuilding from persisted
    /// form.
    pub(crate) fn replace_root(&mut self, node: Node) {
        let root = self.node_mut(self.root);
        root.name = node.name;
        root.content = node.content;
        root.created_at = node.created_at;
        root.updated_at = node.updated_at;
        root.history = node.history;
    }

    fn rename(&mut self, id: NodeId, requested: String) -> Result<(), TreeError> {
        ensure_valid_name(&requested)?;
        let old_name = self.node(id).name.clone();
        if requested == old_name {
            return Ok(());
        }
        let Some(parent) = self.node(id).parent else {
            // The root has no sibling map to rekey
            self.node_mut(id).name = requested;
            return Ok(());
        };

        // Remove the old key before probing so the node does not collide
        // with itself; the map is rekeyed within a single mutable borrow,
        // so no observer can see a transient state.
        let children = self.children_mut(parent);
        children.remove(&old_name);
        let final_name = unique_name_in(children, &requested)?;
        children.insert(final_name.clone(), id);
        self.node_mut(id).name = final_name;
        Ok(())
    }

    /// Whether `candidate` lies inside the subtree rooted at `ancestor`.
    fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(candidate).parent;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self
            .node(id)
            .children
            .as_ref()
            .map(|c| c.values().copied().collect())
            .unwrap_or_default();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.0] = None;
        self.free.push(id.0);
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("node id refers to a freed slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("node id refers to a freed slot")
    }

    fn children(&self, id: NodeId) -> &LinkedHashMap<String, NodeId> {
        self.node(id)
            .children
            .as_ref()
            .expect("children map is present for every directory")
    }

    fn children_mut(&mut self, id: NodeId) -> &mut LinkedHashMap<String, NodeId> {
        self.node_mut(id)
            .children
            .as_mut()
            .expect("children map is present for every directory")
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

/// Picks a sibling name for `requested` that is free in `children`,
/// probing `"{stem} (1){ext}"`, `"{stem} (2){ext}"`, … on a collision.
fn unique_name_in(
    children: &LinkedHashMap<String, NodeId>,
    requested: &str,
) -> Result<String, TreeError> {
    if !children.contains_key(requested) {
        return Ok(requested.to_owned());
    }
    let (stem, ext) = split_stem_ext(requested);
    for n in 1..=MAX_NAME_PROBES {
        let candidate = format!("{stem} ({n}){ext}");
        if !children.contains_key(&candidate) {
            return Ok(candidate);
        }
    }
    NameCollisionUnresolvedSnafu { name: requested }.fail()
}

/// Splits a name at its last `.`; a leading dot does not start an
/// extension, so `".gitignore"` is all stem.
fn split_stem_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn ensure_valid_name(name: &str) -> Result<(), TreeError> {
    ensure!(
        !name.is_empty() && !name.contains('/'),
        InvalidNameSnafu { name }
    );
    Ok(())
}

fn content_fingerprint(text: &str) -> u64 {
    let mut hasher = MetroHash64::default();
    hasher.write(text.as_bytes());
    hasher.finish()
}

#[derive(Debug, Snafu)]
pub enum TreeError {
    #[snafu(display("Path '{}' does not resolve to a node", path))]
    NotFound { path: String },
    #[snafu(display("'{}' is not a directory", path))]
    NotADirectory { path: String },
    #[snafu(display("Could not find a free sibling name for '{}'", name))]
    NameCollisionUnresolved { name: String },
    #[snafu(display("'{}' is not a valid node name", name))]
    InvalidName { name: String },
    #[snafu(display("The root directory cannot be moved or removed"))]
    RootLocked,
    #[snafu(display("Cannot move '{}' into its own subtree", path))]
    MoveIntoOwnSubtree { path: String },
}
