use std::collections::HashSet;

use tracing::debug;

use crate::codec::{PersistedState, decode_tree, encode_tree};
use crate::store::StateStore;
use crate::tree::{Node, NodeId, NodePatch, NodeSpec, Tree, TreeError};

/// Lifecycle of a store instance: constructed empty, loads its persisted
/// state once, then serves mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Loading,
    Ready,
}

/// The single mutation and query surface consumed by UI collaborators.
///
/// Wraps every tree operation with path resolution against the live root,
/// expanded-set bookkeeping and persistence scheduling. Mutations apply to
/// the in-memory tree synchronously and mark the store dirty; [`flush`]
/// performs at most one physical write for any burst of mutations, and that
/// write always reflects the final in-memory state.
///
/// [`flush`]: NoteStore::flush
#[derive(Debug)]
pub struct NoteStore {
    tree: Tree,
    expanded: HashSet<NodeId>,
    state_store: StateStore,
    state: StoreState,
    dirty: bool,
}

impl NoteStore {
    /// Creates an unloaded store with a fresh empty root.
    pub fn new(state_store: StateStore) -> Self {
        NoteStore {
            tree: Tree::new(),
            expanded: HashSet::new(),
            state_store,
            state: StoreState::Uninitialized,
            dirty: false,
        }
    }

    /// Loads the persisted state, replacing the default empty root if
    /// anything was saved. The store becomes `Ready` either way, so callers
    /// can tell "empty because nothing saved" from "not yet loaded".
    pub async fn load(&mut self) {
        self.state = StoreState::Loading;
        if let Some(persisted) = self.state_store.load().await {
            let tree = decode_tree(&persisted.root);
            // Expanded paths that no longer resolve to a directory are
            // silently dropped
            let expanded = persisted
                .expanded_paths
                .iter()
                .filter_map(|path| {
                    let id = tree.resolve(path)?;
                    tree.get(id)?.is_directory().then_some(id)
                })
                .collect();
            self.tree = tree;
            self.expanded = expanded;
        }
        self.state = StoreState::Ready;
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == StoreState::Ready
    }

    /// Inserts a node described by `spec` under `parent_path`.
    pub fn add_node(&mut self, spec: NodeSpec, parent_path: &str) -> Result<NodeId, TreeError> {
        let id = self.tree.insert(parent_path, spec)?;
        self.dirty = true;
        Ok(id)
    }

    /// Applies a name/content patch to a node.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> Result<(), TreeError> {
        self.tree.update(id, patch)?;
        self.dirty = true;
        Ok(())
    }

    /// Deletes a node and its whole subtree, dropping any expanded entries
    /// that pointed into it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        let discarded: HashSet<NodeId> = self.tree.subtree_ids(id).into_iter().collect();
        self.tree.remove(id)?;
        self.expanded.retain(|e| !discarded.contains(e));
        self.dirty = true;
        Ok(())
    }

    /// Moves a node under a new parent directory.
    pub fn move_node(&mut self, id: NodeId, new_parent_path: &str) -> Result<(), TreeError> {
        self.tree.move_to(id, new_parent_path)?;
        self.dirty = true;
        Ok(())
    }

    pub fn resolve_path(&self, path: &str) -> Option<NodeId> {
        self.tree.resolve(path)
    }

    /// Flips a directory's expanded flag; ignored for files.
    pub fn toggle_expanded(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        if !node.is_directory() {
            debug!("Ignoring expand toggle on file '{}'", node.name);
            return;
        }
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
        self.dirty = true;
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    /// Read-only view of the live tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Expanded directories as sorted path strings, the form they are
    /// persisted in.
    pub fn expanded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.expanded.iter().map(|id| self.tree.path(*id)).collect();
        paths.sort();
        paths
    }

    /// Writes the current state once if any mutation happened since the
    /// last flush. Persistence failure never undoes an in-memory mutation.
    pub async fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        let state = PersistedState {
            root: encode_tree(&self.tree),
            expanded_paths: self.expanded_paths(),
        };
        self.state_store.save(&state).await;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fresh_store(dir: &TempDir) -> NoteStore {
        NoteStore::new(StateStore::new(dir.path()))
    }

    #[compio::test]
    async fn load_reaches_ready_even_with_nothing_persisted() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        assert_eq!(store.state(), StoreState::Uninitialized);

        store.load().await;
        assert!(store.is_loaded());
        assert_eq!(store.resolve_path(""), Some(store.root()));
    }

    #[compio::test]
    async fn mutations_survive_a_reload() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        let docs = store
            .add_node(NodeSpec::directory("docs"), "")
            .expect("add docs");
        store
            .add_node(NodeSpec::file("x.md", "# X"), "docs")
            .expect("add x.md");
        store.toggle_expanded(docs);
        store.flush().await;

        let mut reloaded = fresh_store(&dir);
        reloaded.load().await;
        let file = reloaded.resolve_path("docs/x.md").expect("file restored");
        assert_eq!(reloaded.tree().path(file), "root/docs/x.md");
        let docs = reloaded.resolve_path("docs").expect("docs restored");
        assert!(reloaded.is_expanded(docs));
    }

    #[compio::test]
    async fn a_burst_of_mutations_needs_a_single_flush() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        let id = store
            .add_node(NodeSpec::file("a.md", "v1"), "")
            .expect("add");
        store.update_node(id, NodePatch::content("v2")).expect("update");
        store
            .update_node(id, NodePatch::rename("b.md"))
            .expect("rename");
        store.flush().await;

        let mut reloaded = fresh_store(&dir);
        reloaded.load().await;
        let restored = reloaded.resolve_path("b.md").expect("renamed file");
        let node = reloaded.node(restored).expect("node");
        assert_eq!(node.content, "v2");
        assert_eq!(node.history.len(), 1);
    }

    #[compio::test]
    async fn flush_without_mutation_writes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;
        store.flush().await;

        assert!(!dir.path().join(".notemark").exists());
    }

    #[compio::test]
    async fn deleting_a_directory_drops_its_expanded_entries() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        let docs = store
            .add_node(NodeSpec::directory("docs"), "")
            .expect("docs");
        let inner = store
            .add_node(NodeSpec::directory("inner"), "docs")
            .expect("inner");
        store.toggle_expanded(docs);
        store.toggle_expanded(inner);

        store.delete_node(docs).expect("delete");
        assert!(store.expanded_paths().is_empty());
    }

    #[compio::test]
    async fn stale_expanded_paths_are_dropped_on_load() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;
        let docs = store
            .add_node(NodeSpec::directory("docs"), "")
            .expect("docs");
        store.toggle_expanded(docs);
        store.flush().await;

        // Hand-craft a state whose expanded list points nowhere
        let state_store = StateStore::new(dir.path());
        let mut persisted = state_store.load().await.expect("state");
        persisted.expanded_paths.push("root/gone".to_owned());
        state_store.save(&persisted).await;

        let mut reloaded = fresh_store(&dir);
        reloaded.load().await;
        assert_eq!(reloaded.expanded_paths(), ["root/docs".to_owned()]);
    }

    #[compio::test]
    async fn toggling_a_file_is_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        let file = store
            .add_node(NodeSpec::file("a.md", ""), "")
            .expect("file");
        store.toggle_expanded(file);
        assert!(!store.is_expanded(file));
        assert!(store.expanded_paths().is_empty());
    }

    #[compio::test]
    async fn structural_errors_surface_to_the_caller() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        store
            .add_node(NodeSpec::file("a.md", ""), "")
            .expect("file");
        let result = store.add_node(NodeSpec::file("b.md", ""), "a.md");
        assert!(matches!(result, Err(TreeError::NotADirectory { .. })));
    }

    #[compio::test]
    async fn move_through_the_facade_updates_paths() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = fresh_store(&dir);
        store.load().await;

        store
            .add_node(NodeSpec::directory("docs"), "")
            .expect("docs");
        let file = store
            .add_node(NodeSpec::file("x.md", ""), "")
            .expect("x.md");
        store.move_node(file, "docs").expect("move");
        store.flush().await;

        let mut reloaded = fresh_store(&dir);
        reloaded.load().await;
        assert!(reloaded.resolve_path("x.md").is_none());
        assert!(reloaded.resolve_path("docs/x.md").is_some());
    }
}
