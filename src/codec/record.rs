use bincode::{Decode, Encode};
use hashlink::LinkedHashMap;

use crate::tree::{Node, NodeId, NodeKind, Snapshot, Timestamp, Tree};

/// One node in persisted form. `children` is present exactly for
/// directories and keeps the children-map insertion order; the map keys are
/// re-derived from each child's own name on decode. Parent links are never
/// emitted.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PersistedNode {
    pub name: String,
    pub kind: NodeKind,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub history: Vec<Snapshot>,
    pub children: Option<Vec<PersistedNode>>,
}

/// Everything one store instance persists under its single key: the tree
/// plus the expanded-directory paths kept for the UI.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PersistedState {
    pub root: PersistedNode,
    pub expanded_paths: Vec<String>,
}

/// Emits the whole tree as a nested record, root first.
pub fn encode_tree(tree: &Tree) -> PersistedNode {
    encode_node(tree, tree.root())
}

fn encode_node(tree: &Tree, id: NodeId) -> PersistedNode {
    let node = tree.get(id).expect("encoded node is live");
    PersistedNode {
        name: node.name.clone(),
        kind: node.kind,
        content: node.content.clone(),
        created_at: node.created_at,
        updated_at: node.updated_at,
        history: node.history.clone(),
        children: node
            .children
            .as_ref()
            .map(|children| children.values().map(|c| encode_node(tree, *c)).collect()),
    }
}

/// Rebuilds a live tree from its persisted form, reconstructing the parent
/// link of every descendant so path computation works for the whole tree.
pub fn decode_tree(record: &PersistedNode) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    tree.replace_root(node_from_record(record));
    if let Some(children) = &record.children {
        for child in children {
            decode_into(&mut tree, root, child);
        }
    }
    tree
}

fn decode_into(tree: &mut Tree, parent: NodeId, record: &PersistedNode) {
    let id = tree.attach_raw(parent, node_from_record(record));
    if let Some(children) = &record.children {
        for child in children {
            decode_into(tree, id, child);
        }
    }
}

fn node_from_record(record: &PersistedNode) -> Node {
    Node {
        name: record.name.clone(),
        kind: record.kind,
        content: record.content.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        history: record.history.clone(),
        parent: None,
        children: (record.kind == NodeKind::Directory).then(LinkedHashMap::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodePatch, NodeSpec};

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        tree.insert("", NodeSpec::directory("docs")).expect("docs");
        let x = tree
            .insert("docs", NodeSpec::file("x.md", "# X"))
            .expect("x.md");
        tree.update(x, NodePatch::content("# X v2")).expect("update");
        tree.insert("docs", NodeSpec::directory("drafts")).expect("drafts");
        tree.insert("docs/drafts", NodeSpec::file("d.md", "draft"))
            .expect("d.md");
        tree.insert("", NodeSpec::file("todo.md", "- [ ] ship"))
            .expect("todo.md");
        tree
    }

    #[test]
    fn round_trip_preserves_every_path() {
        let tree = sample_tree();
        let restored = decode_tree(&encode_tree(&tree));

        for id in ["", "docs", "docs/x.md", "docs/drafts", "docs/drafts/d.md", "todo.md"]
            .iter()
            .map(|p| tree.resolve(p).expect("resolves in source"))
        {
            let path = tree.path(id);
            let restored_id = restored.resolve(&path).expect("resolves after decode");
            assert_eq!(restored.path(restored_id), path);
        }
        assert_eq!(restored.node_count(), tree.node_count());
    }

    #[test]
    fn round_trip_preserves_attributes_and_history() {
        let tree = sample_tree();
        let restored = decode_tree(&encode_tree(&tree));

        let source = tree
            .resolve("docs/x.md")
            .and_then(|id| tree.get(id))
            .expect("source node");
        let decoded = restored
            .resolve("docs/x.md")
            .and_then(|id| restored.get(id))
            .expect("decoded node");

        assert_eq!(decoded.name, source.name);
        assert_eq!(decoded.kind, source.kind);
        assert_eq!(decoded.content, source.content);
        assert_eq!(decoded.created_at, source.created_at);
        assert_eq!(decoded.updated_at, source.updated_at);
        assert_eq!(decoded.history, source.history);
    }

    #[test]
    fn encoding_the_decoded_tree_is_idempotent() {
        let record = encode_tree(&sample_tree());
        let re_encoded = encode_tree(&decode_tree(&record));
        assert_eq!(re_encoded, record);
    }

    #[test]
    fn parent_links_are_rebuilt_for_deep_descendants() {
        let restored = decode_tree(&encode_tree(&sample_tree()));
        let deep = restored.resolve("docs/drafts/d.md").expect("deep file");
        // path() walks the full ancestor chain, so it only works if every
        // intermediate parent link was reconnected
        assert_eq!(restored.path(deep), "root/docs/drafts/d.md");
    }

    #[test]
    fn children_order_survives_the_round_trip() {
        let mut tree = Tree::new();
        for name in ["c.md", "a.md", "b.md"] {
            tree.insert("", NodeSpec::file(name, "")).expect("insert");
        }
        let record = encode_tree(&tree);
        let names: Vec<&str> = record
            .children
            .as_ref()
            .expect("root children")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["c.md", "a.md", "b.md"]);

        let restored = decode_tree(&record);
        let restored_names: Vec<String> = restored
            .get(restored.root())
            .and_then(|n| n.children.as_ref())
            .expect("restored children")
            .keys()
            .cloned()
            .collect();
        assert_eq!(restored_names, ["c.md", "a.md", "b.md"]);
    }

    #[test]
    fn file_records_carry_no_children() {
        let tree = sample_tree();
        let record = encode_tree(&tree);
        let todo = record
            .children
            .as_ref()
            .expect("root children")
            .iter()
            .find(|c| c.name == "todo.md")
            .expect("todo.md record");
        assert!(todo.children.is_none());
    }
}
