use colored::Colorize;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::application::RuntimeConfig;
use crate::cli::Command;
use crate::store::{NoteStore, StateStore};
use crate::tree::{NodeId, NodePatch, NodeSpec, TreeError};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let config: RuntimeConfig = app_config.into();
        let mut store = NoteStore::new(StateStore::new(&config.root));
        store.load().await;
        debug!("Store ready with {} nodes", store.tree().node_count());

        Self::dispatch(&mut store, config.command).context(CommandSnafu)?;

        store.flush().await;
        Ok(())
    }

    fn dispatch(store: &mut NoteStore, command: Command) -> Result<(), TreeError> {
        match command {
            Command::New { path, text } => {
                let (parent, name) = split_parent(&path);
                let id = store.add_node(NodeSpec::file(name, text.unwrap_or_default()), parent)?;
                println!("{}", store.tree().path(id));
            }
            Command::Mkdir { path } => {
                let (parent, name) = split_parent(&path);
                let id = store.add_node(NodeSpec::directory(name), parent)?;
                println!("{}", store.tree().path(id));
            }
            Command::Cat { path } => {
                let id = resolve_required(store, &path)?;
                if let Some(node) = store.node(id) {
                    println!("{}", node.content);
                }
            }
            Command::Write { path, text } => {
                let id = resolve_required(store, &path)?;
                store.update_node(id, NodePatch::content(text))?;
            }
            Command::Ls { path } => {
                let path = path.unwrap_or_default();
                let id = resolve_required(store, &path)?;
                Self::print_listing(store, id)?;
            }
            Command::Tree => {
                Self::print_subtree(store, store.root(), 0);
            }
            Command::Mv { path, dest } => {
                let id = resolve_required(store, &path)?;
                store.move_node(id, &dest)?;
                println!("{}", store.tree().path(id));
            }
            Command::Cp { path } => {
                let id = resolve_required(store, &path)?;
                let spec = store.tree().copy_spec(id);
                let parent = store
                    .node(id)
                    .and_then(|n| n.parent)
                    .unwrap_or_else(|| store.root());
                let parent_path = store.tree().path(parent);
                let copy = store.add_node(spec, &parent_path)?;
                println!("{}", store.tree().path(copy));
            }
            Command::Rm { path } => {
                let id = resolve_required(store, &path)?;
                store.delete_node(id)?;
            }
            Command::Rename { path, name } => {
                let id = resolve_required(store, &path)?;
                store.update_node(id, NodePatch::rename(name))?;
                println!("{}", store.tree().path(id));
            }
            Command::Toggle { path } => {
                let id = resolve_required(store, &path)?;
                store.toggle_expanded(id);
                println!(
                    "{}",
                    if store.is_expanded(id) {
                        "expanded"
                    } else {
                        "collapsed"
                    }
                );
            }
            Command::History { path } => {
                let id = resolve_required(store, &path)?;
                if let Some(node) = store.node(id) {
                    for (idx, snapshot) in node.history.iter().enumerate() {
                        println!(
                            "{:>3}  {}  {} bytes",
                            idx,
                            snapshot.timestamp,
                            snapshot.content.len()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn print_listing(store: &NoteStore, id: NodeId) -> Result<(), TreeError> {
        let children = store
            .node(id)
            .and_then(|n| n.children.as_ref())
            .ok_or_else(|| TreeError::NotADirectory {
                path: store.tree().path(id),
            })?;
        for child_id in children.values() {
            if let Some(child) = store.node(*child_id) {
                if child.is_directory() {
                    println!("{}/", paint_directory(&child.name));
                } else {
                    println!("{}", child.name);
                }
            }
        }
        Ok(())
    }

    fn print_subtree(store: &NoteStore, id: NodeId, depth: usize) {
        let Some(node) = store.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        if node.is_directory() {
            let marker = if store.is_expanded(id) || id == store.root() {
                "-"
            } else {
                "+"
            };
            println!("{indent}{marker} {}", paint_directory(&node.name));
            if let Some(children) = &node.children {
                for child in children.values() {
                    Self::print_subtree(store, *child, depth + 1);
                }
            }
        } else {
            println!("{indent}  {}", node.name);
        }
    }
}

/// Splits a node path into its parent path and final name segment.
fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", trimmed),
    }
}

fn resolve_required(store: &NoteStore, path: &str) -> Result<NodeId, TreeError> {
    store.resolve_path(path).ok_or_else(|| TreeError::NotFound {
        path: path.to_owned(),
    })
}

fn paint_directory(name: &str) -> String {
    if supports_color::on(supports_color::Stream::Stdout).is_some() {
        name.blue().bold().to_string()
    } else {
        name.to_owned()
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("The requested operation was refused"))]
    CommandError { source: TreeError },
}
