use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Directory the notebook state is persisted under
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a file at the given path
    New {
        path: String,
        /// Initial content
        #[clap(long, short)]
        text: Option<String>,
    },
    /// Create a directory at the given path
    Mkdir { path: String },
    /// Print a file's content
    Cat { path: String },
    /// Replace a file's content
    Write { path: String, text: String },
    /// List the children of a directory
    Ls { path: Option<String> },
    /// Print the whole hierarchy
    Tree,
    /// Move a node under another directory
    Mv { path: String, dest: String },
    /// Duplicate a node next to itself
    Cp { path: String },
    /// Delete a node and its subtree
    Rm { path: String },
    /// Rename a node in place
    Rename { path: String, name: String },
    /// Flip a directory's expanded flag
    Toggle { path: String },
    /// List a file's content history
    History { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_new_command_with_text() {
        let cli = Cli::try_parse_from(["notemark", "new", "docs/a.md", "--text", "# A"])
            .expect("parse");
        match cli.command {
            Command::New { path, text } => {
                assert_eq!(path, "docs/a.md");
                assert_eq!(text.as_deref(), Some("# A"));
            }
            other => panic!("Expected New, got {other:?}"),
        }
    }

    #[test]
    fn root_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["notemark", "tree"]).expect("parse");
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn rejects_a_missing_subcommand() {
        assert!(Cli::try_parse_from(["notemark"]).is_err());
    }
}
