//! CLI argument definitions for Mull.

use clap::{Parser, Subcommand};

/// Mull - co-author idea documents with an AI advisor.
///
/// Start with `mull init`, create a document with `mull idea create`, then
/// develop it in conversation with `mull chat`.
#[derive(Parser, Debug)]
#[command(name = "mull")]
#[command(author, version, about = "A CLI tool for co-authoring idea documents with an AI advisor", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if mull was started in <path> instead of the current directory.
    /// Can also be set via the MULL_WORKSPACE environment variable.
    #[arg(short = 'C', long = "workspace", global = true, env = "MULL_WORKSPACE")]
    pub workspace: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize mull for this workspace
    Init,

    /// Idea document commands
    Idea {
        #[command(subcommand)]
        command: IdeaCommands,
    },

    /// Direct block editing commands (no advisor involved)
    Block {
        #[command(subcommand)]
        command: BlockCommands,
    },

    /// Send a message to the advisor about a document
    Chat {
        /// Document ID (e.g., ml-a1b2)
        id: String,

        /// Message to send
        message: String,
    },

    /// Show a document's conversation
    History {
        /// Document ID
        id: String,
    },

    /// Review and execute advisor-suggested actions
    Action {
        #[command(subcommand)]
        command: ActionCommands,
    },

    /// Check documents for structural issues (read-only)
    Doctor {
        /// Document ID; checks every document when omitted
        id: Option<String>,
    },

    /// Show the audit trail of commands
    Log {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show version and build information
    Version,
}

/// Idea document commands
#[derive(Subcommand, Debug)]
pub enum IdeaCommands {
    /// Create a new idea document
    Create {
        /// Document title
        title: String,

        /// Long-form description
        #[arg(short, long)]
        description: Option<String>,

        /// Approximate budget
        #[arg(long)]
        budget: Option<String>,

        /// Execution steps
        #[arg(long)]
        steps: Option<String>,

        /// Required skills
        #[arg(long)]
        skills: Option<String>,
    },

    /// List documents
    List {
        /// Filter by a title substring
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a document in full
    Show {
        /// Document ID
        id: String,
    },

    /// Set a document field directly (same rules as advisor field updates,
    /// including the "tags" pseudo-field)
    Set {
        /// Document ID
        id: String,

        /// Field name: title, description, budget, execution_steps,
        /// required_skills, or tags
        #[arg(long)]
        field: String,

        /// New value (for tags: comma-separated list)
        #[arg(long)]
        value: String,
    },

    /// Delete a document
    Delete {
        /// Document ID
        id: String,
    },
}

/// Direct block editing commands
#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// Append an empty block to a document
    Add {
        /// Document ID
        id: String,

        /// Block type: checklist, tags, progress, link, or node_graph
        #[arg(long = "type")]
        kind: String,

        /// Display name for the block
        #[arg(long)]
        name: String,
    },

    /// Remove a block by index
    Remove {
        /// Document ID
        id: String,

        /// Block index (as shown by `mull idea show`)
        index: usize,
    },
}

/// Advisor action commands
#[derive(Subcommand, Debug)]
pub enum ActionCommands {
    /// Show the pending suggested action, if any
    Show {
        /// Document ID
        id: String,
    },

    /// Apply a suggested action to the document
    Apply {
        /// Document ID
        id: String,

        /// Pick a specific action from the latest reply (default: the first)
        #[arg(long)]
        index: Option<usize>,

        /// Apply a raw action JSON object instead of the pending suggestion
        #[arg(long)]
        json: Option<String>,
    },

    /// Discard the pending suggested action
    Discard {
        /// Document ID
        id: String,
    },
}
