//! Mull CLI - co-author idea documents with an AI advisor.

use clap::Parser;
use mull::cli::{ActionCommands, BlockCommands, Cli, Commands, IdeaCommands};
use mull::commands::{self, Output};
use mull::config::{MullConfig, OutputFormat};
use mull::{action_log, storage};
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();

    // Determine workspace: --workspace flag > MULL_WORKSPACE env > cwd
    let workspace = resolve_workspace(cli.workspace, cli.human_readable);

    // Output format: -H flag > config.kdl output-format > JSON
    let human = cli.human_readable || configured_human(&workspace);

    // Serialize command for logging
    let (cmd_name, args_json) = serialize_command(&cli.command);

    // Start timing
    let start = Instant::now();

    // Execute command
    let result = run_command(cli.command, &workspace, human);

    // Calculate duration
    let duration = start.elapsed().as_millis() as u64;

    // Determine success/error
    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    // Log the action (silently skipped before `mull init`)
    if let Ok(root) = storage::get_storage_dir(&workspace) {
        action_log::log_action(&root, &workspace, &cmd_name, args_json, success, error, duration);
    }

    // Handle result
    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!(r#"{{"error": "{}"}}"#, e);
        }
        process::exit(1);
    }
}

/// Whether config.kdl asks for human-readable output by default.
fn configured_human(workspace: &Path) -> bool {
    let Ok(root) = storage::get_storage_dir(workspace) else {
        return false;
    };
    MullConfig::load(&root)
        .map(|c| c.output_format() == OutputFormat::Human)
        .unwrap_or(false)
}

/// Resolve the workspace path from the explicit flag or the current
/// directory. Explicit paths are used literally and must exist.
fn resolve_workspace(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                if human {
                    eprintln!(
                        "Error: Specified workspace path does not exist: {}",
                        path.display()
                    );
                } else {
                    eprintln!(
                        r#"{{"error": "Specified workspace path does not exist: {}"}}"#,
                        path.display()
                    );
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn run_command(
    command: Option<Commands>,
    workspace: &std::path::Path,
    human: bool,
) -> Result<(), mull::Error> {
    match command {
        Some(Commands::Init) => {
            let result = commands::init(workspace)?;
            output(&result, human);
        }

        Some(Commands::Idea { command }) => match command {
            IdeaCommands::Create {
                title,
                description,
                budget,
                steps,
                skills,
            } => {
                let result = commands::idea_create(
                    workspace,
                    &title,
                    description.as_deref(),
                    budget.as_deref(),
                    steps.as_deref(),
                    skills.as_deref(),
                )?;
                output(&result, human);
            }
            IdeaCommands::List { search } => {
                let result = commands::idea_list(workspace, search.as_deref())?;
                output(&result, human);
            }
            IdeaCommands::Show { id } => {
                let result = commands::idea_show(workspace, &id)?;
                output(&result, human);
            }
            IdeaCommands::Set { id, field, value } => {
                let result = commands::idea_set(workspace, &id, &field, &value)?;
                output(&result, human);
            }
            IdeaCommands::Delete { id } => {
                let result = commands::idea_delete(workspace, &id)?;
                output(&result, human);
            }
        },

        Some(Commands::Block { command }) => match command {
            BlockCommands::Add { id, kind, name } => {
                let result = commands::block_add(workspace, &id, &kind, &name)?;
                output(&result, human);
            }
            BlockCommands::Remove { id, index } => {
                let result = commands::block_remove(workspace, &id, index)?;
                output(&result, human);
            }
        },

        Some(Commands::Chat { id, message }) => {
            let result = commands::chat(workspace, &id, &message)?;
            output(&result, human);
        }

        Some(Commands::History { id }) => {
            let result = commands::history(workspace, &id)?;
            output(&result, human);
        }

        Some(Commands::Action { command }) => match command {
            ActionCommands::Show { id } => {
                let result = commands::action_show(workspace, &id)?;
                output(&result, human);
            }
            ActionCommands::Apply { id, index, json } => {
                let result = commands::action_apply(workspace, &id, index, json.as_deref())?;
                output(&result, human);
            }
            ActionCommands::Discard { id } => {
                let result = commands::action_discard(workspace, &id)?;
                output(&result, human);
            }
        },

        Some(Commands::Doctor { id }) => {
            let result = commands::doctor(workspace, id.as_deref())?;
            output(&result, human);
        }

        Some(Commands::Log { limit }) => {
            let result = commands::log(workspace, limit)?;
            output(&result, human);
        }

        Some(Commands::Version) => {
            let result = commands::version();
            output(&result, human);
        }

        None => {
            if human {
                eprintln!("No command given. Try `mull --help`.");
            } else {
                eprintln!(r#"{{"error": "no command given", "hint": "mull --help"}}"#);
            }
            process::exit(2);
        }
    }

    Ok(())
}

/// Print a command result in the requested format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Name and loggable arguments for a command. Free-text message bodies are
/// logged by length only.
fn serialize_command(command: &Option<Commands>) -> (String, serde_json::Value) {
    let (name, args) = match command {
        Some(Commands::Init) => ("init", json!({})),
        Some(Commands::Idea { command }) => match command {
            IdeaCommands::Create { title, .. } => ("idea create", json!({"title": title})),
            IdeaCommands::List { search } => ("idea list", json!({"search": search})),
            IdeaCommands::Show { id } => ("idea show", json!({"id": id})),
            IdeaCommands::Set { id, field, .. } => ("idea set", json!({"id": id, "field": field})),
            IdeaCommands::Delete { id } => ("idea delete", json!({"id": id})),
        },
        Some(Commands::Block { command }) => match command {
            BlockCommands::Add { id, kind, .. } => ("block add", json!({"id": id, "type": kind})),
            BlockCommands::Remove { id, index } => {
                ("block remove", json!({"id": id, "index": index}))
            }
        },
        Some(Commands::Chat { id, message }) => {
            ("chat", json!({"id": id, "message_len": message.len()}))
        }
        Some(Commands::History { id }) => ("history", json!({"id": id})),
        Some(Commands::Action { command }) => match command {
            ActionCommands::Show { id } => ("action show", json!({"id": id})),
            ActionCommands::Apply { id, index, json } => (
                "action apply",
                json!({"id": id, "index": index, "inline": json.is_some()}),
            ),
            ActionCommands::Discard { id } => ("action discard", json!({"id": id})),
        },
        Some(Commands::Doctor { id }) => ("doctor", json!({"id": id})),
        Some(Commands::Log { limit }) => ("log", json!({"limit": limit})),
        Some(Commands::Version) => ("version", json!({})),
        None => ("none", json!({})),
    };
    (name.to_string(), args)
}
