//! Action logging for Mull commands.
//!
//! Every CLI invocation is appended to `action_log.jsonl` in the workspace's
//! data directory, giving an audit trail of what was run, whether it
//! succeeded, and how long it took. Logging never fails a command: on any
//! error it degrades to a warning on stderr.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Name of the log file inside the storage root.
const LOG_FILE: &str = "action_log.jsonl";

/// Represents a single action log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Workspace path where the command was executed
    pub workspace: String,

    /// Command name (e.g., "idea create", "chat", "action apply")
    pub command: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

/// Append one entry to the action log.
///
/// Silently does nothing when the storage root does not exist yet (e.g.,
/// before `mull init`).
pub fn log_action(
    storage_root: &Path,
    workspace: &Path,
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    if !storage_root.exists() {
        return;
    }

    let entry = ActionLog {
        timestamp: Utc::now(),
        workspace: workspace.to_string_lossy().to_string(),
        command: command.to_string(),
        args,
        success,
        error,
        duration_ms,
        user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
    };

    if let Err(e) = append_entry(storage_root, &entry) {
        eprintln!("Warning: failed to write action log: {e}");
    }
}

fn append_entry(storage_root: &Path, entry: &ActionLog) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(storage_root.join(LOG_FILE))?;
    let json = serde_json::to_string(entry).unwrap_or_default();
    writeln!(file, "{}", json)
}

/// Read the most recent `limit` entries, newest last.
pub fn read_log(storage_root: &Path, limit: usize) -> Vec<ActionLog> {
    let path = storage_root.join(LOG_FILE);
    let Ok(file) = std::fs::File::open(&path) else {
        return Vec::new();
    };

    let mut entries: Vec<ActionLog> = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(&l).ok())
        .collect();

    if entries.len() > limit {
        entries.drain(..entries.len() - limit);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_log_and_read_back() {
        let dir = TempDir::new().unwrap();
        log_action(
            dir.path(),
            Path::new("/tmp/ws"),
            "idea create",
            json!({"title": "Drones"}),
            true,
            None,
            12,
        );
        log_action(
            dir.path(),
            Path::new("/tmp/ws"),
            "chat",
            json!({}),
            false,
            Some("advisor unavailable".into()),
            40,
        );

        let entries = read_log(dir.path(), 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "idea create");
        assert!(entries[0].success);
        assert_eq!(entries[1].error.as_deref(), Some("advisor unavailable"));
    }

    #[test]
    fn test_limit_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            log_action(
                dir.path(),
                Path::new("/tmp/ws"),
                &format!("cmd {i}"),
                json!({}),
                true,
                None,
                1,
            );
        }
        let entries = read_log(dir.path(), 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "cmd 3");
        assert_eq!(entries[1].command, "cmd 4");
    }

    #[test]
    fn test_missing_root_is_silent() {
        log_action(
            Path::new("/nonexistent/mull-test"),
            Path::new("/tmp/ws"),
            "noop",
            json!({}),
            true,
            None,
            0,
        );
        assert!(read_log(Path::new("/nonexistent/mull-test"), 5).is_empty());
    }
}
