//! Shared helpers for CLI integration tests.
//!
//! Each test gets a fresh workspace directory and an isolated data directory
//! wired through the `MULL_DATA_DIR` environment variable, so tests never
//! touch the user's real storage and can run in parallel.

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated workspace + data directory pair for one test.
pub struct TestWorkspace {
    pub workspace: TempDir,
    pub data: TempDir,
}

impl TestWorkspace {
    /// Create a new, uninitialized test workspace.
    pub fn new() -> Self {
        Self {
            workspace: TempDir::new().unwrap(),
            data: TempDir::new().unwrap(),
        }
    }

    /// Create a test workspace and run `mull init` in it.
    pub fn initialized() -> Self {
        let ws = Self::new();
        ws.mull().arg("init").assert().success();
        ws
    }

    /// Get a Command for the mull binary, running in this workspace.
    pub fn mull(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mull"));
        cmd.current_dir(self.workspace.path());
        cmd.env("MULL_DATA_DIR", self.data.path());
        // Advisor credentials must never leak in from the host environment.
        cmd.env_remove("MULL_API_KEY");
        cmd.env_remove("GROQ_API_KEY");
        cmd
    }

    /// Create a document and return its ID.
    pub fn create_doc(&self, title: &str) -> String {
        let output = self
            .mull()
            .args(["idea", "create", title])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        value["document"]["id"].as_str().unwrap().to_string()
    }

    /// Fetch a document as JSON via `idea show`.
    pub fn show_doc(&self, id: &str) -> serde_json::Value {
        let output = self
            .mull()
            .args(["idea", "show", id])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        value["document"].clone()
    }
}
