//! Mull - co-author idea documents with an AI advisor.
//!
//! This library provides the core functionality for the `mull` CLI tool:
//! - A block-based document model for semi-structured idea documents
//! - An extraction engine that finds machine-readable actions embedded in
//!   free-form advisor replies
//! - A validator/applier that executes one action against a document
//! - A conversation layer that drives the generative backend

pub mod action_log;
pub mod actions;
pub mod advisor;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod storage;

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::Path;
    use tempfile::TempDir;

    use crate::storage::Storage;

    /// Test environment with isolated storage using dependency injection.
    ///
    /// Storage tests use `TestEnv::new()` + `init_storage()`; integration
    /// tests of the binary set `MULL_DATA_DIR` per subprocess instead.
    pub struct TestEnv {
        /// Simulated workspace directory
        pub workspace_dir: TempDir,
        /// Isolated data storage directory
        pub data_dir: TempDir,
    }

    impl TestEnv {
        /// Create a new test environment with isolated directories.
        pub fn new() -> Self {
            Self {
                workspace_dir: TempDir::new().unwrap(),
                data_dir: TempDir::new().unwrap(),
            }
        }

        /// Get the path to the simulated workspace.
        pub fn path(&self) -> &Path {
            self.workspace_dir.path()
        }

        /// Get the path to the isolated data directory.
        pub fn data_path(&self) -> &Path {
            self.data_dir.path()
        }

        /// Initialize storage for this test environment.
        pub fn init_storage(&self) -> Storage {
            Storage::init_with_data_dir(self.path(), self.data_path()).unwrap()
        }

        /// Open storage for this test environment.
        pub fn open_storage(&self) -> Storage {
            Storage::open_with_data_dir(self.path(), self.data_path()).unwrap()
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Library-level error type for Mull operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `mull init` first")]
    NotInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Advisor error: {0}")]
    Advisor(#[from] advisor::AdvisorError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Mull operations.
pub type Result<T> = std::result::Result<T, Error>;
