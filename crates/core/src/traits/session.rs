//! Session traits.

use std::path::PathBuf;

/// Provides the directory commands run in (and the sandbox bind-mounts).
pub trait WorkingDirectory: Send + Sync {
    fn working_directory(&self) -> PathBuf;
}

/// Receives a record of every routed command.
pub trait HistoryRecorder: Send + Sync {
    fn record_execution(&self, command: &str, output: &str, exit_code: i64);
}
