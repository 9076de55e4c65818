//! Interactive session state: working directory and command history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::traits::{HistoryRecorder, WorkingDirectory};
use crate::{Error, Result};

/// Maximum number of history entries kept in memory.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Raw line typed by the operator.
    User,
    /// A routed command and its outcome.
    Execution,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub kind: EntryKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct ContextState {
    working_directory: PathBuf,
    history: Vec<HistoryEntry>,
    last_command: Option<String>,
    last_output: Option<String>,
}

/// Session state shared between the REPL and the execution router.
#[derive(Debug)]
pub struct SessionContext {
    state: Mutex<ContextState>,
}

impl SessionContext {
    /// Start a session rooted at `working_directory`.
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(ContextState {
                working_directory: working_directory.into(),
                history: Vec::new(),
                last_command: None,
                last_output: None,
            }),
        }
    }

    /// Start a session rooted at the process's current directory.
    pub fn from_current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the session's working directory.
    ///
    /// Relative paths resolve against the current session directory. The
    /// target must exist and be a directory.
    pub fn set_working_directory(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_directory("Directory path must not be empty"));
        }

        let mut state = self.lock();
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            state.working_directory.join(path)
        };

        if !candidate.is_dir() {
            return Err(Error::invalid_directory(format!(
                "Directory does not exist: {}",
                candidate.display()
            )));
        }

        let resolved = candidate.canonicalize()?;
        state.working_directory = resolved.clone();
        Ok(resolved)
    }

    pub fn add_user_message(&self, message: &str) {
        let mut state = self.lock();
        push_capped(
            &mut state.history,
            HistoryEntry {
                kind: EntryKind::User,
                content: message.to_string(),
                output: None,
                exit_code: None,
                timestamp: Utc::now(),
            },
        );
    }

    pub fn last_command(&self) -> Option<String> {
        self.lock().last_command.clone()
    }

    pub fn last_output(&self) -> Option<String> {
        self.lock().last_output.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.clone()
    }

    pub fn clear_history(&self) {
        let mut state = self.lock();
        state.history.clear();
        state.last_command = None;
        state.last_output = None;
    }

    /// Short summary of the session: directory, last command, and the last
    /// few operator lines.
    pub fn recent_context(&self, lines: usize) -> String {
        let state = self.lock();
        if state.history.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Current directory: {}",
            state.working_directory.display()
        )];
        if let Some(last) = &state.last_command {
            parts.push(format!("Last command: {}", last));
        }

        let start = state.history.len().saturating_sub(lines * 2);
        parts.extend(
            state.history[start..]
                .iter()
                .filter(|e| e.kind == EntryKind::User)
                .map(|e| format!("User: {}", e.content)),
        );
        parts.join("\n")
    }

    /// Write the history to `path` as plain text.
    pub fn export_history(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.lock();
        let mut out = String::from("# ShellGuard session history\n\n");
        for entry in &state.history {
            let _ = writeln!(
                out,
                "[{}] {}: {}",
                entry.timestamp.to_rfc3339(),
                match entry.kind {
                    EntryKind::User => "USER",
                    EntryKind::Execution => "EXEC",
                },
                entry.content
            );
            if let (Some(code), Some(output)) = (entry.exit_code, &entry.output) {
                let _ = writeln!(out, "  Exit Code: {}", code);
                let _ = writeln!(out, "  Output: {}", output);
            }
            out.push('\n');
        }
        drop(state);

        std::fs::write(path, out)?;
        Ok(())
    }
}

fn push_capped(history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    history.push(entry);
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}

impl WorkingDirectory for SessionContext {
    fn working_directory(&self) -> PathBuf {
        self.lock().working_directory.clone()
    }
}

impl HistoryRecorder for SessionContext {
    fn record_execution(&self, command: &str, output: &str, exit_code: i64) {
        let mut state = self.lock();
        state.last_command = Some(command.to_string());
        state.last_output = Some(output.to_string());
        push_capped(
            &mut state.history,
            HistoryEntry {
                kind: EntryKind::Execution,
                content: format!("Executed: {}", command),
                output: Some(output.to_string()),
                exit_code: Some(exit_code),
                timestamp: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_capped() {
        let ctx = SessionContext::new("/tmp");
        for i in 0..(MAX_HISTORY + 10) {
            ctx.record_execution(&format!("echo {}", i), "", 0);
        }
        let history = ctx.history();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].content, "Executed: echo 10");
        assert_eq!(ctx.last_command().as_deref(), Some("echo 59"));
    }

    #[test]
    fn test_set_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let ctx = SessionContext::new(dir.path());
        let resolved = ctx.set_working_directory("sub").unwrap();
        assert!(resolved.ends_with("sub"));
        assert_eq!(ctx.working_directory(), resolved);

        let err = ctx.set_working_directory("missing").unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory(_)));
        // Failed change leaves the directory untouched
        assert_eq!(ctx.working_directory(), resolved);

        assert!(ctx.set_working_directory("").is_err());
    }

    #[test]
    fn test_recent_context_and_clear() {
        let ctx = SessionContext::new("/srv");
        assert_eq!(ctx.recent_context(3), "");

        ctx.add_user_message("list files");
        ctx.record_execution("ls -la", "a b", 0);
        let summary = ctx.recent_context(3);
        assert!(summary.contains("Current directory: /srv"));
        assert!(summary.contains("Last command: ls -la"));
        assert!(summary.contains("User: list files"));

        ctx.clear_history();
        assert!(ctx.history().is_empty());
        assert!(ctx.last_command().is_none());
        assert!(ctx.last_output().is_none());
    }

    #[test]
    fn test_export_history() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history.txt");

        let ctx = SessionContext::new("/srv");
        ctx.record_execution("pwd", "/srv", 0);
        ctx.export_history(&file).unwrap();

        let text = std::fs::read_to_string(&file).unwrap();
        assert!(text.contains("EXEC: Executed: pwd"));
        assert!(text.contains("Exit Code: 0"));
    }
}
