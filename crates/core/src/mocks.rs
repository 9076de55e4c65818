//! Mock implementations of core traits for testing.
//!
//! These stand in for the terminal prompt and the session context so the
//! router can be exercised without a TTY.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::traits::{ConfirmationPrompt, HistoryRecorder, WorkingDirectory};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Scripted Prompt
// =============================================================================

/// Confirmation prompt that replays a queue of answers.
///
/// Once the queue is exhausted every further question is answered with the
/// fallback (default: no).
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
    asked: Mutex<Vec<(String, String)>>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            fallback: false,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A prompt that always gives the same answer.
    pub fn always(answer: bool) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fallback: answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Number of times the prompt was consulted.
    pub fn call_count(&self) -> usize {
        lock(&self.asked).len()
    }

    /// `(command, reason)` pairs in the order they were asked.
    pub fn questions(&self) -> Vec<(String, String)> {
        lock(&self.asked).clone()
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&self, command: &str, reason: &str) -> bool {
        lock(&self.asked).push((command.to_string(), reason.to_string()));
        lock(&self.answers).pop_front().unwrap_or(self.fallback)
    }
}

// =============================================================================
// Recording History
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExecution {
    pub command: String,
    pub output: String,
    pub exit_code: i64,
}

/// History recorder that keeps every record for later assertions.
#[derive(Default)]
pub struct RecordingHistory {
    records: Mutex<Vec<RecordedExecution>>,
}

impl RecordingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RecordedExecution> {
        lock(&self.records).clone()
    }
}

impl HistoryRecorder for RecordingHistory {
    fn record_execution(&self, command: &str, output: &str, exit_code: i64) {
        lock(&self.records).push(RecordedExecution {
            command: command.to_string(),
            output: output.to_string(),
            exit_code,
        });
    }
}

// =============================================================================
// Fixed Directory
// =============================================================================

/// Working directory provider pinned to one path, switchable from tests.
pub struct FixedDirectory {
    path: Mutex<PathBuf>,
}

impl FixedDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Mutex::new(path.into()),
        }
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *lock(&self.path) = path.into();
    }
}

impl WorkingDirectory for FixedDirectory {
    fn working_directory(&self) -> PathBuf {
        lock(&self.path).clone()
    }
}
