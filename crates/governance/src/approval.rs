//! Operator confirmation for dangerous commands.
//!
//! [`StdinPrompt`] asks on the terminal. [`AutoApprove`] and [`AutoDeny`]
//! answer without asking, for non-interactive runs.

use async_trait::async_trait;
use std::future::Future;
use std::io::{self, BufRead, Write};

use shellguard_core::ConfirmationPrompt;

const QUESTION: &str = "Do you want to proceed? (yes/no): ";

// =============================================================================
// Terminal Prompt
// =============================================================================

/// Interactive yes/no prompt on stdin.
///
/// Re-asks until the answer is `yes`/`y` or `no`/`n`. End of input counts
/// as no.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl StdinPrompt {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, command: &str, reason: &str) -> bool {
        eprintln!();
        eprintln!("⚠️  WARNING: Potentially dangerous command detected!");
        eprintln!("Command: {}", command);
        eprintln!("Reason: {}", reason);
        eprintln!();

        let approved = ask_until_answered(|| read_line(QUESTION)).await;
        tracing::info!(command = %command, approved, "Operator answered confirmation prompt");
        approved
    }
}

/// Interpret an answer. `None` means the answer was not understood.
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

async fn ask_until_answered<F, Fut>(mut next_line: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<Option<String>>>,
{
    loop {
        match next_line().await {
            Ok(Some(line)) => match parse_answer(&line) {
                Some(answer) => return answer,
                None => eprintln!("Please answer 'yes' or 'no'"),
            },
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read confirmation answer");
                return false;
            }
        }
    }
}

/// Print `prompt` to stderr and read one line from stdin without blocking
/// the runtime. Returns `None` at end of input.
pub async fn read_line(prompt: &str) -> io::Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(|c| c == '\n' || c == '\r').to_string()))
    })
    .await
    .map_err(io::Error::other)?
}

// =============================================================================
// Non-Interactive Prompts
// =============================================================================

/// Approves every command. Used for `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ConfirmationPrompt for AutoApprove {
    async fn confirm(&self, command: &str, _reason: &str) -> bool {
        tracing::debug!(command = %command, "Auto-approving");
        true
    }
}

/// Declines every command. Used when stdin is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDeny;

#[async_trait]
impl ConfirmationPrompt for AutoDeny {
    async fn confirm(&self, command: &str, reason: &str) -> bool {
        tracing::warn!(command = %command, reason = %reason, "No operator available, declining");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn scripted(lines: &[&str]) -> VecDeque<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("yes"), Some(true));
        assert_eq!(parse_answer(" Y "), Some(true));
        assert_eq!(parse_answer("NO"), Some(false));
        assert_eq!(parse_answer("n"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[tokio::test]
    async fn test_reasks_until_understood() {
        let mut lines = scripted(&["sure", "", "y"]);
        let mut asked = 0;
        let answer = ask_until_answered(|| {
            asked += 1;
            let line = lines.pop_front();
            async move { Ok(line) }
        })
        .await;
        assert!(answer);
        assert_eq!(asked, 3);
    }

    #[tokio::test]
    async fn test_end_of_input_declines() {
        let mut lines = scripted(&["what?"]);
        let answer = ask_until_answered(|| {
            let line = lines.pop_front();
            async move { Ok(line) }
        })
        .await;
        assert!(!answer);
    }

    #[tokio::test]
    async fn test_read_error_declines() {
        let answer = ask_until_answered(|| async {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        })
        .await;
        assert!(!answer);
    }

    #[tokio::test]
    async fn test_auto_prompts() {
        assert!(AutoApprove.confirm("rm -rf /tmp/x", "pattern").await);
        assert!(!AutoDeny.confirm("rm -rf /tmp/x", "pattern").await);
    }
}
