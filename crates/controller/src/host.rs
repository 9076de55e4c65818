//! Direct execution on the host.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use shellguard_core::{CommandOutput, EXIT_FAILURE, EXIT_NOT_FOUND, EXIT_TIMEOUT};

/// Timeout for commands run on the host.
pub const HOST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs commands through a non-interactive shell on the host.
#[derive(Debug, Clone)]
pub struct HostRunner {
    shell: String,
    timeout: Duration,
}

impl Default for HostRunner {
    fn default() -> Self {
        Self::new("bash", HOST_TIMEOUT)
    }
}

impl HostRunner {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    /// Run `command` in `cwd`, capturing both streams.
    ///
    /// Faults map to shell conventions: 124 on timeout, 127 when the shell
    /// cannot be spawned, 1 for anything else.
    pub async fn run(&self, command: &str, cwd: &Path) -> CommandOutput {
        tracing::debug!(command = %command, working_dir = %cwd.display(), "Running on host");

        let child = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => CommandOutput::new(
                output.status.code().map(i64::from).unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let name = command.split_whitespace().next().unwrap_or("unknown");
                CommandOutput::failure(EXIT_NOT_FOUND, format!("Command not found: {}", name))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Host execution failed");
                CommandOutput::failure(EXIT_FAILURE, format!("Error executing command: {}", e))
            }
            Err(_) => {
                tracing::warn!(command = %command, "Host command timed out");
                CommandOutput::failure(
                    EXIT_TIMEOUT,
                    format!("Command timed out after {} seconds", self.timeout.as_secs()),
                )
            }
        }
    }
}
