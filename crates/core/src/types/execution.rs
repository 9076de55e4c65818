use serde::{Deserialize, Serialize};

use super::risk::RiskLevel;

/// Exit code reported when a command exceeds its time limit.
pub const EXIT_TIMEOUT: i64 = 124;

/// Exit code reported when the command or its shell cannot be resolved.
pub const EXIT_NOT_FOUND: i64 = 127;

/// Exit code for cancellations and absorbed runtime faults.
pub const EXIT_FAILURE: i64 = 1;

/// Stderr message returned when the operator declines a dangerous command.
pub const CANCELLED_MESSAGE: &str = "Command execution cancelled by user";

// =============================================================================
// Execution Venue
// =============================================================================

/// Where a command was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Host,
    Sandbox,
    /// Nothing ran (e.g. the operator declined).
    None,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Sandbox => "sandbox",
            Self::None => "none",
        }
    }
}

// =============================================================================
// Command Output
// =============================================================================

/// Normalized output of one command run, independent of where it ran.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i64, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// An output with no stdout and the given exit code and message on stderr.
    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self::new(exit_code, String::new(), stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// =============================================================================
// Execution Result
// =============================================================================

/// Uniform result of routing one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub risk_level: RiskLevel,
    pub venue: Venue,
}

impl ExecutionResult {
    pub fn from_output(output: CommandOutput, risk_level: RiskLevel, venue: Venue) -> Self {
        Self {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            risk_level,
            venue,
        }
    }

    /// Result returned when the operator declines a command.
    pub fn cancelled(risk_level: RiskLevel) -> Self {
        Self::from_output(
            CommandOutput::failure(EXIT_FAILURE, CANCELLED_MESSAGE),
            risk_level,
            Venue::None,
        )
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.venue == Venue::None && self.stderr == CANCELLED_MESSAGE
    }

    /// Destructure into the `(exit_code, stdout, stderr, risk_level)` tuple.
    pub fn into_parts(self) -> (i64, String, String, RiskLevel) {
        (self.exit_code, self.stdout, self.stderr, self.risk_level)
    }
}
