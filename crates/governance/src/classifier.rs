//! Command safety classification.
//!
//! Maps a shell command to a [`RiskLevel`] using a fixed sequence of checks:
//!
//! 1. chaining and substitution operators
//! 2. pipes into an interpreter or network client
//! 3. the configured dangerous patterns, in order
//! 4. allow-list lookup on the base command (`sudo ` stripped)
//! 5. default to Moderate
//!
//! The first check that matches decides. Classification never touches the
//! filesystem or the network.

use regex::Regex;
use std::collections::HashSet;

use shellguard_core::{Classification, Error, PolicyConfig, Result, RiskLevel};

/// Operators that let one command line run several commands or splice in
/// the output of another. Paired with the label used in the reason.
const CHAIN_OPERATORS: &[(&str, &str)] = &[
    ("&&", "&&"),
    ("||", "||"),
    (";", ";"),
    ("$(", "$("),
    ("`", "`"),
    ("\n", "\\n"),
];

const INTERPRETER_PIPE: &str = r"\|\s*(sh|bash|zsh|python|perl|ruby|nc|curl|wget|telnet)\b";

const SUDO_PREFIX: &str = "sudo ";

/// Rule-based command classifier built from a [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct SafetyClassifier {
    safe_commands: HashSet<String>,
    moderate_commands: HashSet<String>,
    dangerous_patterns: Vec<(String, Regex)>,
    interpreter_pipe: Regex,
    run_moderate_on_host: bool,
}

impl SafetyClassifier {
    /// Compile the policy. Fails on the first pattern that is not a valid regex.
    pub fn new(policy: &PolicyConfig) -> Result<Self> {
        let dangerous_patterns = policy
            .dangerous_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|re| (pattern.clone(), re))
                    .map_err(|e| Error::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let interpreter_pipe =
            Regex::new(INTERPRETER_PIPE).map_err(|e| Error::internal(e.to_string()))?;

        tracing::debug!(
            safe = policy.safe_commands.len(),
            moderate = policy.moderate_commands.len(),
            patterns = dangerous_patterns.len(),
            "Safety classifier compiled"
        );

        Ok(Self {
            safe_commands: policy.safe_commands.clone(),
            moderate_commands: policy.moderate_commands.clone(),
            dangerous_patterns,
            interpreter_pipe,
            run_moderate_on_host: policy.run_moderate_on_host,
        })
    }

    /// Classify a command.
    pub fn classify(&self, command: &str) -> Classification {
        let command = command.trim();

        if let Some((_, label)) = CHAIN_OPERATORS.iter().find(|(op, _)| command.contains(op)) {
            return Classification::new(
                RiskLevel::Dangerous,
                format!("Compound or chained command detected: {}", label),
            );
        }

        if self.interpreter_pipe.is_match(command) {
            return Classification::new(
                RiskLevel::Dangerous,
                "Dangerous pipe to shell/interpreter detected",
            );
        }

        if let Some((pattern, _)) = self
            .dangerous_patterns
            .iter()
            .find(|(_, re)| re.is_match(command))
        {
            return Classification::new(
                RiskLevel::Dangerous,
                format!("Contains dangerous pattern: {}", pattern),
            );
        }

        let base = base_command(command);

        if self.safe_commands.contains(base) {
            return Classification::new(
                RiskLevel::Safe,
                "Read-only command, safe to execute on host",
            );
        }

        if self.moderate_commands.contains(base) {
            return Classification::new(
                RiskLevel::Moderate,
                "File modification command, will run in Docker sandbox",
            );
        }

        Classification::new(
            RiskLevel::Moderate,
            "Unknown command, will run in Docker sandbox for safety",
        )
    }

    /// Whether a command of this level must run in the sandbox.
    pub fn should_use_sandbox(&self, level: RiskLevel) -> bool {
        match level {
            RiskLevel::Safe => false,
            RiskLevel::Moderate => !self.run_moderate_on_host,
            RiskLevel::Dangerous => true,
        }
    }

    /// Whether the operator must approve a command of this level first.
    pub fn requires_confirmation(&self, level: RiskLevel) -> bool {
        level == RiskLevel::Dangerous
    }
}

/// First whitespace-delimited token after stripping a leading `sudo `.
pub fn base_command(command: &str) -> &str {
    let command = command.trim();
    let command = command
        .strip_prefix(SUDO_PREFIX)
        .map(str::trim_start)
        .unwrap_or(command);
    command.split_whitespace().next().unwrap_or("")
}
