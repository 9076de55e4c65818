use serde::{Deserialize, Serialize};

// =============================================================================
// Risk Levels
// =============================================================================

/// Risk classification for a shell command.
///
/// Ordered by the isolation strength each tier requires, so
/// `Safe < Moderate < Dangerous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only command, runs on the host.
    Safe,
    /// Modifies files or state; sandboxed unless policy allows host execution.
    Moderate,
    /// Destructive or chained; always sandboxed and requires confirmation.
    Dangerous,
}

impl RiskLevel {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Moderate => "moderate",
            Self::Dangerous => "dangerous",
        }
    }

    /// Short badge for terminal output.
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Safe => "🟢",
            Self::Moderate => "🟡",
            Self::Dangerous => "🔴",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a command: the tier plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub level: RiskLevel,
    pub reason: String,
}

impl Classification {
    pub fn new(level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
        }
    }
}
