//! Governance traits.

use async_trait::async_trait;

/// Interactive yes/no gate consulted before a dangerous command runs.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// Ask the operator whether `command` may run. `reason` explains why the
    /// command was flagged. Returns `true` only on an explicit yes.
    async fn confirm(&self, command: &str, reason: &str) -> bool;
}
