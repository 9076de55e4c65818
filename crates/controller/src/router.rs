//! Execution routing.
//!
//! The router classifies a command, asks for confirmation when the command
//! is dangerous, and runs it either on the host or in the sandbox. Every
//! path ends in an [`ExecutionResult`]; nothing is propagated as an error.

use std::sync::Arc;
use std::time::Instant;

use shellguard_core::{
    Classification, CommandOutput, ConfirmationPrompt, Error, ExecutionResult, HistoryRecorder,
    Venue, WorkingDirectory, EXIT_FAILURE,
};
use shellguard_governance::{track_command, SafetyClassifier};
use shellguard_sandbox::{DockerSandbox, SandboxConfig, SandboxEngine, SandboxManager};

use crate::host::HostRunner;

pub struct ExecutionRouter {
    pub(crate) classifier: SafetyClassifier,
    pub(crate) host: HostRunner,
    /// Connected on first use; an empty cell is retried on the next call.
    pub(crate) sandbox: tokio::sync::OnceCell<Arc<SandboxManager>>,
    pub(crate) sandbox_config: SandboxConfig,
    /// Engine for the lazy connect; the local Docker daemon when unset.
    pub(crate) engine: Option<Arc<dyn SandboxEngine>>,
    pub(crate) prompt: Arc<dyn ConfirmationPrompt>,
    pub(crate) workdir: Arc<dyn WorkingDirectory>,
    pub(crate) history: Arc<dyn HistoryRecorder>,
}

impl ExecutionRouter {
    /// Classify, confirm if needed, execute, and record one command.
    ///
    /// `auto_confirm` skips the operator prompt for dangerous commands.
    pub async fn execute(&self, command: &str, auto_confirm: bool) -> ExecutionResult {
        let started = Instant::now();
        let Classification { level, reason } = self.classifier.classify(command);
        tracing::debug!(command = %command, risk = %level, reason = %reason, "Command classified");

        if self.classifier.requires_confirmation(level)
            && !auto_confirm
            && !self.prompt.confirm(command, &reason).await
        {
            tracing::info!(command = %command, risk = %level, "Command cancelled by operator");
            return ExecutionResult::cancelled(level);
        }

        let (output, venue) = if self.classifier.should_use_sandbox(level) {
            (self.run_in_sandbox(command).await, Venue::Sandbox)
        } else {
            let cwd = self.workdir.working_directory();
            (self.host.run(command, &cwd).await, Venue::Host)
        };

        self.history
            .record_execution(command, &output.stdout, output.exit_code);

        let elapsed = started.elapsed();
        track_command(level, venue, elapsed.as_secs_f64());
        tracing::info!(
            command = %command,
            risk = %level,
            venue = venue.as_str(),
            exit_code = output.exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Command finished"
        );

        ExecutionResult::from_output(output, level, venue)
    }

    /// Classify without executing.
    pub fn classify(&self, command: &str) -> Classification {
        self.classifier.classify(command)
    }

    pub fn classifier(&self) -> &SafetyClassifier {
        &self.classifier
    }

    async fn run_in_sandbox(&self, command: &str) -> CommandOutput {
        let manager = match self
            .sandbox
            .get_or_try_init(|| async {
                let config = self.sandbox_config.clone();
                let manager = match &self.engine {
                    Some(engine) => SandboxManager::new(engine.clone(), config).await?,
                    None => SandboxManager::connect(config).await?,
                };
                Ok::<_, Error>(Arc::new(manager))
            })
            .await
        {
            Ok(manager) => manager,
            Err(e) => {
                tracing::error!(error = %e, "Sandbox unavailable");
                return CommandOutput::failure(
                    EXIT_FAILURE,
                    format!("Docker execution error: {}", e),
                );
            }
        };

        let cwd = self.workdir.working_directory();
        manager.run(command, Some(&cwd)).await
    }

    /// Whether sandboxed execution can work. Does not create containers or
    /// build images.
    pub async fn is_docker_available(&self) -> bool {
        match self.sandbox.get() {
            Some(manager) => manager.is_available().await,
            None => match &self.engine {
                Some(engine) => engine.ping().await.is_ok(),
                None => DockerSandbox::is_reachable().await,
            },
        }
    }

    /// Remove sandbox containers. Safe to call any number of times.
    pub async fn cleanup(&self) {
        if let Some(manager) = self.sandbox.get() {
            manager.cleanup().await;
        }
    }
}
