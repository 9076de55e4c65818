//! Builder for [`ExecutionRouter`].

use std::sync::Arc;

use shellguard_core::{
    AppConfig, ConfirmationPrompt, HistoryRecorder, Result, SessionContext, WorkingDirectory,
};
use shellguard_governance::{SafetyClassifier, StdinPrompt};
use shellguard_sandbox::{SandboxConfig, SandboxEngine, SandboxManager};

use crate::host::HostRunner;
use crate::router::ExecutionRouter;

/// Builder for creating an ExecutionRouter.
///
/// Collaborators left unset fall back to a terminal prompt and a
/// [`SessionContext`] rooted at the current directory. The sandbox connects
/// lazily on the first command that needs it unless one is supplied.
pub struct RouterBuilder {
    config: AppConfig,
    sandbox: Option<Arc<SandboxManager>>,
    engine: Option<Arc<dyn SandboxEngine>>,
    prompt: Option<Arc<dyn ConfirmationPrompt>>,
    workdir: Option<Arc<dyn WorkingDirectory>>,
    history: Option<Arc<dyn HistoryRecorder>>,
    host: HostRunner,
}

impl RouterBuilder {
    /// Create a new builder from the loaded configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            sandbox: None,
            engine: None,
            prompt: None,
            workdir: None,
            history: None,
            host: HostRunner::default(),
        }
    }

    /// Use an already connected sandbox manager.
    pub fn with_sandbox(mut self, sandbox: Arc<SandboxManager>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Connect lazily through `engine` instead of the local Docker daemon.
    /// Ignored when a connected sandbox is supplied.
    pub fn with_sandbox_engine(mut self, engine: Arc<dyn SandboxEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the confirmation prompt for dangerous commands.
    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Use one session for both the working directory and history.
    pub fn with_session(mut self, session: Arc<SessionContext>) -> Self {
        self.workdir = Some(session.clone() as Arc<dyn WorkingDirectory>);
        self.history = Some(session as Arc<dyn HistoryRecorder>);
        self
    }

    pub fn with_working_directory(mut self, workdir: Arc<dyn WorkingDirectory>) -> Self {
        self.workdir = Some(workdir);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryRecorder>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_host_runner(mut self, host: HostRunner) -> Self {
        self.host = host;
        self
    }

    /// Build the ExecutionRouter. Fails on an invalid policy or limits.
    pub fn build(self) -> Result<ExecutionRouter> {
        let classifier = SafetyClassifier::new(&self.config.policy)?;
        let sandbox_config = SandboxConfig::from_app_config(&self.config)?;

        let (workdir, history): (Arc<dyn WorkingDirectory>, Arc<dyn HistoryRecorder>) =
            match (self.workdir, self.history) {
                (Some(w), Some(h)) => (w, h),
                (workdir, history) => {
                    let session = Arc::new(SessionContext::from_current_dir()?);
                    (
                        workdir.unwrap_or_else(|| session.clone() as Arc<dyn WorkingDirectory>),
                        history.unwrap_or(session as Arc<dyn HistoryRecorder>),
                    )
                }
            };

        Ok(ExecutionRouter {
            classifier,
            host: self.host,
            sandbox: tokio::sync::OnceCell::new_with(self.sandbox),
            sandbox_config,
            engine: self.engine,
            prompt: self.prompt.unwrap_or_else(|| Arc::new(StdinPrompt::new())),
            workdir,
            history,
        })
    }
}
