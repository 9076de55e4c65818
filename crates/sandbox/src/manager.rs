//! Sandbox lifecycle management.
//!
//! [`SandboxManager`] owns at most one persistent container, bound to one
//! host directory, and runs commands in it. When the container is gone or
//! the runtime misbehaves it walks a fixed recovery chain:
//!
//! ```text
//! reuse ──▶ recreate + retry once ──▶ one-off container ──▶ exit 1
//! ```
//!
//! `run` never returns an error; every fault ends up in the command's exit
//! code and stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shellguard_core::{CommandOutput, Error, Result, EXIT_FAILURE, EXIT_TIMEOUT};

use crate::engine::{
    ContainerStatus, DockerSandbox, FaultResult, RuntimeFault, SandboxConfig, SandboxEngine,
    SandboxId,
};

/// Grace period given to the persistent container before it is force-removed.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Directory (relative to the installation root) holding the sandbox Dockerfile.
pub const BUILD_CONTEXT_DIR: &str = "docker";

const FALLBACKS_TOTAL: &str = "shellguard_sandbox_fallbacks_total";

/// Persistent container handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistentState {
    Absent,
    /// A create call is in flight for this mount.
    Creating { mount: Option<PathBuf> },
    Running {
        id: SandboxId,
        mount: Option<PathBuf>,
    },
    /// The runtime reported the container missing; it must be torn down.
    Stale { id: SandboxId },
}

/// Owns the persistent sandbox container and runs commands in it.
pub struct SandboxManager {
    engine: Arc<dyn SandboxEngine>,
    config: SandboxConfig,
    // Held for the whole of `run` so reuse decisions and teardown cannot race.
    persistent: tokio::sync::Mutex<PersistentState>,
}

impl SandboxManager {
    /// Check that the runtime answers and the sandbox image exists, building
    /// it if needed.
    pub async fn new(engine: Arc<dyn SandboxEngine>, config: SandboxConfig) -> Result<Self> {
        if let Err(fault) = engine.ping().await {
            return Err(Error::runtime_unavailable(format!(
                "Docker is not available ({}).\n\
                 Please ensure:\n  \
                 1) Docker is installed and the daemon is running\n  \
                 2) your user can access the Docker socket, or DOCKER_HOST points at a daemon\n  \
                 3) `docker info` succeeds in this shell",
                fault
            )));
        }

        let manager = Self {
            engine,
            config,
            persistent: tokio::sync::Mutex::new(PersistentState::Absent),
        };
        manager.ensure_image().await?;
        Ok(manager)
    }

    /// Connect to the local Docker daemon.
    pub async fn connect(config: SandboxConfig) -> Result<Self> {
        let engine = DockerSandbox::new()?;
        Self::new(Arc::new(engine), config).await
    }

    async fn ensure_image(&self) -> Result<()> {
        let image = &self.config.image;
        let exists = self
            .engine
            .image_exists(image)
            .await
            .map_err(|fault| Error::sandbox(format!("Failed to inspect image '{}': {}", image, fault)))?;
        if exists {
            return Ok(());
        }

        let context = locate_build_context(self.config.build_context.as_deref()).map_err(|path| Error::ImageMissing {
            image: image.clone(),
            path,
        })?;

        tracing::info!(
            image = %image,
            context = %context.display(),
            "Sandbox image not found, building it (first run may take a few minutes)"
        );
        self.engine.build_image(image, &context).await
    }

    /// Whether the runtime still answers.
    pub async fn is_available(&self) -> bool {
        self.engine.ping().await.is_ok()
    }

    /// Id of the current persistent container, if one is running.
    pub async fn persistent_id(&self) -> Option<SandboxId> {
        match &*self.persistent.lock().await {
            PersistentState::Running { id, .. } => Some(id.clone()),
            _ => None,
        }
    }

    /// Run `command` in the sandbox with `working_dir` mounted.
    pub async fn run(&self, command: &str, working_dir: Option<&Path>) -> CommandOutput {
        let output = self.dispatch(command, working_dir).await;
        self.explain_timeout(output)
    }

    /// 124 comes from either the in-container `timeout` or a runtime
    /// deadline; both get the same notice on stderr.
    fn explain_timeout(&self, mut output: CommandOutput) -> CommandOutput {
        if output.exit_code == EXIT_TIMEOUT {
            if !output.stderr.is_empty() && !output.stderr.ends_with('\n') {
                output.stderr.push('\n');
            }
            output.stderr.push_str(&format!(
                "Command timed out after {} seconds",
                self.config.timeout.as_secs()
            ));
        }
        output
    }

    async fn dispatch(&self, command: &str, working_dir: Option<&Path>) -> CommandOutput {
        let argv = self.config.wrap_command(command);

        if !self.config.reuse_container {
            return self.one_off_or_failure(&argv, working_dir, "Docker error").await;
        }

        let mut state = self.persistent.lock().await;

        let id = match self.acquire(&mut state, working_dir).await {
            Ok(id) => id,
            Err(fault) => {
                tracing::warn!(error = %fault, "Could not create persistent container, using a one-off");
                track_fallback("one_off");
                return self.one_off_or_failure(&argv, working_dir, "Docker error").await;
            }
        };

        match self.engine.exec(&id, &argv, self.config.outer_deadline()).await {
            Ok(output) => output,
            Err(RuntimeFault::NotFound(message)) => {
                tracing::warn!(container_id = %id, %message, "Persistent container vanished, recreating");
                track_fallback("recreate");
                *state = PersistentState::Stale { id };
                self.teardown(&mut state).await;

                let retried = match self.acquire(&mut state, working_dir).await {
                    Ok(new_id) => self.engine.exec(&new_id, &argv, self.config.outer_deadline()).await,
                    Err(fault) => Err(fault),
                };
                match retried {
                    Ok(output) => output,
                    Err(fault) => {
                        tracing::warn!(error = %fault, "Retry failed, using a one-off container");
                        track_fallback("one_off");
                        self.one_off_or_failure(&argv, working_dir, "Docker error").await
                    }
                }
            }
            Err(RuntimeFault::Api(message)) => {
                tracing::warn!(container_id = %id, %message, "Exec API error, using a one-off container");
                track_fallback("one_off");
                self.one_off_or_failure(&argv, working_dir, "Exec API error and fallback failed")
                    .await
            }
            Err(RuntimeFault::Other(message)) => {
                tracing::error!(container_id = %id, %message, "Exec failed");
                CommandOutput::failure(EXIT_FAILURE, format!("Exec error: {}", message))
            }
        }
    }

    /// Return a running persistent container bound to `mount`, replacing the
    /// current one if it is gone, stopped, or bound elsewhere.
    async fn acquire(
        &self,
        state: &mut PersistentState,
        mount: Option<&Path>,
    ) -> FaultResult<SandboxId> {
        match std::mem::replace(state, PersistentState::Absent) {
            PersistentState::Running {
                id,
                mount: current_mount,
            } => match self.engine.status(&id).await {
                Ok(ContainerStatus::Running) if current_mount.as_deref() == mount => {
                    *state = PersistentState::Running {
                        id: id.clone(),
                        mount: current_mount,
                    };
                    return Ok(id);
                }
                Ok(ContainerStatus::Running) => {
                    tracing::debug!(container_id = %id, "Working directory changed, replacing container");
                    self.destroy(&id).await;
                }
                Ok(ContainerStatus::NotRunning(status)) => {
                    tracing::debug!(container_id = %id, %status, "Persistent container not running");
                    self.destroy(&id).await;
                }
                Err(RuntimeFault::NotFound(_)) => {
                    tracing::debug!(container_id = %id, "Persistent container removed externally");
                }
                Err(fault) => {
                    tracing::debug!(container_id = %id, error = %fault, "Persistent container in bad state");
                    self.destroy(&id).await;
                }
            },
            PersistentState::Stale { id } => self.destroy(&id).await,
            PersistentState::Absent | PersistentState::Creating { .. } => {}
        }

        *state = PersistentState::Creating {
            mount: mount.map(Path::to_path_buf),
        };
        let spec = self
            .config
            .container_spec(vec!["sleep".to_string(), "infinity".to_string()], mount);

        match self.engine.create(&spec).await {
            Ok(id) => {
                tracing::info!(
                    container_id = %id,
                    working_dir = ?mount,
                    "Persistent sandbox container started"
                );
                *state = PersistentState::Running {
                    id: id.clone(),
                    mount: mount.map(Path::to_path_buf),
                };
                Ok(id)
            }
            Err(fault) => {
                *state = PersistentState::Absent;
                Err(fault)
            }
        }
    }

    async fn teardown(&self, state: &mut PersistentState) {
        match std::mem::replace(state, PersistentState::Absent) {
            PersistentState::Running { id, .. } | PersistentState::Stale { id } => {
                self.destroy(&id).await
            }
            PersistentState::Absent | PersistentState::Creating { .. } => {}
        }
    }

    /// Stop then force-remove, ignoring failures from either step.
    async fn destroy(&self, id: &SandboxId) {
        if let Err(fault) = self.engine.stop(id, STOP_GRACE).await {
            tracing::debug!(container_id = %id, error = %fault, "Stop failed");
        }
        if let Err(fault) = self.engine.remove(id).await {
            tracing::debug!(container_id = %id, error = %fault, "Remove failed");
        }
    }

    async fn one_off_or_failure(
        &self,
        argv: &[String],
        mount: Option<&Path>,
        failure_prefix: &str,
    ) -> CommandOutput {
        match self.run_one_off(argv, mount).await {
            Ok(output) => output,
            Err(fault) => {
                tracing::error!(error = %fault, "One-off sandbox execution failed");
                CommandOutput::failure(EXIT_FAILURE, format!("{}: {}", failure_prefix, fault))
            }
        }
    }

    /// Run in a fresh container that is removed afterwards, whatever happened.
    async fn run_one_off(&self, argv: &[String], mount: Option<&Path>) -> FaultResult<CommandOutput> {
        let spec = self.config.container_spec(argv.to_vec(), mount);
        let id = self.engine.create(&spec).await?;

        let result = async {
            let exit_code = self.engine.wait(&id, self.config.outer_deadline()).await?;
            let (stdout, stderr) = self.engine.logs(&id).await?;
            Ok::<_, RuntimeFault>(CommandOutput::new(exit_code, stdout, stderr))
        }
        .await;

        if let Err(fault) = self.engine.remove(&id).await {
            tracing::warn!(container_id = %id, error = %fault, "Failed to remove one-off container");
        }
        result
    }

    /// Tear down the persistent container and remove any container built
    /// from the sandbox image. Returns how many leftovers were removed.
    pub async fn cleanup(&self) -> usize {
        {
            let mut state = self.persistent.lock().await;
            self.teardown(&mut state).await;
        }

        remove_leftovers(self.engine.as_ref(), &self.config.image).await
    }
}

/// Remove every managed container created from `image`. Returns how many
/// were removed.
pub async fn remove_leftovers(engine: &dyn SandboxEngine, image: &str) -> usize {
    let leftovers = match engine.list_by_image(image).await {
        Ok(ids) => ids,
        Err(fault) => {
            tracing::debug!(error = %fault, "Could not list leftover containers");
            return 0;
        }
    };

    let mut removed = 0;
    for id in leftovers {
        match engine.remove(&id).await {
            Ok(()) => removed += 1,
            Err(fault) => tracing::debug!(container_id = %id, error = %fault, "Leftover removal failed"),
        }
    }
    if removed > 0 {
        tracing::info!(removed, "Removed leftover sandbox containers");
    }
    removed
}

fn track_fallback(reason: &'static str) {
    metrics::counter!(FALLBACKS_TOTAL, "reason" => reason).increment(1);
}

/// `dir` if it contains a Dockerfile, else the path that was expected.
pub fn check_build_context(dir: &Path) -> std::result::Result<PathBuf, PathBuf> {
    let dockerfile = dir.join("Dockerfile");
    if dockerfile.is_file() {
        Ok(dir.to_path_buf())
    } else {
        Err(dockerfile)
    }
}

/// Look for `docker/Dockerfile` in `start` and each of its ancestors.
///
/// Covers both an installed layout (`<root>/bin/shellguard`) and a cargo
/// build tree (`<root>/target/debug/shellguard`).
pub fn find_build_context(start: &Path) -> std::result::Result<PathBuf, PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(BUILD_CONTEXT_DIR))
        .find(|candidate| candidate.join("Dockerfile").is_file())
        .ok_or_else(|| start.join(BUILD_CONTEXT_DIR).join("Dockerfile"))
}

/// The configured build context, or the one next to the installed binary.
pub fn locate_build_context(configured: Option<&Path>) -> std::result::Result<PathBuf, PathBuf> {
    if let Some(dir) = configured {
        return check_build_context(dir);
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    match exe_dir {
        Some(dir) => find_build_context(&dir),
        None => Err(PathBuf::from(BUILD_CONTEXT_DIR).join("Dockerfile")),
    }
}
