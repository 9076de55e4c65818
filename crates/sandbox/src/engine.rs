//! Sandbox execution engine.
//!
//! This module provides the `SandboxEngine` trait, a Docker implementation
//! using the `bollard` crate, and an in-memory mock. Engines expose the
//! individual container operations; the lifecycle and recovery policy live
//! in [`crate::manager::SandboxManager`].

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shellguard_core::config::CPU_PERIOD_US;
use shellguard_core::{AppConfig, CommandOutput, Error, Result, EXIT_FAILURE, EXIT_TIMEOUT};

/// Label attached to every container this crate creates.
pub const MANAGED_LABEL: &str = "managed-by";
const MANAGED_VALUE: &str = "shellguard";

// =============================================================================
// Sandbox Types
// =============================================================================

/// Unique identifier for a sandbox container.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fault reported by the container runtime.
///
/// The manager picks its recovery step from the variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeFault {
    /// The container (or exec instance) no longer exists.
    #[error("container not found: {0}")]
    NotFound(String),

    /// The runtime answered with an error status.
    #[error("runtime API error: {0}")]
    Api(String),

    /// Transport failures and anything else.
    #[error("{0}")]
    Other(String),
}

impl From<bollard::errors::Error> for RuntimeFault {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as BollardError;
        match err {
            BollardError::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::NotFound(message),
            BollardError::DockerResponseServerError {
                status_code,
                message,
            } => Self::Api(format!("{} (status {})", message, status_code)),
            other => Self::Other(other.to_string()),
        }
    }
}

pub type FaultResult<T> = std::result::Result<T, RuntimeFault>;

/// Live status of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    /// Created, exited, paused, dead, ... with the runtime's state name.
    NotRunning(String),
}

/// Everything needed to create one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// Host directory bind-mounted read-write at `workdir`.
    pub mount: Option<PathBuf>,
    pub workdir: String,
    pub memory_limit: i64,
    pub cpu_quota: i64,
}

/// Sandbox settings resolved from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub image: String,
    /// Maximum memory in bytes.
    pub memory_limit: i64,
    /// CPU quota per 100ms period.
    pub cpu_quota: i64,
    /// In-container command timeout.
    pub timeout: Duration,
    /// Mount point inside the container.
    pub workdir: String,
    pub shell: String,
    pub reuse_container: bool,
    pub build_context: Option<PathBuf>,
}

impl SandboxConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let limits = &config.policy.limits;
        Ok(Self {
            image: config.sandbox.image.clone(),
            memory_limit: limits.memory_bytes()?,
            cpu_quota: limits.cpu_quota()?,
            timeout: Duration::from_secs(limits.timeout_secs),
            workdir: config.sandbox.workdir.clone(),
            shell: config.sandbox.shell.clone(),
            reuse_container: config.sandbox.reuse_container,
            build_context: config.sandbox.build_context.clone(),
        })
    }

    /// `timeout <N>s <shell> -c <command>`
    pub fn wrap_command(&self, command: &str) -> Vec<String> {
        vec![
            "timeout".to_string(),
            format!("{}s", self.timeout.as_secs()),
            self.shell.clone(),
            "-c".to_string(),
            command.to_string(),
        ]
    }

    /// Deadline for runtime calls, a little past the in-container timeout so
    /// the wrapper fires first.
    pub fn outer_deadline(&self) -> Duration {
        self.timeout + Duration::from_secs(5)
    }

    pub fn container_spec(&self, cmd: Vec<String>, mount: Option<&Path>) -> ContainerSpec {
        ContainerSpec {
            image: self.image.clone(),
            cmd,
            mount: mount.map(Path::to_path_buf),
            workdir: self.workdir.clone(),
            memory_limit: self.memory_limit,
            cpu_quota: self.cpu_quota,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "shellguard-sandbox:latest".to_string(),
            memory_limit: 1024 * 1024 * 1024,
            cpu_quota: 2 * CPU_PERIOD_US,
            timeout: Duration::from_secs(300),
            workdir: "/workspace".to_string(),
            shell: "bash".to_string(),
            reuse_container: true,
            build_context: None,
        }
    }
}

// =============================================================================
// Sandbox Engine Trait
// =============================================================================

/// Container runtime operations used by the sandbox manager.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Health check against the daemon.
    async fn ping(&self) -> FaultResult<()>;

    async fn image_exists(&self, image: &str) -> FaultResult<bool>;

    /// Build `image` from the Dockerfile in `context`.
    async fn build_image(&self, image: &str, context: &Path) -> Result<()>;

    /// Create and start a container. A container that fails to start is removed.
    async fn create(&self, spec: &ContainerSpec) -> FaultResult<SandboxId>;

    async fn status(&self, id: &SandboxId) -> FaultResult<ContainerStatus>;

    /// Run `argv` inside a running container, with separate stdout and stderr.
    async fn exec(
        &self,
        id: &SandboxId,
        argv: &[String],
        deadline: Duration,
    ) -> FaultResult<CommandOutput>;

    /// Wait for the container's main process; exit 124 if `deadline` passes first.
    /// Timeouts carry no message, the manager adds one.
    async fn wait(&self, id: &SandboxId, deadline: Duration) -> FaultResult<i64>;

    /// Collected `(stdout, stderr)` of the container's main process.
    async fn logs(&self, id: &SandboxId) -> FaultResult<(String, String)>;

    async fn stop(&self, id: &SandboxId, grace: Duration) -> FaultResult<()>;

    /// Force-remove a container.
    async fn remove(&self, id: &SandboxId) -> FaultResult<()>;

    /// All containers, running or not, created from `image`.
    async fn list_by_image(&self, image: &str) -> FaultResult<Vec<SandboxId>>;
}

// =============================================================================
// Docker Sandbox Implementation
// =============================================================================

const EXEC_INSPECT_ATTEMPTS: u32 = 20;
const EXEC_INSPECT_INTERVAL: Duration = Duration::from_millis(50);

/// Read an exec's exit code once the runtime reports it finished.
///
/// `inspect` yields `(running, exit_code)`. A finished exec without a code
/// counts as a failure.
pub(crate) async fn poll_exit_code<F, Fut>(
    mut inspect: F,
    attempts: u32,
    interval: Duration,
) -> FaultResult<i64>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = FaultResult<(Option<bool>, Option<i64>)>>,
{
    for attempt in 0..attempts {
        let (running, exit_code) = inspect().await?;
        if running != Some(true) {
            return Ok(exit_code.unwrap_or(EXIT_FAILURE));
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(RuntimeFault::Other(format!(
        "exec still running {} ms after its output closed",
        interval.as_millis() * u128::from(attempts)
    )))
}

/// Docker-based sandbox engine using the `bollard` crate.
///
/// Containers are created with:
/// - No network (`network_mode: none`)
/// - Memory and CPU limits
/// - The working directory bind-mounted read-write
pub struct DockerSandbox {
    docker: bollard::Docker,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon (`DOCKER_HOST` or the default socket).
    pub fn new() -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::runtime_unavailable(format!("Failed to connect to Docker daemon: {}", e))
        })?;
        Ok(Self { docker })
    }

    /// Create from an existing bollard Docker client.
    pub fn from_client(docker: bollard::Docker) -> Self {
        Self { docker }
    }

    /// Whether a daemon answers, without keeping a connection around.
    pub async fn is_reachable() -> bool {
        match Self::new() {
            Ok(engine) => engine.ping().await.is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl SandboxEngine for DockerSandbox {
    async fn ping(&self) -> FaultResult<()> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> FaultResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) => match RuntimeFault::from(e) {
                RuntimeFault::NotFound(_) => Ok(false),
                fault => Err(fault),
            },
        }
    }

    async fn build_image(&self, image: &str, context: &Path) -> Result<()> {
        tracing::info!(image = %image, context = %context.display(), "Building sandbox image");

        let output = tokio::process::Command::new("docker")
            .args(["build", "-t", image])
            .arg(context)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::image_build(format!("could not run `docker build`: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::image_build(format!(
                "docker build failed for {}: {}",
                image,
                stderr.trim()
            )));
        }

        tracing::info!(image = %image, "Sandbox image ready");
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> FaultResult<SandboxId> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::HostConfig;

        let name = format!("shellguard-{}", uuid::Uuid::new_v4());

        let host_config = HostConfig {
            memory: Some(spec.memory_limit),
            cpu_quota: Some(spec.cpu_quota),
            cpu_period: Some(CPU_PERIOD_US),
            network_mode: Some("none".to_string()),
            binds: spec
                .mount
                .as_ref()
                .map(|dir| vec![format!("{}:{}:rw", dir.display(), spec.workdir)]),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            working_dir: Some(spec.workdir.clone()),
            host_config: Some(host_config),
            labels: Some(HashMap::from([(
                MANAGED_LABEL.to_string(),
                MANAGED_VALUE.to_string(),
            )])),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await?;

        if let Err(e) = self.docker.start_container::<String>(&name, None).await {
            let id = SandboxId(name);
            let _ = self.remove(&id).await;
            return Err(e.into());
        }

        tracing::debug!(container_id = %name, image = %spec.image, "Sandbox container started");
        Ok(SandboxId(name))
    }

    async fn status(&self, id: &SandboxId) -> FaultResult<ContainerStatus> {
        use bollard::container::InspectContainerOptions;
        use bollard::models::ContainerStateStatusEnum;

        let info = self
            .docker
            .inspect_container(&id.0, None::<InspectContainerOptions>)
            .await?;

        Ok(match info.state.and_then(|s| s.status) {
            Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
            Some(other) => ContainerStatus::NotRunning(format!("{:?}", other).to_lowercase()),
            None => ContainerStatus::NotRunning("unknown".to_string()),
        })
    }

    async fn exec(
        &self,
        id: &SandboxId,
        argv: &[String],
        deadline: Duration,
    ) -> FaultResult<CommandOutput> {
        use bollard::container::LogOutput;
        use bollard::exec::{CreateExecOptions, StartExecResults};
        use futures::StreamExt;

        let exec_options = CreateExecOptions {
            cmd: Some(argv.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let exec = self.docker.create_exec(&id.0, exec_options).await?;
        let start_result = self.docker.start_exec(&exec.id, None).await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            let collect = async {
                while let Some(msg) = output.next().await {
                    match msg? {
                        LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message))
                        }
                        LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message))
                        }
                        _ => {}
                    }
                }
                Ok::<(), RuntimeFault>(())
            };

            match tokio::time::timeout(deadline, collect).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(container_id = %id, "Sandbox exec exceeded its deadline");
                    return Ok(CommandOutput::new(EXIT_TIMEOUT, stdout, stderr));
                }
            }
        }

        // The attach stream can close before the daemon marks the exec finished.
        let exit_code = poll_exit_code(
            || async {
                let inspect = self.docker.inspect_exec(&exec.id).await?;
                Ok::<_, RuntimeFault>((inspect.running, inspect.exit_code))
            },
            EXEC_INSPECT_ATTEMPTS,
            EXEC_INSPECT_INTERVAL,
        )
        .await?;
        Ok(CommandOutput::new(exit_code, stdout, stderr))
    }

    async fn wait(&self, id: &SandboxId, deadline: Duration) -> FaultResult<i64> {
        use bollard::container::WaitContainerOptions;
        use bollard::errors::Error as BollardError;
        use futures::StreamExt;

        let mut stream = self
            .docker
            .wait_container(&id.0, None::<WaitContainerOptions<String>>);

        match tokio::time::timeout(deadline, stream.next()).await {
            Err(_) => {
                tracing::warn!(container_id = %id, "Sandbox container exceeded its deadline");
                Ok(EXIT_TIMEOUT)
            }
            Ok(None) => Err(RuntimeFault::Other(
                "wait stream ended without a status".to_string(),
            )),
            Ok(Some(Ok(response))) => Ok(response.status_code),
            // Non-zero exits arrive as an error carrying the code
            Ok(Some(Err(BollardError::DockerContainerWaitError { code, .. }))) => Ok(code),
            Ok(Some(Err(e))) => Err(e.into()),
        }
    }

    async fn logs(&self, id: &SandboxId) -> FaultResult<(String, String)> {
        use bollard::container::{LogOutput, LogsOptions};
        use futures::StreamExt;

        let mut stream = self.docker.logs(
            &id.0,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(msg) = stream.next().await {
            match msg? {
                LogOutput::StdOut { message } => stdout.push_str(&String::from_utf8_lossy(&message)),
                LogOutput::StdErr { message } => stderr.push_str(&String::from_utf8_lossy(&message)),
                _ => {}
            }
        }
        Ok((stdout, stderr))
    }

    async fn stop(&self, id: &SandboxId, grace: Duration) -> FaultResult<()> {
        use bollard::container::StopContainerOptions;

        self.docker
            .stop_container(
                &id.0,
                Some(StopContainerOptions {
                    t: grace.as_secs() as i64,
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &SandboxId) -> FaultResult<()> {
        use bollard::container::RemoveContainerOptions;

        self.docker
            .remove_container(
                &id.0,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        tracing::debug!(container_id = %id, "Sandbox container removed");
        Ok(())
    }

    async fn list_by_image(&self, image: &str) -> FaultResult<Vec<SandboxId>> {
        use bollard::container::ListContainersOptions;

        let filters = HashMap::from([("ancestor".to_string(), vec![image.to_string()])]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| c.id.map(SandboxId))
            .collect())
    }
}

// =============================================================================
// Mock Sandbox (for testing without Docker)
// =============================================================================

#[derive(Debug, Clone)]
struct MockContainer {
    spec: ContainerSpec,
    running: bool,
    output: Option<CommandOutput>,
}

#[derive(Default)]
struct MockState {
    available: bool,
    fail_builds: bool,
    images: HashSet<String>,
    containers: HashMap<SandboxId, MockContainer>,
    created: Vec<ContainerSpec>,
    removed: Vec<SandboxId>,
    exec_calls: Vec<(SandboxId, Vec<String>)>,
    builds: Vec<(String, PathBuf)>,
    exec_faults: VecDeque<RuntimeFault>,
    create_faults: VecDeque<RuntimeFault>,
    responses: VecDeque<CommandOutput>,
}

/// In-memory container runtime for tests.
///
/// Containers live in a map; faults and command outputs are scripted with
/// queues. Without a scripted response a command echoes itself on stdout.
pub struct MockSandbox {
    state: tokio::sync::Mutex<MockState>,
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSandbox {
    fn from_state(state: MockState) -> Self {
        Self {
            state: tokio::sync::Mutex::new(state),
        }
    }

    /// A reachable runtime with no images.
    pub fn new() -> Self {
        Self::from_state(MockState {
            available: true,
            ..Default::default()
        })
    }

    /// A reachable runtime that already has `image`.
    pub fn with_image(image: &str) -> Self {
        let mut state = MockState {
            available: true,
            ..Default::default()
        };
        state.images.insert(image.to_string());
        Self::from_state(state)
    }

    /// A runtime whose daemon never answers.
    pub fn unavailable() -> Self {
        Self::from_state(MockState::default())
    }

    pub async fn fail_builds(&self) {
        self.state.lock().await.fail_builds = true;
    }

    /// Next `exec` call fails with `fault`.
    pub async fn push_exec_fault(&self, fault: RuntimeFault) {
        self.state.lock().await.exec_faults.push_back(fault);
    }

    /// Next `create` call fails with `fault`.
    pub async fn push_create_fault(&self, fault: RuntimeFault) {
        self.state.lock().await.create_faults.push_back(fault);
    }

    /// Output for the next command run, persistent or one-off.
    pub async fn push_response(&self, output: CommandOutput) {
        self.state.lock().await.responses.push_back(output);
    }

    /// Remove a container behind the manager's back.
    pub async fn kill(&self, id: &SandboxId) {
        self.state.lock().await.containers.remove(id);
    }

    /// Mark a container as exited.
    pub async fn set_stopped(&self, id: &SandboxId) {
        if let Some(c) = self.state.lock().await.containers.get_mut(id) {
            c.running = false;
        }
    }

    /// Add a container the manager does not know about, e.g. left over from
    /// a crashed process.
    pub async fn add_leftover(&self, image: &str) -> SandboxId {
        let id = SandboxId(format!("leftover-{}", uuid::Uuid::new_v4()));
        let spec = ContainerSpec {
            image: image.to_string(),
            cmd: vec!["sleep".to_string(), "infinity".to_string()],
            mount: None,
            workdir: "/workspace".to_string(),
            memory_limit: 0,
            cpu_quota: 0,
        };
        self.state.lock().await.containers.insert(
            id.clone(),
            MockContainer {
                spec,
                running: false,
                output: None,
            },
        );
        id
    }

    /// Specs of every container created, in order.
    pub async fn created(&self) -> Vec<ContainerSpec> {
        self.state.lock().await.created.clone()
    }

    pub async fn removed(&self) -> Vec<SandboxId> {
        self.state.lock().await.removed.clone()
    }

    pub async fn exec_calls(&self) -> Vec<(SandboxId, Vec<String>)> {
        self.state.lock().await.exec_calls.clone()
    }

    pub async fn builds(&self) -> Vec<(String, PathBuf)> {
        self.state.lock().await.builds.clone()
    }

    /// Ids of containers that still exist.
    pub async fn live_containers(&self) -> Vec<SandboxId> {
        self.state.lock().await.containers.keys().cloned().collect()
    }
}

fn echo_output(argv: &[String]) -> CommandOutput {
    let command = argv.last().cloned().unwrap_or_default();
    CommandOutput::new(0, format!("[mock] {}\n", command), String::new())
}

#[async_trait]
impl SandboxEngine for MockSandbox {
    async fn ping(&self) -> FaultResult<()> {
        if self.state.lock().await.available {
            Ok(())
        } else {
            Err(RuntimeFault::Other("connection refused".to_string()))
        }
    }

    async fn image_exists(&self, image: &str) -> FaultResult<bool> {
        Ok(self.state.lock().await.images.contains(image))
    }

    async fn build_image(&self, image: &str, context: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        state.builds.push((image.to_string(), context.to_path_buf()));
        if state.fail_builds {
            return Err(Error::image_build(format!("mock build failed for {}", image)));
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> FaultResult<SandboxId> {
        let mut state = self.state.lock().await;
        if let Some(fault) = state.create_faults.pop_front() {
            return Err(fault);
        }
        if !state.images.contains(&spec.image) {
            return Err(RuntimeFault::NotFound(format!("No such image: {}", spec.image)));
        }

        let id = SandboxId(format!("mock-{}", uuid::Uuid::new_v4()));
        state.created.push(spec.clone());
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                running: true,
                output: None,
            },
        );
        Ok(id)
    }

    async fn status(&self, id: &SandboxId) -> FaultResult<ContainerStatus> {
        match self.state.lock().await.containers.get(id) {
            Some(c) if c.running => Ok(ContainerStatus::Running),
            Some(_) => Ok(ContainerStatus::NotRunning("exited".to_string())),
            None => Err(RuntimeFault::NotFound(format!("No such container: {}", id))),
        }
    }

    async fn exec(
        &self,
        id: &SandboxId,
        argv: &[String],
        _deadline: Duration,
    ) -> FaultResult<CommandOutput> {
        let mut state = self.state.lock().await;
        state.exec_calls.push((id.clone(), argv.to_vec()));

        if let Some(fault) = state.exec_faults.pop_front() {
            return Err(fault);
        }
        match state.containers.get(id) {
            None => return Err(RuntimeFault::NotFound(format!("No such container: {}", id))),
            Some(c) if !c.running => {
                return Err(RuntimeFault::Api(format!("Container {} is not running", id)))
            }
            Some(_) => {}
        }

        Ok(state
            .responses
            .pop_front()
            .unwrap_or_else(|| echo_output(argv)))
    }

    async fn wait(&self, id: &SandboxId, _deadline: Duration) -> FaultResult<i64> {
        let mut state = self.state.lock().await;
        let scripted = state.responses.pop_front();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeFault::NotFound(format!("No such container: {}", id)))?;

        let output = scripted.unwrap_or_else(|| echo_output(&container.spec.cmd));
        let code = output.exit_code;
        container.output = Some(output);
        container.running = false;
        Ok(code)
    }

    async fn logs(&self, id: &SandboxId) -> FaultResult<(String, String)> {
        let state = self.state.lock().await;
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| RuntimeFault::NotFound(format!("No such container: {}", id)))?;
        Ok(container
            .output
            .as_ref()
            .map(|o| (o.stdout.clone(), o.stderr.clone()))
            .unwrap_or_default())
    }

    async fn stop(&self, id: &SandboxId, _grace: Duration) -> FaultResult<()> {
        match self.state.lock().await.containers.get_mut(id) {
            Some(c) => {
                c.running = false;
                Ok(())
            }
            None => Err(RuntimeFault::NotFound(format!("No such container: {}", id))),
        }
    }

    async fn remove(&self, id: &SandboxId) -> FaultResult<()> {
        let mut state = self.state.lock().await;
        if state.containers.remove(id).is_none() {
            return Err(RuntimeFault::NotFound(format!("No such container: {}", id)));
        }
        state.removed.push(id.clone());
        Ok(())
    }

    async fn list_by_image(&self, image: &str) -> FaultResult<Vec<SandboxId>> {
        Ok(self
            .state
            .lock()
            .await
            .containers
            .iter()
            .filter(|(_, c)| c.spec.image == image)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
