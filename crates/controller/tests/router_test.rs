//! Router integration tests.
//!
//! Host commands run for real inside a temp directory. Sandboxed commands go
//! through SandboxManager backed by MockSandbox, so Docker is not needed.

use std::sync::Arc;

use shellguard_controller::{ExecutionRouter, RouterBuilder};
use shellguard_core::mocks::{FixedDirectory, RecordingHistory, ScriptedPrompt};
use shellguard_core::{AppConfig, CommandOutput, RiskLevel, SessionContext, Venue};
use shellguard_sandbox::{MockSandbox, SandboxConfig, SandboxEngine, SandboxManager};

const IMAGE: &str = "shellguard-sandbox:test";

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    router: ExecutionRouter,
    mock: Arc<MockSandbox>,
    prompt: Arc<ScriptedPrompt>,
    history: Arc<RecordingHistory>,
    dir: tempfile::TempDir,
}

fn app_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sandbox.image = IMAGE.to_string();
    config
}

async fn harness_with(config: AppConfig, prompt: ScriptedPrompt) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockSandbox::with_image(IMAGE));
    let sandbox_config = SandboxConfig::from_app_config(&config).unwrap();
    let manager = SandboxManager::new(mock.clone(), sandbox_config)
        .await
        .unwrap();
    let prompt = Arc::new(prompt);
    let history = Arc::new(RecordingHistory::new());

    let router = RouterBuilder::new(config)
        .with_sandbox(Arc::new(manager))
        .with_prompt(prompt.clone())
        .with_working_directory(Arc::new(FixedDirectory::new(dir.path())))
        .with_history(history.clone())
        .build()
        .unwrap();

    Harness {
        router,
        mock,
        prompt,
        history,
        dir,
    }
}

async fn harness(prompt: ScriptedPrompt) -> Harness {
    harness_with(app_config(), prompt).await
}

// =============================================================================
// 1. Host execution
// =============================================================================

#[tokio::test]
async fn test_safe_command_runs_on_host_in_working_directory() {
    let h = harness(ScriptedPrompt::always(false)).await;
    std::fs::write(h.dir.path().join("notes.txt"), "hi").unwrap();

    let result = h.router.execute("ls", false).await;

    assert_eq!(result.risk_level, RiskLevel::Safe);
    assert_eq!(result.venue, Venue::Host);
    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.contains("notes.txt"));
    assert_eq!(h.prompt.call_count(), 0);
    assert!(h.mock.created().await.is_empty());
}

#[tokio::test]
async fn test_pwd_reports_working_directory() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("pwd", false).await;

    let reported = std::path::PathBuf::from(result.stdout.trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        h.dir.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_host_failure_exit_code_is_reported() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("cat missing-file.txt", false).await;

    assert_eq!(result.venue, Venue::Host);
    assert_ne!(result.exit_code, 0);
    assert!(result.stderr.contains("missing-file.txt"));
}

#[tokio::test]
async fn test_moderate_on_host_when_enabled() {
    let mut config = app_config();
    config.policy.run_moderate_on_host = true;
    let h = harness_with(config, ScriptedPrompt::always(false)).await;

    let result = h.router.execute("touch created.txt", false).await;

    assert_eq!(result.risk_level, RiskLevel::Moderate);
    assert_eq!(result.venue, Venue::Host);
    assert!(result.success());
    assert!(h.dir.path().join("created.txt").exists());
    assert!(h.mock.created().await.is_empty());
}

// =============================================================================
// 2. Sandbox routing
// =============================================================================

#[tokio::test]
async fn test_moderate_command_runs_in_sandbox_without_prompt() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("touch created.txt", false).await;

    assert_eq!(result.risk_level, RiskLevel::Moderate);
    assert_eq!(result.venue, Venue::Sandbox);
    assert_eq!(result.stdout, "[mock] touch created.txt\n");
    assert_eq!(h.prompt.call_count(), 0);
    assert!(!h.dir.path().join("created.txt").exists());

    let created = h.mock.created().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].mount.as_deref(), Some(h.dir.path()));
}

#[tokio::test]
async fn test_unknown_command_runs_in_sandbox() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("frobnicate --all", false).await;

    assert_eq!(result.risk_level, RiskLevel::Moderate);
    assert_eq!(result.venue, Venue::Sandbox);
}

#[tokio::test]
async fn test_sandbox_exit_code_is_passed_through() {
    let h = harness(ScriptedPrompt::always(false)).await;
    h.mock
        .push_response(CommandOutput::new(2, "", "make: *** No rule"))
        .await;

    let result = h.router.execute("make build", false).await;

    assert_eq!(result.venue, Venue::Sandbox);
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.stderr, "make: *** No rule");
}

// =============================================================================
// 3. Confirmation
// =============================================================================

#[tokio::test]
async fn test_declined_dangerous_command_is_cancelled() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("rm -rf build", false).await;

    assert!(result.was_cancelled());
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "Command execution cancelled by user");
    assert_eq!(result.risk_level, RiskLevel::Dangerous);
    assert_eq!(result.venue, Venue::None);
    assert!(h.history.records().is_empty());
    assert!(h.mock.created().await.is_empty());

    let questions = h.prompt.questions();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].0, "rm -rf build");
    assert!(questions[0].1.contains("dangerous pattern"));
}

#[tokio::test]
async fn test_declined_chained_command_never_runs() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("ls; rm -rf /", false).await;

    assert!(result.was_cancelled());
    assert!(h.prompt.questions()[0].1.contains("Compound or chained"));
    assert!(h.history.records().is_empty());
    assert!(h.mock.exec_calls().await.is_empty());
}

#[tokio::test]
async fn test_approved_dangerous_command_runs_in_sandbox() {
    let h = harness(ScriptedPrompt::new(vec![true])).await;

    let result = h.router.execute("rm -rf build", false).await;

    assert_eq!(result.venue, Venue::Sandbox);
    assert!(result.success());
    assert_eq!(h.prompt.call_count(), 1);

    let created = h.mock.created().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].mount.as_deref(), Some(h.dir.path()));
}

#[tokio::test]
async fn test_auto_confirm_skips_prompt() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let result = h.router.execute("rm -rf build", true).await;

    assert_eq!(result.venue, Venue::Sandbox);
    assert!(result.success());
    assert_eq!(h.prompt.call_count(), 0);
}

#[tokio::test]
async fn test_dangerous_command_never_runs_on_host() {
    let mut config = app_config();
    config.policy.run_moderate_on_host = true;
    let h = harness_with(config, ScriptedPrompt::always(true)).await;
    std::fs::write(h.dir.path().join("keep.txt"), "x").unwrap();

    let result = h.router.execute("rm keep.txt", false).await;

    assert_eq!(result.venue, Venue::Sandbox);
    assert!(h.dir.path().join("keep.txt").exists());
}

// =============================================================================
// 4. History and lifecycle
// =============================================================================

#[tokio::test]
async fn test_executions_are_recorded() {
    let h = harness(ScriptedPrompt::always(false)).await;

    std::fs::write(h.dir.path().join("greeting.txt"), "hello\n").unwrap();

    h.router.execute("cat greeting.txt", false).await;
    h.router.execute("mkdir out", false).await;

    let records = h.history.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].command, "cat greeting.txt");
    assert_eq!(records[0].output, "hello\n");
    assert_eq!(records[0].exit_code, 0);
    assert_eq!(records[1].command, "mkdir out");
    assert_eq!(records[1].output, "[mock] mkdir out\n");
}

#[tokio::test]
async fn test_session_tracks_last_command() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockSandbox::with_image(IMAGE));
    let config = app_config();
    let manager = SandboxManager::new(mock, SandboxConfig::from_app_config(&config).unwrap())
        .await
        .unwrap();
    std::fs::write(dir.path().join("second.txt"), "second\n").unwrap();
    let session = Arc::new(SessionContext::new(dir.path()));

    let router = RouterBuilder::new(config)
        .with_sandbox(Arc::new(manager))
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .with_session(session.clone())
        .build()
        .unwrap();

    router.execute("pwd", false).await;
    router.execute("cat second.txt", false).await;

    assert_eq!(session.last_command().as_deref(), Some("cat second.txt"));
    assert_eq!(session.last_output().as_deref(), Some("second\n"));
}

#[tokio::test]
async fn test_classify_does_not_execute() {
    let h = harness(ScriptedPrompt::always(false)).await;

    let classification = h.router.classify("rm -rf /");

    assert_eq!(classification.level, RiskLevel::Dangerous);
    assert!(h.history.records().is_empty());
    assert_eq!(h.prompt.call_count(), 0);
}

#[tokio::test]
async fn test_docker_available_with_connected_manager() {
    let h = harness(ScriptedPrompt::always(false)).await;
    assert!(h.router.is_docker_available().await);
    assert!(h.mock.created().await.is_empty());
}

#[tokio::test]
async fn test_cleanup_removes_sandbox_and_is_repeatable() {
    let h = harness(ScriptedPrompt::always(false)).await;
    h.router.execute("touch a.txt", false).await;
    assert_eq!(h.mock.live_containers().await.len(), 1);

    h.router.cleanup().await;
    assert!(h.mock.live_containers().await.is_empty());

    h.router.cleanup().await;
    assert!(h.mock.live_containers().await.is_empty());
}

#[tokio::test]
async fn test_invalid_policy_fails_build() {
    let mut config = app_config();
    config.policy.dangerous_patterns.push("(unclosed".to_string());

    let result = RouterBuilder::new(config)
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .with_working_directory(Arc::new(FixedDirectory::new("/tmp")))
        .with_history(Arc::new(RecordingHistory::new()))
        .build();

    assert!(result.is_err());
}

// =============================================================================
// 5. Lazy sandbox connect
// =============================================================================

fn lazy_router(
    config: AppConfig,
    engine: Arc<MockSandbox>,
    dir: &std::path::Path,
) -> ExecutionRouter {
    RouterBuilder::new(config)
        .with_sandbox_engine(engine as Arc<dyn SandboxEngine>)
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .with_working_directory(Arc::new(FixedDirectory::new(dir)))
        .with_history(Arc::new(RecordingHistory::new()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_runtime_unavailable_keeps_host_commands_working() {
    let dir = tempfile::tempdir().unwrap();
    let router = lazy_router(app_config(), Arc::new(MockSandbox::unavailable()), dir.path());

    assert!(!router.is_docker_available().await);

    let sandboxed = router.execute("touch a.txt", false).await;
    assert_eq!(sandboxed.venue, Venue::Sandbox);
    assert_eq!(sandboxed.exit_code, 1);
    assert!(sandboxed.stdout.is_empty());
    assert!(sandboxed.stderr.starts_with("Docker execution error: "));
    assert!(sandboxed.stderr.contains("Docker is not available"));
    assert!(!dir.path().join("a.txt").exists());

    let listed = router.execute("ls", false).await;
    assert_eq!(listed.venue, Venue::Host);
    assert_eq!(listed.exit_code, 0);
}

#[tokio::test]
async fn test_failed_connect_is_retried_on_next_command() {
    let dir = tempfile::tempdir().unwrap();
    let context = tempfile::tempdir().unwrap();
    let mut config = app_config();
    config.sandbox.build_context = Some(context.path().to_path_buf());
    let mock = Arc::new(MockSandbox::new());
    let router = lazy_router(config, mock.clone(), dir.path());

    let first = router.execute("mkdir out", false).await;
    assert_eq!(first.exit_code, 1);
    assert!(first.stderr.starts_with("Docker execution error: "));
    assert!(mock.builds().await.is_empty());

    std::fs::write(context.path().join("Dockerfile"), "FROM debian:bookworm-slim\n").unwrap();

    let second = router.execute("mkdir out", false).await;
    assert!(second.success());
    assert_eq!(second.stdout, "[mock] mkdir out\n");
    assert_eq!(mock.builds().await.len(), 1);
    assert!(router.is_docker_available().await);
}
