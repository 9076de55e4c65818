//! End-to-end tests: configuration file → router → host / mock sandbox.

use std::sync::Arc;

use shellguard_controller::RouterBuilder;
use shellguard_core::mocks::ScriptedPrompt;
use shellguard_core::{AppConfig, RiskLevel, SessionContext, Venue};
use shellguard_sandbox::{MockSandbox, SandboxConfig, SandboxManager};

const IMAGE: &str = "shellguard-sandbox:system";

// =============================================================================
// Helpers
// =============================================================================

fn load_config(dir: &std::path::Path, toml: &str) -> AppConfig {
    let path = dir.join("shellguard.toml");
    std::fs::write(&path, toml).unwrap();
    AppConfig::load(Some(path.as_path())).unwrap()
}

async fn mock_manager(config: &AppConfig) -> (Arc<MockSandbox>, Arc<SandboxManager>) {
    let mock = Arc::new(MockSandbox::with_image(&config.sandbox.image));
    let sandbox_config = SandboxConfig::from_app_config(config).unwrap();
    let manager = SandboxManager::new(mock.clone(), sandbox_config)
        .await
        .unwrap();
    (mock, Arc::new(manager))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_policy_and_limits_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(
        dir.path(),
        &format!(
            r#"
[policy]
safe_commands = ["echo", "pwd"]

[policy.limits]
timeout_secs = 42
memory_limit = "256m"

[sandbox]
image = "{IMAGE}"
"#
        ),
    );
    let (mock, manager) = mock_manager(&config).await;
    let session = Arc::new(SessionContext::new(dir.path()));

    let router = RouterBuilder::new(config)
        .with_sandbox(manager)
        .with_session(session)
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .build()
        .unwrap();

    let echoed = router.execute("echo configured", false).await;
    assert_eq!(echoed.risk_level, RiskLevel::Safe);
    assert_eq!(echoed.venue, Venue::Host);
    assert_eq!(echoed.stdout, "configured\n");

    // `ls` is no longer on the safe list, so it is unknown and sandboxed.
    let listed = router.execute("ls", false).await;
    assert_eq!(listed.risk_level, RiskLevel::Moderate);
    assert_eq!(listed.venue, Venue::Sandbox);

    let created = mock.created().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].image, IMAGE);
    assert_eq!(created[0].memory_limit, 256 * 1024 * 1024);

    let calls = mock.exec_calls().await;
    assert_eq!(calls[0].1[..2], ["timeout".to_string(), "42s".to_string()]);
}

#[tokio::test]
async fn test_session_directory_change_follows_into_sandbox() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("project")).unwrap();
    let mut config = AppConfig::default();
    config.sandbox.image = IMAGE.to_string();
    let (mock, manager) = mock_manager(&config).await;
    let session = Arc::new(SessionContext::new(root.path().canonicalize().unwrap()));

    let router = RouterBuilder::new(config)
        .with_sandbox(manager)
        .with_session(session.clone())
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .build()
        .unwrap();

    router.execute("touch one.txt", false).await;
    router.execute("touch two.txt", false).await;
    assert_eq!(mock.created().await.len(), 1);

    let project = session.set_working_directory("project").unwrap();
    router.execute("touch three.txt", false).await;

    let created = mock.created().await;
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].mount.as_deref(), Some(project.as_path()));
    assert_eq!(mock.live_containers().await.len(), 1);

    let pwd = router.execute("pwd", false).await;
    assert_eq!(pwd.stdout.trim(), project.display().to_string());

    router.cleanup().await;
    assert!(mock.live_containers().await.is_empty());
}

#[tokio::test]
async fn test_vanished_container_is_transparent_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.sandbox.image = IMAGE.to_string();
    let (mock, manager) = mock_manager(&config).await;

    let router = RouterBuilder::new(config)
        .with_sandbox(manager.clone())
        .with_session(Arc::new(SessionContext::new(dir.path())))
        .with_prompt(Arc::new(ScriptedPrompt::always(false)))
        .build()
        .unwrap();

    router.execute("mkdir a", false).await;
    let first = manager.persistent_id().await.unwrap();
    mock.kill(&first).await;

    let result = router.execute("mkdir b", false).await;

    assert!(result.success());
    assert_eq!(result.stdout, "[mock] mkdir b\n");
    let second = manager.persistent_id().await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_session_history_export() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.sandbox.image = IMAGE.to_string();
    let (_mock, manager) = mock_manager(&config).await;
    let session = Arc::new(SessionContext::new(dir.path()));

    let router = RouterBuilder::new(config)
        .with_sandbox(manager)
        .with_session(session.clone())
        .with_prompt(Arc::new(ScriptedPrompt::new(vec![false])))
        .build()
        .unwrap();

    session.add_user_message("pwd");
    router.execute("pwd", false).await;
    session.add_user_message("rm -rf /");
    let cancelled = router.execute("rm -rf /", false).await;
    assert!(cancelled.was_cancelled());

    let export = dir.path().join("history.md");
    session.export_history(&export).unwrap();
    let text = std::fs::read_to_string(&export).unwrap();

    assert!(text.contains("USER: pwd"));
    assert!(text.contains("EXEC: Executed: pwd"));
    assert!(text.contains("USER: rm -rf /"));
    assert!(!text.contains("Executed: rm -rf /"));
}
