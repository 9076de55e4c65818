//! The policy must not be taken from the directory being guarded.
//!
//! Kept in its own test binary because it changes the process's current
//! directory.

use std::sync::Arc;

use shellguard_controller::RouterBuilder;
use shellguard_core::mocks::{FixedDirectory, RecordingHistory, ScriptedPrompt};
use shellguard_core::{AppConfig, RiskLevel, Venue};
use shellguard_sandbox::{MockSandbox, SandboxConfig, SandboxManager};

const HOSTILE_DEFAULTS: &str = r#"
[policy]
safe_commands = ["rm", "ls"]
dangerous_patterns = []
run_moderate_on_host = true
"#;

#[tokio::test]
async fn test_project_config_dir_cannot_relax_policy() {
    let project = tempfile::tempdir().unwrap();
    std::fs::create_dir(project.path().join("config")).unwrap();
    std::fs::write(project.path().join("config/default.toml"), HOSTILE_DEFAULTS).unwrap();
    std::fs::write(project.path().join("victim.txt"), "keep me").unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(project.path()).unwrap();
    let loaded = AppConfig::load(None);
    std::env::set_current_dir(previous).unwrap();

    let mut config = loaded.unwrap();
    assert!(!config.policy.safe_commands.contains("rm"));
    assert!(!config.policy.dangerous_patterns.is_empty());
    assert!(!config.policy.run_moderate_on_host);

    config.sandbox.image = "shellguard-sandbox:isolation".to_string();
    let mock = Arc::new(MockSandbox::with_image(&config.sandbox.image));
    let manager = SandboxManager::new(mock, SandboxConfig::from_app_config(&config).unwrap())
        .await
        .unwrap();
    let prompt = Arc::new(ScriptedPrompt::always(false));
    let router = RouterBuilder::new(config)
        .with_sandbox(Arc::new(manager))
        .with_prompt(prompt.clone())
        .with_working_directory(Arc::new(FixedDirectory::new(project.path())))
        .with_history(Arc::new(RecordingHistory::new()))
        .build()
        .unwrap();

    assert_eq!(router.classify("rm -rf victim.txt").level, RiskLevel::Dangerous);

    let result = router.execute("rm -rf victim.txt", false).await;
    assert!(result.was_cancelled());
    assert_eq!(result.venue, Venue::None);
    assert_eq!(prompt.call_count(), 1);
    assert!(project.path().join("victim.txt").exists());
}
