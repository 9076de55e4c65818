#![deny(unused)]
//! ShellGuard - guarded shell command execution.
//!
//! Classifies each command, asks before running anything dangerous, and runs
//! risky commands inside a Docker sandbox instead of on the host.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use shellguard_controller::{ExecutionRouter, RouterBuilder};
use shellguard_core::{
    AppConfig, ConfirmationPrompt, ExecutionResult, SessionContext, WorkingDirectory,
};
use shellguard_governance::{AutoApprove, AutoDeny, StdinPrompt};
use shellguard_sandbox::{locate_build_context, remove_leftovers, DockerSandbox, SandboxEngine};

#[derive(Parser)]
#[command(name = "shellguard", version, about = "Run shell commands behind a safety classifier and a Docker sandbox")]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, env = "SHELLGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print a Prometheus metrics snapshot on exit
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and execute one command
    Run(RunArgs),
    /// Show the risk level of a command without running it
    Classify {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Interactive session
    Shell,
    /// Check Docker and the sandbox image
    Doctor,
    /// Remove sandbox containers left by earlier runs
    Cleanup,
}

#[derive(Args)]
struct RunArgs {
    /// Do not ask before running dangerous commands
    #[arg(short, long)]
    yes: bool,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    shellguard_governance::configure_tracing(
        cli.json_logs || config.logging.json,
        config.logging.filter.as_deref(),
    )?;

    let metrics_handle = if cli.metrics {
        Some(shellguard_governance::setup_metrics_recorder()?)
    } else {
        None
    };

    tracing::debug!("Starting ShellGuard v{}", env!("CARGO_PKG_VERSION"));

    let exit_code = match cli.command {
        Commands::Run(args) => run_once(config, args).await?,
        Commands::Classify { command } => {
            classify(config, &command_line(&command))?;
            0
        }
        Commands::Shell => {
            interactive(config).await?;
            0
        }
        Commands::Doctor => doctor(&config).await,
        Commands::Cleanup => {
            cleanup(&config).await?;
            0
        }
    };

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    if exit_code != 0 {
        std::process::exit(i32::try_from(exit_code).unwrap_or(1));
    }
    Ok(())
}

// =============================================================================
// Subcommands
// =============================================================================

/// A single argument is taken as a full command line; several are re-quoted
/// so `run -- grep "a b" f` keeps its argument boundaries.
fn command_line(args: &[String]) -> String {
    match args {
        [single] => single.clone(),
        _ => shell_words::join(args),
    }
}

async fn run_once(config: AppConfig, args: RunArgs) -> anyhow::Result<i64> {
    let command = command_line(&args.command);

    let prompt: Arc<dyn ConfirmationPrompt> = if args.yes {
        Arc::new(AutoApprove)
    } else if std::io::stdin().is_terminal() {
        Arc::new(StdinPrompt::new())
    } else {
        tracing::debug!("stdin is not a terminal, dangerous commands will be declined");
        Arc::new(AutoDeny)
    };

    let router = RouterBuilder::new(config)
        .with_prompt(prompt)
        .build()
        .context("Failed to initialize command router")?;

    let result = router.execute(&command, args.yes).await;
    router.cleanup().await;

    render(&result);
    Ok(result.exit_code)
}

fn classify(config: AppConfig, command: &str) -> anyhow::Result<()> {
    let router = RouterBuilder::new(config)
        .with_prompt(Arc::new(AutoDeny))
        .build()
        .context("Failed to initialize command router")?;

    let classification = router.classify(command);
    let venue = if router.classifier().should_use_sandbox(classification.level) {
        "sandbox"
    } else {
        "host"
    };
    println!("{} {}", classification.level.badge(), classification.level);
    println!("Reason: {}", classification.reason);
    println!("Runs on: {}", venue);
    Ok(())
}

async fn doctor(config: &AppConfig) -> i64 {
    let engine = match DockerSandbox::new() {
        Ok(engine) => engine,
        Err(e) => {
            println!("✗ Docker client: {}", e);
            return 1;
        }
    };

    let started = Instant::now();
    if let Err(fault) = engine.ping().await {
        println!("✗ Docker daemon not reachable: {}", fault);
        println!("  Install: https://docs.docker.com/get-docker/");
        return 1;
    }
    println!("✓ Docker daemon reachable ({} ms)", started.elapsed().as_millis());

    let image = &config.sandbox.image;
    let mut healthy = true;
    match engine.image_exists(image).await {
        Ok(true) => println!("✓ Sandbox image {} present", image),
        Ok(false) => {
            println!("• Sandbox image {} missing, it will be built on first use", image);
            match locate_build_context(config.sandbox.build_context.as_deref()) {
                Ok(dir) => println!("✓ Build context found at {}", dir.display()),
                Err(expected) => {
                    println!("✗ No Dockerfile found (expected {})", expected.display());
                    healthy = false;
                }
            }
        }
        Err(fault) => {
            println!("✗ Could not inspect image {}: {}", image, fault);
            healthy = false;
        }
    }

    if healthy {
        0
    } else {
        1
    }
}

async fn cleanup(config: &AppConfig) -> anyhow::Result<()> {
    let engine = DockerSandbox::new().context("Failed to create Docker client")?;
    if let Err(fault) = engine.ping().await {
        anyhow::bail!("Docker is not available: {}", fault);
    }
    let removed = remove_leftovers(&engine, &config.sandbox.image).await;
    println!("Removed {} container(s)", removed);
    Ok(())
}

// =============================================================================
// Interactive Session
// =============================================================================

const HELP: &str = "\
Commands:
  ls, dir      list files (ls -la)
  pwd          print the working directory
  cd <dir>     change the working directory (.. goes up)
  !!           repeat the last command
  history      show recent history
  save <file>  write the session history to a file
  clear        clear history
  exit, quit, q  leave
Anything else is classified and executed.";

async fn interactive(config: AppConfig) -> anyhow::Result<()> {
    let session = Arc::new(SessionContext::from_current_dir()?);
    let router = RouterBuilder::new(config)
        .with_session(session.clone())
        .with_prompt(Arc::new(StdinPrompt::new()))
        .build()
        .context("Failed to initialize command router")?;

    if !router.is_docker_available().await {
        eprintln!("⚠️  Docker is not reachable: moderate and dangerous commands will fail.");
    }
    println!("ShellGuard v{} (type 'help' for shortcuts)", env!("CARGO_PKG_VERSION"));

    let result = repl(&router, &session).await;
    router.cleanup().await;
    result
}

/// What one line typed at the session prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum ReplAction {
    Skip,
    Exit,
    Help,
    Clear,
    History,
    Save(String),
    ChangeDir(String),
    Execute(String),
    NoPrevious,
    Usage(&'static str),
}

fn interpret(line: &str, last_command: Option<String>) -> ReplAction {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => return ReplAction::Skip,
        "exit" | "quit" | "q" => return ReplAction::Exit,
        "help" => return ReplAction::Help,
        "clear" => return ReplAction::Clear,
        "history" => return ReplAction::History,
        "ls" | "dir" => return ReplAction::Execute("ls -la".to_string()),
        "pwd" => return ReplAction::Execute("pwd".to_string()),
        ".." => return ReplAction::ChangeDir("..".to_string()),
        "!!" => {
            return last_command.map_or(ReplAction::NoPrevious, ReplAction::Execute);
        }
        "cd" => return ReplAction::Usage("cd <directory>"),
        "save" => return ReplAction::Usage("save <file>"),
        _ => {}
    }

    if let Some(path) = line.strip_prefix("save ") {
        return ReplAction::Save(path.trim().to_string());
    }
    if let Some(dir) = line.strip_prefix("cd ") {
        return ReplAction::ChangeDir(dir.trim().to_string());
    }
    ReplAction::Execute(line.to_string())
}

async fn repl(router: &ExecutionRouter, session: &SessionContext) -> anyhow::Result<()> {
    loop {
        let prompt = format!("{} $ ", session.working_directory().display());
        let Some(line) = shellguard_governance::read_line(&prompt).await? else {
            println!();
            return Ok(());
        };

        match interpret(&line, session.last_command()) {
            ReplAction::Skip => {}
            ReplAction::Exit => return Ok(()),
            ReplAction::Help => println!("{}", HELP),
            ReplAction::Clear => {
                session.clear_history();
                println!("History cleared");
            }
            ReplAction::History => println!("{}", session.recent_context(10)),
            ReplAction::Save(path) => match session.export_history(&path) {
                Ok(()) => println!("History saved to {}", path),
                Err(e) => println!("✗ {}", e),
            },
            ReplAction::ChangeDir(dir) => match session.set_working_directory(&dir) {
                Ok(dir) => println!("Changed directory to {}", dir.display()),
                Err(e) => println!("✗ {}", e),
            },
            ReplAction::NoPrevious => println!("No previous command"),
            ReplAction::Usage(usage) => println!("Usage: {}", usage),
            ReplAction::Execute(command) => {
                if line.trim() == "!!" {
                    println!("{}", command);
                }
                session.add_user_message(&command);
                let result = router.execute(&command, false).await;
                render(&result);
            }
        }
    }
}

// =============================================================================
// Output
// =============================================================================

fn render(result: &ExecutionResult) {
    if result.was_cancelled() {
        println!("✗ {}", result.stderr);
        return;
    }

    eprintln!(
        "{} {} · {} · exit {}",
        result.risk_level.badge(),
        result.risk_level,
        result.venue.as_str(),
        result.exit_code
    );

    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr.trim_end());
    }
    if result.stdout.is_empty() && result.stderr.is_empty() {
        println!("(nothing)");
    }
}
