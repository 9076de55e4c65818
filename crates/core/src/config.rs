//! Application configuration.
//!
//! Configuration is loaded once at startup and handed to each component as an
//! immutable value. Sources are layered in this order, later sources winning:
//!
//! 1. built-in defaults (the stock policy below)
//! 2. `config/default.toml` next to the installed binary, if present. The
//!    current directory is never consulted: it is the project being guarded.
//! 3. a file passed explicitly by the caller
//! 4. environment variables, e.g. `SHELLGUARD__SANDBOX__IMAGE=my-image:1`

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// CPU scheduling period used by the container runtime, in microseconds.
pub const CPU_PERIOD_US: i64 = 100_000;

/// Defaults file, relative to the installation root.
pub const DEFAULTS_FILE: &str = "config/default.toml";

/// The defaults file of the running installation: [`DEFAULTS_FILE`] in the
/// executable's directory or one of its ancestors.
pub fn installed_defaults() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    find_defaults(exe.parent()?)
}

/// Look for [`DEFAULTS_FILE`] in `start` and each of its ancestors.
pub fn find_defaults(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DEFAULTS_FILE))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub sandbox: SandboxSettings,
    pub logging: LoggingConfig,
}

/// Classification policy and resource limits.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PolicyConfig {
    /// Strictly read-only commands; run on the host.
    pub safe_commands: HashSet<String>,
    /// Commands that modify files or system state.
    pub moderate_commands: HashSet<String>,
    /// Regular expressions checked in order; the first match marks a command dangerous.
    pub dangerous_patterns: Vec<String>,
    /// Allow moderate commands to run on the host instead of the sandbox.
    pub run_moderate_on_host: bool,
    pub limits: ResourceLimits,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResourceLimits {
    /// Memory ceiling in Docker notation ("512m", "1g").
    pub memory_limit: String,
    /// Number of CPUs the sandbox may use.
    pub cpu_limit: f64,
    /// Hard timeout for sandboxed commands.
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxSettings {
    pub image: String,
    /// Keep one long-lived container per working directory instead of one per command.
    pub reuse_container: bool,
    /// Mount point of the working directory inside the container.
    pub workdir: String,
    /// Shell used inside the container.
    pub shell: String,
    /// Directory holding the sandbox Dockerfile. Located next to the
    /// installed binary when unset.
    pub build_context: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load configuration from the layered sources.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_defaults(installed_defaults().as_deref(), path)
    }

    /// Load with an explicit defaults file in place of the installed one.
    pub fn load_with_defaults(defaults: Option<&Path>, path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(defaults) = defaults {
            builder = builder.add_source(File::from(defaults).required(false));
        }

        if let Some(path) = path {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            // SHELLGUARD__POLICY__LIMITS__TIMEOUT_SECS=60 sets policy.limits.timeout_secs
            .add_source(
                Environment::with_prefix("SHELLGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component could work with.
    pub fn validate(&self) -> Result<()> {
        self.policy.limits.memory_bytes()?;
        self.policy.limits.cpu_quota()?;
        if self.policy.limits.timeout_secs == 0 {
            return Err(Error::config("policy.limits.timeout_secs must be greater than 0"));
        }
        if self.sandbox.image.trim().is_empty() {
            return Err(Error::config("sandbox.image must not be empty"));
        }
        if !self.sandbox.workdir.starts_with('/') {
            return Err(Error::config(format!(
                "sandbox.workdir must be an absolute container path, got '{}'",
                self.sandbox.workdir
            )));
        }
        Ok(())
    }
}

impl ResourceLimits {
    /// Memory ceiling in bytes.
    pub fn memory_bytes(&self) -> Result<i64> {
        parse_memory_limit(&self.memory_limit)
    }

    /// CPU quota per [`CPU_PERIOD_US`].
    pub fn cpu_quota(&self) -> Result<i64> {
        if !(self.cpu_limit.is_finite() && self.cpu_limit > 0.0) {
            return Err(Error::config(format!(
                "policy.limits.cpu_limit must be positive, got {}",
                self.cpu_limit
            )));
        }
        Ok((self.cpu_limit * CPU_PERIOD_US as f64) as i64)
    }
}

/// Parse a Docker-style memory size (`b`, `k`, `m`, `g` suffixes, binary units).
pub fn parse_memory_limit(raw: &str) -> Result<i64> {
    let value = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = match value.chars().last() {
        Some('b') => (&value[..value.len() - 1], 1_i64),
        Some('k') => (&value[..value.len() - 1], 1024),
        Some('m') => (&value[..value.len() - 1], 1024 * 1024),
        Some('g') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value.as_str(), 1),
    };

    let amount: f64 = digits
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid memory limit '{}'", raw)))?;
    if !(amount.is_finite() && amount > 0.0) {
        return Err(Error::config(format!("Memory limit must be positive, got '{}'", raw)));
    }

    Ok((amount * multiplier as f64) as i64)
}

fn string_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            safe_commands: string_set(&[
                "ls", "pwd", "whoami", "date", "cal", "cat", "less", "more", "head", "tail",
                "grep", "find", "wc", "sort", "uniq", "diff", "file", "stat", "df", "du", "ps",
                "top", "htop", "which", "whereis", "man", "history", "env", "printenv",
                "basename", "dirname", "realpath",
            ]),
            moderate_commands: string_set(&[
                "sed", "awk", "gawk", "mawk", "touch", "mkdir", "rmdir", "cp", "mv", "ln",
                "wget", "curl", "git", "npm", "pip", "apt", "tar", "gzip", "unzip", "zip",
                "chmod", "chown", "tee", "xargs", "clear",
            ]),
            dangerous_patterns: [
                // Destructive file operations
                r"\brm\b",
                r"rm\s+-rf",
                r"rm\s+.*\*",
                // Disk operations
                r"\bdd\b",
                r"\bmkfs\b",
                r"\bfdisk\b",
                r"\bparted\b",
                r">\s*/dev/",
                // Permission escalation
                r"chmod\s+777",
                r"chmod\s+-R\s+777",
                r"chown\s+-R",
                // System control
                r"\bshutdown\b",
                r"\breboot\b",
                r"\bpoweroff\b",
                // Process killing
                r"\bkill\b",
                r"\bpkill\b",
                r"\bkillall\b",
                // Fork bomb
                r":\(\)\{:\|:&\};:",
                // Pipe-to-shell fetches
                r"curl.*\|.*sh",
                r"wget.*\|.*sh",
                r"\|\s*sh",
                // Device-null abuse
                r"mv\s+.*\s+/dev/null",
                // Filesystem wipe tools
                r"\bshred\b",
                r"\bwipefs\b",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            run_moderate_on_host: false,
            limits: ResourceLimits::default(),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_limit: "1g".into(),
            cpu_limit: 2.0,
            timeout_secs: 300,
        }
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            image: "shellguard-sandbox:latest".into(),
            reuse_container: true,
            workdir: "/workspace".into(),
            shell: "bash".into(),
            build_context: None,
        }
    }
}
