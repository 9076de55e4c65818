#![deny(unused)]
//! Docker sandbox for ShellGuard.
//!
//! Commands the classifier does not trust run inside a Docker container with
//! no network, capped memory and CPU, and the session's working directory
//! bind-mounted at `/workspace`.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  ExecutionRouter (controller crate)    │
//! │    ↓ run(command, working_dir)         │
//! ├────────────────────────────────────────┤
//! │  SandboxManager                        │
//! │    persistent container + recovery     │
//! ├────────────────────────────────────────┤
//! │  SandboxEngine (DockerSandbox)         │
//! │    ↓ Docker API via bollard            │
//! ├────────────────────────────────────────┤
//! │  Docker Container (isolated)           │
//! │    /workspace  (bind mount, rw)        │
//! │    network: none, memory/cpu limits    │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shellguard_sandbox::{SandboxConfig, SandboxManager};
//!
//! let config = SandboxConfig::from_app_config(&app_config)?;
//! let manager = SandboxManager::connect(config).await?;
//!
//! let output = manager.run("touch notes.txt", Some(Path::new("/home/me/project"))).await;
//! manager.cleanup().await;
//! ```

pub mod engine;
pub mod manager;

pub use engine::{
    ContainerSpec, ContainerStatus, DockerSandbox, FaultResult, MockSandbox, RuntimeFault,
    SandboxConfig, SandboxEngine, SandboxId,
};
pub use manager::{
    check_build_context, find_build_context, locate_build_context, remove_leftovers,
    PersistentState, SandboxManager,
};
