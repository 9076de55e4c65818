#![deny(unused)]
//! Command routing for ShellGuard.
//!
//! This crate decides where a command runs (host or sandbox), runs it, and
//! normalizes the outcome into an `ExecutionResult`.

pub mod builder;
pub mod host;
pub mod router;

pub use builder::RouterBuilder;
pub use host::{HostRunner, HOST_TIMEOUT};
pub use router::ExecutionRouter;
