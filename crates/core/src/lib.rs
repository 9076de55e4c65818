#![deny(unused)]
//! Core types, traits, and error definitions for ShellGuard.
//!
//! This crate provides the foundational building blocks shared by the
//! classifier, the sandbox lifecycle manager, and the execution router.

pub mod config;
pub mod context;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use config::{AppConfig, LoggingConfig, PolicyConfig, ResourceLimits, SandboxSettings};
pub use context::SessionContext;
pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
