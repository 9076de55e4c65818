//! Core type definitions for ShellGuard.

pub mod execution;
pub mod risk;

pub use execution::*;
pub use risk::*;
