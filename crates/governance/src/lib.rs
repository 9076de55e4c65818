#![deny(unused)]
//! Governance for ShellGuard.
//!
//! This crate provides:
//! - Command safety classification
//! - Operator confirmation prompts
//! - Log subscriber setup
//! - Command metrics

pub mod approval;
pub mod classifier;
pub mod metrics;
pub mod tracing_layer;

pub use approval::{parse_answer, read_line, AutoApprove, AutoDeny, StdinPrompt};
pub use classifier::{base_command, SafetyClassifier};
pub use metrics::{setup_metrics_recorder, track_command};
pub use tracing_layer::configure_tracing;
