//! Collaborator traits consumed by the execution router.
//!
//! - `session`: where commands run and where their results are recorded
//!   (WorkingDirectory, HistoryRecorder)
//! - `governance`: operator confirmation (ConfirmationPrompt)

pub mod governance;
pub mod session;

pub use governance::*;
pub use session::*;
