//! Errors produced by the [`crate::RequirementEngine`] and [`crate::CommandRegistry`].

use crate::CommandKind;

/// Errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schedule blob could not be serialized or deserialized.
    #[error("schedule serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The catalog store reported an error while loading or saving the schedule.
    #[error("catalog store error: {0}")]
    Store(#[from] catalog::Error),
    /// [`crate::CommandRegistry::check_validity`] found a [`CommandKind`]
    /// variant with no registered handler.
    #[error("no handler registered for command {0:?}")]
    MissingHandler(CommandKind),
}
