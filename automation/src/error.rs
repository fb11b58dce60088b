//! Errors produced by the Automation Loop and its Shared State.

/// Errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The catalog store reported an error.
    #[error("catalog store error: {0}")]
    Store(#[from] catalog::Error),
    /// The player session could not spawn its subprocess.
    #[error("player error: {0}")]
    Player(#[from] player::Error),
    /// The requirement engine reported an error (schedule load/save).
    #[error("requirement engine error: {0}")]
    Requirements(#[from] requirements::Error),
}
