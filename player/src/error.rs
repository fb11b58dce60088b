//! Player session error kinds.

/// Errors produced while spawning or driving the subprocess.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The subprocess could not be spawned at all.
    #[error("failed to spawn subprocess: {0}")]
    SpawnFailed(#[source] std::io::Error),
    /// A pipe used to talk to the subprocess could not be created.
    #[error("failed to create pipe: {0}")]
    PipeFailed(#[source] std::io::Error),
    /// The slave control pipe is not writable (no subprocess running).
    #[error("no subprocess is currently running")]
    NotRunning,
}
