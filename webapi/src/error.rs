//! Errors the control surface reports to its caller (spec §7:
//! `InvalidRequest` never propagates to the Automation Loop).

/// Errors produced while servicing one control-surface request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body or a query parameter could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A uniqueness invariant was violated by the requested write.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// The `/sql` resource was requested but is not enabled by configuration.
    #[error("the /sql resource is disabled by configuration")]
    SqlDisabled,
    /// The underlying automation context reported an error.
    #[error(transparent)]
    Context(#[from] automation::Error),
}

impl From<catalog::Error> for Error {
    fn from(err: catalog::Error) -> Self {
        match err {
            catalog::Error::Constraint(message) => Self::Constraint(message),
            other => Self::Context(automation::Error::from(other)),
        }
    }
}
