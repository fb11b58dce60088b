//! Catalog store error kinds.

/// Errors produced by the catalog store.
///
/// [`Error::Constraint`] is the only variant the control surface should
/// surface directly to a caller (spec §7: uniqueness-violating writes are
/// never fatal). Every other variant is treated as fatal by the engine,
/// since the catalog is a hard dependency of everything else.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A uniqueness invariant (e.g. `filename` uniqueness on items) was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// The underlying `SQLite` connection reported an error.
    #[error("catalog backend error: {0}")]
    Backend(#[from] rusqlite::Error),
    /// A stored blob failed to parse.
    #[error("malformed stored data: {0}")]
    Malformed(String),
}
