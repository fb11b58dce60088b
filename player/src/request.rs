//! [`PlayRequest`]: the data a caller hands to a [`crate::PlayerSession`].

/// Raw data needed to start playback, detached from any catalog storage
/// concern. Callers that track playcount do so themselves before issuing
/// the request (spec §4.4: the session never touches the catalog).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    /// URI or local path to hand to the subprocess.
    pub filename: String,
    /// Non-negative duration cap in seconds, or `-1` if none applies.
    pub duration: i64,
    /// `true` if this is a network stream (adds `-endpos`/`-cache` flags).
    pub is_webstream: bool,
    /// Advisory cache size in KiB; only meaningful when `is_webstream`.
    pub cache: Option<i64>,
}
impl PlayRequest {
    /// Constructs a request for a local file with unknown/no duration cap.
    #[must_use]
    pub fn local(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            duration: -1,
            is_webstream: false,
            cache: None,
        }
    }
}
