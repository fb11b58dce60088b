//! [`PlayerState`]: the publicly-observable state of a [`crate::PlayerSession`].

/// Lifecycle phase of the supervised subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No subprocess running; ready to accept a new [`crate::PlayRequest`].
    Idle,
    /// `fork`+`exec` has been requested but the process is not yet confirmed alive.
    Spawning,
    /// The subprocess is running and responding to property polls.
    Running,
    /// The subprocess has been signalled to die and is being reaped.
    Dying,
}

/// A snapshot of the player's current playback state (spec §4.4 `PlayerState`).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Filename of the item currently (or most recently) playing.
    pub now_playing: Option<String>,
    /// `true` if playback is paused.
    pub paused: bool,
    /// Current playback position in seconds, as last polled.
    pub time_pos: f64,
    /// Total track length in seconds, as last polled.
    pub length: f64,
    /// Free-text metadata string, as last polled.
    pub metadata: String,
}
impl Default for PlayerState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            now_playing: None,
            paused: false,
            time_pos: 0.0,
            length: 0.0,
            metadata: String::new(),
        }
    }
}
