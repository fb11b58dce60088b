//! Wire-shaped message types for the control surface, plus the query
//! parameters each resource documented in spec §6 accepts.

use serde::{Deserialize, Serialize};

/// Query parameters for `/playlist/fetch` (spec §6).
// Each bool mirrors a distinct query-string flag the resource accepts;
// bundling them into enums would not reduce the surface this mirrors.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistFetchQuery {
    /// Fetch a stored playlist by catalog id.
    pub id: Option<i64>,
    /// Fetch the live mainshow view.
    #[serde(default)]
    pub mainshow: bool,
    /// Fetch the live override queue.
    #[serde(rename = "override", default)]
    pub override_queue: bool,
    /// Fetch the live bumpers view.
    #[serde(default)]
    pub bumperlist: bool,
    /// Name of a new, empty stored playlist to create (and return).
    pub new: Option<String>,
    /// Fetch a page of the synthetic superlist of every catalog item.
    #[serde(default)]
    pub fetchall: bool,
    /// Page size for `fetchall`.
    pub limit: Option<i64>,
    /// Page offset for `fetchall`.
    pub offset: Option<i64>,
    /// Regex to filter by description/filename, applied to the fetched view.
    pub filter: Option<String>,
    /// Omit the item id list from the response, returning only the summary.
    #[serde(default)]
    pub noitems: bool,
    /// Truncate the returned item id list to this many entries.
    pub truncate: Option<usize>,
}

/// Query parameters for `/playlist/update` (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistUpdateQuery {
    /// Target stored playlist id.
    pub id: i64,
    /// Replace the item sequence instead of appending.
    #[serde(default)]
    pub overwrite: bool,
}

/// Query parameters for `/player/speed`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeedQuery {
    /// Playback speed multiplier.
    pub speed: f64,
}

/// Query parameters for `/player/seek`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeekQuery {
    /// Absolute position to seek to, in seconds.
    pub time_pos: f64,
}

/// Body for the `/sql` resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlQuery {
    /// The raw, read-only `SQL` text to execute.
    pub query: String,
}

/// A wire-safe snapshot of [`player::PlayerState`] (which is not itself
/// `Serialize`, since the player crate has no wire-format concerns of its
/// own).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateMessage {
    /// Lifecycle phase, as text (`idle`, `spawning`, `running`, `dying`).
    pub phase: String,
    /// Filename of the item currently (or most recently) playing.
    pub now_playing: Option<String>,
    /// `true` if playback is paused.
    pub paused: bool,
    /// Current playback position in seconds.
    pub time_pos: f64,
    /// Total track length in seconds.
    pub length: f64,
    /// Free-text metadata string.
    pub metadata: String,
}
impl From<player::PlayerState> for PlayerStateMessage {
    fn from(state: player::PlayerState) -> Self {
        let phase = match state.phase {
            player::Phase::Idle => "idle",
            player::Phase::Spawning => "spawning",
            player::Phase::Running => "running",
            player::Phase::Dying => "dying",
        };
        Self {
            phase: phase.to_string(),
            now_playing: state.now_playing,
            paused: state.paused,
            time_pos: state.time_pos,
            length: state.length,
            metadata: state.metadata,
        }
    }
}

/// An empty acknowledgement, returned by resources with no meaningful body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    /// Always `true`; presence of the response is the signal.
    pub ok: bool,
}
impl Default for Ack {
    fn default() -> Self {
        Self { ok: true }
    }
}

/// Error body returned for [`crate::Error::InvalidRequest`] and
/// [`catalog::Error::Constraint`] (spec §7: both are reported to the
/// caller, never fatal to the engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable description of what went wrong.
    pub message: String,
}
