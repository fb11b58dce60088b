//! A single scheduled obligation and the ordered [`Schedule`] of them.

use crate::TimeSpecification;
use serde::{Deserialize, Serialize};

/// The command a [`Requirement`] dispatches to, resolved against the command
/// registry. A closed set, unlike the source's dynamically-resolved enum name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Does nothing; a schedule placeholder.
    NoOp,
    /// Plays the items named in the requirement's inline playlist.
    PlayFiles,
    /// Plays one legal-ID item from the locked `legalid` playlist.
    LegalId,
    /// Switches the main show playlist.
    SetMainshow,
}

impl CommandKind {
    /// Every variant, for [`crate::CommandRegistry::check_validity`].
    #[must_use]
    pub fn all() -> &'static [CommandKind] {
        &[
            Self::NoOp,
            Self::PlayFiles,
            Self::LegalId,
            Self::SetMainshow,
        ]
    }
}

/// One entry of a `PLAY_FILES` requirement's inline playlist.
///
/// A `CatalogId` entry is resolved against the catalog and has its
/// `playcount` incremented before playback; a `Raw` entry is transient,
/// uncataloged content (e.g. a one-off operator upload) and is played
/// without touching any playcount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayFilesEntry {
    /// References a [`catalog::PlayableItem`] by id.
    CatalogId(i64),
    /// A transient item not present in the catalog.
    Raw(RawPlayableItem),
}

/// A transient, uncataloged item inlined directly into a `PLAY_FILES` requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlayableItem {
    /// Path or stream URL passed straight to the player.
    pub filename: String,
    /// Known duration in seconds, or a negative sentinel if unknown.
    pub duration: i64,
    /// Human-readable description, e.g. for logging.
    pub description: String,
}

/// A scheduled obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Which command this requirement dispatches to.
    pub kind: CommandKind,
    /// Inline playlist for `PLAY_FILES`; empty for other kinds.
    pub payload: Vec<PlayFilesEntry>,
    /// Name argument, e.g. the target playlist for `SET_MAINSHOW`.
    pub target_name: Option<String>,
    /// When this requirement is due.
    pub when: TimeSpecification,
    /// Whether this requirement also fires once at process startup.
    pub reboot: bool,
    /// Seconds to advance the engine's internal clock by after dispatch;
    /// negative resets it to wall-clock "now".
    pub internal_time_advance: i64,
}

/// Ordered sequence of [`Requirement`]s, persisted as a single opaque blob
/// under a well-known label in the catalog store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// The requirements, in schedule order.
    pub schedule: Vec<Requirement>,
}
