//! [`PlayableItem`]: a single catalog entry.

/// Kind of a catalog entry, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ItemType {
    /// A locally-accessible file.
    Local,
    /// A network stream; `duration` caps the play time, `cache` advises buffering.
    Webstream,
}
impl ItemType {
    pub(crate) fn as_db_str(self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Webstream => "WEBSTREAM",
        }
    }
    pub(crate) fn from_db_str(s: &str) -> Self {
        match s {
            "WEBSTREAM" => Self::Webstream,
            _ => Self::Local,
        }
    }
}

/// A catalog entry (spec §3 `PlayableItem`).
///
/// Invariant: `filename` is unique across the catalog. `duration == -1`
/// means unknown/invalid (not yet probed, or probing failed).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlayableItem {
    /// Monotonic catalog id. `None` until inserted.
    pub id: Option<i64>,
    /// URI or local path.
    pub filename: String,
    /// Duration in seconds, or `-1` if unknown. For [`ItemType::Webstream`]
    /// this is the intended play-duration cap instead.
    pub duration: i64,
    /// Free-text description, searched by [`crate::PlaylistView::filter`].
    pub description: String,
    /// Number of times this item has completed (or begun, per spec §9's
    /// at-least-once note) playback.
    pub playcount: u64,
    /// Local file vs. network stream.
    pub item_type: ItemType,
    /// Advisory cache size in KiB, meaningful only for [`ItemType::Webstream`].
    pub cache: Option<i64>,
}
impl PlayableItem {
    /// Constructs a new, not-yet-inserted item with unknown duration.
    #[must_use]
    pub fn new(filename: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            duration: -1,
            description: String::new(),
            playcount: 0,
            item_type,
            cache: None,
        }
    }
    /// `true` if `duration` has been successfully probed.
    #[must_use]
    pub fn has_known_duration(&self) -> bool {
        self.duration >= 0
    }
}
