//! [`Playlist`], [`PlaylistSummary`], and the in-memory [`PlaylistView`].

use crate::{Error, PlayableItem, Store};
use regex::RegexBuilder;

/// Summary row returned by [`Store::list_playlists`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlaylistSummary {
    /// Catalog id.
    pub id: i64,
    /// Unique playlist name.
    pub name: String,
    /// Non-negative weight used for weighted-random selection.
    pub weight: i64,
    /// Non-tombstoned item count.
    pub length: usize,
}

/// A named ordered collection of item ids, as persisted (spec §3 `Playlist`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Playlist {
    /// Catalog id. `0` for synthetic playlists (e.g. the superlist).
    pub id: i64,
    /// Unique playlist name.
    pub name: String,
    /// Non-negative weight used for weighted-random selection.
    pub weight: i64,
    /// Ordered item ids.
    pub item_ids: Vec<i64>,
}

/// A request to append or replace a playlist's item sequence (spec §4.3
/// `apply_merge_request`), as submitted through the control surface.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MergeRequest {
    /// Item ids to append (or replace with, if `replace` is set by the caller).
    pub item_ids: Vec<i64>,
}

/// An in-memory working copy of a [`Playlist`] (spec §3/§4.3 `Playlist View`).
///
/// Items are tombstoned (`None`) in place when popped, so ordinal position of
/// remaining entries is preserved and the backing catalog is never mutated
/// by consumption. A view flagged [`PlaylistView::never_save`] refuses writes
/// through the generic store path, since it represents ephemeral runtime
/// state (override queue, bumpers, main show).
#[derive(Debug, Clone)]
pub struct PlaylistView {
    name: String,
    weight: i64,
    slots: Vec<Option<i64>>,
    never_save: bool,
}
impl PlaylistView {
    /// Wraps a freshly-fetched [`Playlist`] as a view.
    #[must_use]
    pub fn from_playlist(playlist: Playlist, never_save: bool) -> Self {
        Self {
            name: playlist.name,
            weight: playlist.weight,
            slots: playlist.item_ids.into_iter().map(Some).collect(),
            never_save,
        }
    }
    /// Constructs an empty view, e.g. for an override queue with no backing playlist.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 0,
            slots: Vec::new(),
            never_save: true,
        }
    }
    /// Playlist name this view was loaded from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// `true` if writes through the generic store path must be refused.
    #[must_use]
    pub fn never_save(&self) -> bool {
        self.never_save
    }
    /// Count of non-tombstoned entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
    /// `true` if no non-tombstoned entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
    /// Scans in order, fetching each candidate, returning the first whose
    /// duration fits within `seconds` and tombstoning it. The view is
    /// expected to be pre-sorted duration-descending, so the first fit is
    /// typically the largest that still fits.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn pop_with_timelimit(
        &mut self,
        seconds: i64,
        store: &Store,
    ) -> Result<Option<PlayableItem>, Error> {
        for slot in &mut self.slots {
            let Some(id) = *slot else { continue };
            let Some(item) = store.fetch_item_by_id(id)? else {
                *slot = None;
                continue;
            };
            if item.duration <= seconds {
                *slot = None;
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
    /// Unconditionally pops the first non-tombstoned entry.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn pop_front(&mut self, store: &Store) -> Result<Option<PlayableItem>, Error> {
        for slot in &mut self.slots {
            let Some(id) = slot.take() else { continue };
            if let Some(item) = store.fetch_item_by_id(id)? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
    /// Returns a fresh [`Playlist`] of entries whose description or filename
    /// case-insensitively contains `pattern`.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression, or a
    /// catalog lookup fails.
    pub fn filter(&self, store: &Store, pattern: &str) -> Result<Playlist, Error> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Malformed(format!("invalid filter pattern: {e}")))?;
        let mut item_ids = Vec::new();
        for slot in &self.slots {
            let Some(id) = *slot else { continue };
            let Some(item) = store.fetch_item_by_id(id)? else {
                continue;
            };
            if re.is_match(&item.description) || re.is_match(&item.filename) {
                item_ids.push(id);
            }
        }
        Ok(Playlist {
            id: 0,
            name: format!("{}:filter({pattern})", self.name),
            weight: self.weight,
            item_ids,
        })
    }
    /// Either appends `request`'s ids to the view, or (if `replace`) replaces
    /// the entire id sequence.
    pub fn apply_merge_request(&mut self, request: &MergeRequest, replace: bool) {
        if replace {
            self.slots.clear();
        }
        self.slots.extend(request.item_ids.iter().copied().map(Some));
    }
    /// Pushes a single id to the back of the view (used by the override queue).
    pub fn push_back(&mut self, id: i64) {
        self.slots.push(Some(id));
    }
    /// Snapshots the current (non-tombstoned) ids as a [`Playlist`].
    #[must_use]
    pub fn to_playlist(&self, id: i64) -> Playlist {
        Playlist {
            id,
            name: self.name.clone(),
            weight: self.weight,
            item_ids: self.slots.iter().filter_map(|s| *s).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemType;

    fn store_with_items(durations: &[i64]) -> (Store, Vec<i64>) {
        let store = Store::open_in_memory().expect("in-memory store");
        let mut ids = Vec::new();
        for (i, &d) in durations.iter().enumerate() {
            let mut item = PlayableItem::new(format!("file-{i}.mp3"), ItemType::Local);
            item.duration = d;
            item.description = format!("track {i}");
            ids.push(store.insert_item(&item).expect("insert"));
        }
        (store, ids)
    }

    #[test]
    fn pop_with_timelimit_returns_first_fit_and_tombstones_exactly_one() {
        let (store, ids) = store_with_items(&[600, 40, 30]);
        let playlist = Playlist {
            id: 1,
            name: "mainshow".into(),
            weight: 1,
            item_ids: ids,
        };
        let mut view = PlaylistView::from_playlist(playlist, true);
        let before = view.size();
        let popped = view.pop_with_timelimit(215, &store).expect("lookup ok");
        assert_eq!(popped.map(|i| i.duration), Some(40));
        assert_eq!(view.size(), before - 1);
    }

    #[test]
    fn pop_with_timelimit_zero_matches_only_zero_duration() {
        let (store, ids) = store_with_items(&[5, 0, 3]);
        let playlist = Playlist {
            id: 1,
            name: "x".into(),
            weight: 1,
            item_ids: ids,
        };
        let mut view = PlaylistView::from_playlist(playlist, true);
        let popped = view.pop_with_timelimit(0, &store).expect("lookup ok");
        assert_eq!(popped.map(|i| i.duration), Some(0));
    }

    #[test]
    fn pop_with_timelimit_no_fit_returns_none_and_does_not_shrink() {
        let (store, ids) = store_with_items(&[600, 500]);
        let playlist = Playlist {
            id: 1,
            name: "x".into(),
            weight: 1,
            item_ids: ids,
        };
        let mut view = PlaylistView::from_playlist(playlist, true);
        let before = view.size();
        let popped = view.pop_with_timelimit(10, &store).expect("lookup ok");
        assert!(popped.is_none());
        assert_eq!(view.size(), before);
    }

    #[test]
    fn filter_matches_description_case_insensitively() {
        let (store, ids) = store_with_items(&[1, 2, 3]);
        let playlist = Playlist {
            id: 1,
            name: "x".into(),
            weight: 1,
            item_ids: ids,
        };
        let view = PlaylistView::from_playlist(playlist, true);
        let filtered = view.filter(&store, "TRACK 1").expect("valid regex");
        assert_eq!(filtered.item_ids.len(), 1);
    }
}
