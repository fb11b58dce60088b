//! Shared State (component C7): the resources and session-lifetime
//! playlists the Automation Loop and its command handlers operate on.
//!
//! The source publishes this as a process-global singleton plus a
//! thread-local main-player pointer. Here it is an explicitly constructed
//! value; command handlers receive it as `&Context` through the registry's
//! handler signature rather than reaching for a global. Since `run_once`
//! and every command it dispatches run on the one dedicated automation
//! thread (spec §5), a single [`player::PlayerSession`] inside `Context`
//! covers what the source's thread-local `player_` was for — a
//! control-surface request that needs to play something gets its own
//! session instead (constructed by the caller, not from here).

use crate::Error;
use catalog::{Playlist, PlaylistView, Store};
use player::PlayerSession;
use requirements::{CommandRegistry, RequirementEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Runtime configuration for the Automation Loop itself (distinct from the
/// Requirement Engine's own [`requirements::EngineConfig`]).
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Start in manual-override mode: a human is in control until disabled.
    pub defaulthuman: bool,
    /// Seconds remaining before the deadline below which we fall back to the
    /// bumpers playlist instead of reselecting a mainshow.
    pub bumpercutoff: i64,
    /// Seconds remaining below which dead air is preferable to reselecting.
    pub sleepcutoff: i64,
    /// Bumpers playlist name; empty selects the synthetic superlist of
    /// every catalog item.
    pub bumpers: String,
    /// Legal-id playlist name.
    pub legalid: String,
    /// Longest legal-id item considered playable, in seconds.
    pub legalid_max_length: i64,
}
impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            defaulthuman: false,
            bumpercutoff: 200,
            sleepcutoff: 4,
            bumpers: String::new(),
            legalid: "legalid".into(),
            legalid_max_length: 60,
        }
    }
}

/// Shared state driving one Automation Loop.
pub struct Context {
    pub(crate) store: Store,
    pub(crate) player: PlayerSession,
    pub(crate) engine: RequirementEngine,
    pub(crate) registry: CommandRegistry<Context>,
    pub(crate) config: LoopConfig,
    override_enabled: AtomicBool,
    shutdown_requested: AtomicBool,
    override_playlist: Mutex<PlaylistView>,
    mainshow: Mutex<PlaylistView>,
    bumperlist: Mutex<PlaylistView>,
}

impl Context {
    /// Constructs a `Context`, validating `registry` and selecting an
    /// initial mainshow the way the source constructor does.
    ///
    /// # Errors
    /// Returns an error if `registry` is missing a handler for some
    /// [`requirements::CommandKind`], or if the initial mainshow selection
    /// hits a catalog error.
    pub fn new(
        store: Store,
        player: PlayerSession,
        engine: RequirementEngine,
        registry: CommandRegistry<Context>,
        config: LoopConfig,
    ) -> Result<Self, Error> {
        registry.check_validity()?;
        let ctx = Self {
            store,
            player,
            engine,
            registry,
            override_enabled: AtomicBool::new(config.defaulthuman),
            shutdown_requested: AtomicBool::new(false),
            override_playlist: Mutex::new(PlaylistView::empty("override")),
            mainshow: Mutex::new(PlaylistView::empty("mainshow")),
            bumperlist: Mutex::new(PlaylistView::empty("bumpers")),
            config,
        };
        ctx.set_mainshow(None)?;
        Ok(ctx)
    }

    fn mainshow(&self) -> std::sync::MutexGuard<'_, PlaylistView> {
        self.mainshow
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
    fn bumperlist(&self) -> std::sync::MutexGuard<'_, PlaylistView> {
        self.bumperlist
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
    fn override_playlist(&self) -> std::sync::MutexGuard<'_, PlaylistView> {
        self.override_playlist
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// `true` while the loop should only play items explicitly pushed to
    /// the override queue.
    #[must_use]
    pub fn manual_override(&self) -> bool {
        self.override_enabled.load(Ordering::SeqCst)
    }

    /// Enables or disables manual override.
    pub fn set_manual_override(&self, value: bool) {
        self.override_enabled.store(value, Ordering::SeqCst);
    }

    /// Appends an item to the override queue, to be played ahead of
    /// anything schedule-driven.
    pub fn push_override_item(&self, id: i64) {
        self.override_playlist().push_back(id);
    }

    /// Requests that the loop stop draining the override queue at its next
    /// opportunity, rather than `exit()`ing the process outright as the
    /// source does.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// `true` once [`Context::request_shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Size of the current mainshow playlist view.
    #[must_use]
    pub fn mainshow_size(&self) -> usize {
        self.mainshow().size()
    }

    /// Size of the current bumpers playlist view.
    #[must_use]
    pub fn bumperlist_size(&self) -> usize {
        self.bumperlist().size()
    }

    /// Size of the current override queue.
    #[must_use]
    pub fn override_queue_size(&self) -> usize {
        self.override_playlist().size()
    }

    /// Pops the first non-tombstoned override queue entry, if any.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn pop_override(&self) -> Result<Option<catalog::PlayableItem>, Error> {
        Ok(self.override_playlist().pop_front(&self.store)?)
    }

    /// Scans the mainshow view for the first item fitting `seconds`.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn pop_mainshow_with_timelimit(
        &self,
        seconds: i64,
    ) -> Result<Option<catalog::PlayableItem>, Error> {
        Ok(self.mainshow().pop_with_timelimit(seconds, &self.store)?)
    }

    /// Scans the bumpers view for the first item fitting `seconds`.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn pop_bumper_with_timelimit(
        &self,
        seconds: i64,
    ) -> Result<Option<catalog::PlayableItem>, Error> {
        Ok(self.bumperlist().pop_with_timelimit(seconds, &self.store)?)
    }

    /// Replaces the mainshow with a weighted-random pick from the catalog
    /// (`target` absent), or with the named playlist, shuffled
    /// playcount-ascending (`target` present and found). Falls back to a
    /// fresh random pick if `target` is empty or not found, matching the
    /// source's `SetMainshow(std::string)` overload.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn set_mainshow(&self, target: Option<&str>) -> Result<(), Error> {
        let picked = match target {
            None | Some("") => self.store.fetch_random_weighted_playlist()?,
            Some(name) => {
                if let Some(playlist) = self.store.fetch_playlist_shuffled(name)? {
                    Some(playlist)
                } else {
                    tracing::warn!(name, "requested mainshow playlist not found");
                    self.store.fetch_random_weighted_playlist()?
                }
            }
        };
        let view = if let Some(playlist) = picked {
            tracing::info!(name = %playlist.name, "selected mainshow");
            PlaylistView::from_playlist(playlist, true)
        } else {
            tracing::warn!("no playlist available to select as mainshow");
            PlaylistView::empty("mainshow")
        };
        *self.mainshow() = view;
        Ok(())
    }

    /// Reloads the bumpers view: the named playlist (locked against
    /// deletion while in use) if `config.bumpers` is set, otherwise the
    /// synthetic superlist of every catalog item.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn reset_bumpers(&self) -> Result<(), Error> {
        let playlist = if self.config.bumpers.is_empty() {
            self.store.fetch_superlist(i64::MAX, 0)?
        } else {
            self.lock_playlist_by_name(&self.config.bumpers)?;
            if let Some(playlist) = self.store.fetch_playlist_by_name(&self.config.bumpers)? {
                playlist
            } else {
                tracing::error!(name = %self.config.bumpers, "configured bumpers playlist not found");
                Playlist {
                    id: 0,
                    name: self.config.bumpers.clone(),
                    weight: 0,
                    item_ids: Vec::new(),
                }
            }
        };
        *self.bumperlist() = PlaylistView::from_playlist(playlist, true);
        Ok(())
    }

    fn lock_playlist_by_name(&self, name: &str) -> Result<(), Error> {
        if let Some(summary) = self
            .store
            .list_playlists()?
            .into_iter()
            .find(|summary| summary.name == name)
        {
            self.store.set_playlist_locked(summary.id, true)?;
        }
        Ok(())
    }

    /// Toggles pause on the main player. Per spec §6, a caller is expected
    /// to only honor this while [`Context::manual_override`] is set.
    pub fn pause_player(&self) {
        self.player.pause();
    }

    /// Unpauses the main player and resets speed to `1.0`, mirroring what
    /// `/override/disable` does to the main player before handing control
    /// back to the schedule (spec §6, §8 round-trip property).
    pub fn restore_player_defaults(&self) {
        self.player.unpause();
        self.player.set_speed(1.0);
    }

    /// Kills the main player's subprocess immediately, if one is running.
    pub fn stop_player(&self) {
        self.player.stop();
    }

    /// Snapshot of the main player's live state.
    #[must_use]
    pub fn player_state(&self) -> player::PlayerState {
        self.player.state()
    }

    /// Sets the main player's playback speed.
    pub fn set_player_speed(&self, speed: f64) {
        self.player.set_speed(speed);
    }

    /// Seeks the main player to an absolute time position in seconds.
    pub fn seek_player(&self, time_pos: f64) {
        self.player.seek(time_pos);
    }

    /// Looks up and locks the legal-id playlist by [`LoopConfig::legalid`],
    /// shuffled playcount-ascending.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn fetch_legalid_playlist(&self) -> Result<PlaylistView, Error> {
        self.lock_playlist_by_name(&self.config.legalid)?;
        let playlist = self
            .store
            .fetch_playlist_shuffled(&self.config.legalid)?
            .unwrap_or(Playlist {
                id: 0,
                name: self.config.legalid.clone(),
                weight: 0,
                item_ids: Vec::new(),
            });
        Ok(PlaylistView::from_playlist(playlist, true))
    }

    /// Current schedule, as held by the Requirement Engine.
    #[must_use]
    pub fn schedule(&self) -> requirements::Schedule {
        self.engine.copy_to()
    }

    /// Replaces and persists the schedule. Backs `/requirements/update`.
    ///
    /// # Errors
    /// Propagates catalog or serialization errors.
    pub fn replace_schedule(&self, schedule: requirements::Schedule) -> Result<(), Error> {
        self.engine.copy_from(schedule);
        self.engine.save(&self.store)?;
        Ok(())
    }

    /// Dispatches `requirement` to its handler immediately, without
    /// touching the engine's internal clock or the persisted schedule.
    /// Backs `/requirements/runonce`.
    pub fn run_requirement_once(&self, requirement: &requirements::Requirement) {
        let now = shared::time_now().timestamp();
        self.registry.dispatch(self, now, requirement);
    }

    /// Summaries of every stored playlist. Backs `/playlist/all`.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn list_playlists(&self) -> Result<Vec<catalog::PlaylistSummary>, Error> {
        Ok(self.store.list_playlists()?)
    }

    /// Creates a new, empty, stored playlist. Backs `/playlist/fetch?new`.
    ///
    /// # Errors
    /// Returns [`catalog::Error::Constraint`] if `name` is already taken.
    pub fn create_playlist(&self, name: &str, weight: i64) -> Result<i64, Error> {
        Ok(self.store.create_playlist(name, weight)?)
    }

    /// Looks up a stored playlist by id.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn fetch_playlist_by_id(&self, id: i64) -> Result<Option<Playlist>, Error> {
        Ok(self.store.fetch_playlist_by_id(id)?)
    }

    /// Looks up a stored playlist by name.
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn fetch_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>, Error> {
        Ok(self.store.fetch_playlist_by_name(name)?)
    }

    /// The synthetic playlist of every catalog item, duration-descending.
    /// Backs `/playlist/fetch?fetchall` (the `limit`/`offset` params).
    ///
    /// # Errors
    /// Propagates catalog lookup errors.
    pub fn fetch_superlist(&self, limit: i64, offset: i64) -> Result<Playlist, Error> {
        Ok(self.store.fetch_superlist(limit, offset)?)
    }

    /// A snapshot of the live mainshow view as a [`Playlist`] (id `0`,
    /// never persisted). Backs `/playlist/fetch?mainshow`.
    #[must_use]
    pub fn mainshow_snapshot(&self) -> Playlist {
        self.mainshow().to_playlist(0)
    }

    /// A snapshot of the live override queue as a [`Playlist`] (id `0`,
    /// never persisted). Backs `/playlist/fetch?override`.
    #[must_use]
    pub fn override_snapshot(&self) -> Playlist {
        self.override_playlist().to_playlist(0)
    }

    /// A snapshot of the live bumpers view as a [`Playlist`] (id `0`,
    /// never persisted). Backs `/playlist/fetch?bumperlist`.
    #[must_use]
    pub fn bumperlist_snapshot(&self) -> Playlist {
        self.bumperlist().to_playlist(0)
    }

    /// Applies `request` to the stored playlist `id`, either appending or
    /// (if `overwrite`) replacing its item sequence, then persists it.
    /// Backs `/playlist/update`.
    ///
    /// # Errors
    /// Propagates catalog lookup/write errors.
    pub fn update_stored_playlist(
        &self,
        id: i64,
        request: &catalog::MergeRequest,
        overwrite: bool,
    ) -> Result<(), Error> {
        let existing = self
            .store
            .fetch_playlist_by_id(id)?
            .unwrap_or(Playlist {
                id,
                name: String::new(),
                weight: 0,
                item_ids: Vec::new(),
            });
        let mut view = PlaylistView::from_playlist(existing, false);
        view.apply_merge_request(request, overwrite);
        let merged = view.to_playlist(id);
        self.store.update_playlist_items(id, &merged.item_ids)?;
        Ok(())
    }

    /// Runs an arbitrary read-only query against the catalog. Backs the
    /// `/sql` resource; gating this behind a configuration flag is the
    /// caller's responsibility, not this method's.
    ///
    /// # Errors
    /// Propagates catalog backend errors.
    pub fn query_raw(&self, sql: &str) -> Result<catalog::SqlResultSet, Error> {
        Ok(self.store.query_raw(sql)?)
    }

    /// Runs every `reboot`-flagged requirement in the effective schedule
    /// once, immediately. Intended to be called once at startup, before the
    /// control surface begins serving, when configuration's `doinit` is set
    /// (spec §6).
    pub fn run_reboot_requirements(&self) {
        self.engine.handle_reboot(&self.registry, self);
    }

    /// The underlying catalog store, for callers (e.g. the control surface)
    /// that need an operation this `Context` does not itself wrap, such as
    /// [`catalog::PlaylistView::filter`] against an arbitrary snapshot.
    #[must_use]
    pub fn store(&self) -> &catalog::Store {
        &self.store
    }
}
