//! The four built-in command handlers, and the registry that wires them up.

use crate::Context;
use requirements::{CommandKind, CommandRegistry, PlayFilesEntry, Requirement};

fn play_request_for(item: &catalog::PlayableItem) -> player::PlayRequest {
    player::PlayRequest {
        filename: item.filename.clone(),
        duration: item.duration,
        is_webstream: item.item_type == catalog::ItemType::Webstream,
        cache: item.cache,
    }
}

fn no_op(_ctx: &Context, _deadline: i64, _requirement: &Requirement) {}

/// Logs `message` at error level and aborts the process (spec §7:
/// `LegalIdExhausted` is a fatal, operator-level invariant, not a
/// recoverable `NotFound`). Tests substitute a panic for the real exit so
/// the fatal path is observable without killing the test binary.
#[cfg_attr(test, allow(clippy::panic))]
fn fatal(message: &str) -> ! {
    tracing::error!("{message}");
    #[cfg(not(test))]
    std::process::exit(1);
    #[cfg(test)]
    panic!("fatal: {message}");
}

fn play_files(ctx: &Context, _deadline: i64, requirement: &Requirement) {
    for entry in &requirement.payload {
        let request = match entry {
            PlayFilesEntry::CatalogId(id) => {
                let item = match ctx.store.fetch_item_by_id(*id) {
                    Ok(Some(item)) => item,
                    Ok(None) => {
                        tracing::warn!(id, "PLAY_FILES: catalog item not found");
                        continue;
                    }
                    Err(err) => {
                        tracing::error!(%err, "PLAY_FILES: catalog lookup failed");
                        continue;
                    }
                };
                // At-least-once: counted before playback starts (spec §9).
                if let Err(err) = ctx.store.increment_playcount(*id) {
                    tracing::error!(%err, "PLAY_FILES: failed to increment playcount");
                }
                play_request_for(&item)
            }
            PlayFilesEntry::Raw(raw) => player::PlayRequest {
                filename: raw.filename.clone(),
                duration: raw.duration,
                is_webstream: false,
                cache: None,
            },
        };
        if let Err(err) = ctx.player.play(&request) {
            tracing::error!(%err, "PLAY_FILES: failed to play item");
        }
    }
}

fn legal_id(ctx: &Context, _deadline: i64, _requirement: &Requirement) {
    tracing::info!("playing legal id");
    let mut playlist = match ctx.fetch_legalid_playlist() {
        Ok(playlist) => playlist,
        Err(err) => {
            tracing::error!(%err, "LEGAL_ID: failed to fetch legalid playlist");
            return;
        }
    };
    loop {
        let popped = playlist.pop_with_timelimit(ctx.config.legalid_max_length, &ctx.store);
        let item = match popped {
            Ok(Some(item)) => item,
            Ok(None) => {
                fatal("LEGAL_ID: legalid playlist exhausted, no id played this cycle");
            }
            Err(err) => {
                tracing::error!(%err, "LEGAL_ID: catalog lookup failed");
                return;
            }
        };
        if let Some(id) = item.id {
            if let Err(err) = ctx.store.increment_playcount(id) {
                tracing::error!(%err, "LEGAL_ID: failed to increment playcount");
            }
        }
        match ctx.player.play(&play_request_for(&item)) {
            Ok(()) => return,
            Err(err) => tracing::warn!(%err, "LEGAL_ID: item failed to play, trying next"),
        }
    }
}

fn set_mainshow(ctx: &Context, _deadline: i64, requirement: &Requirement) {
    if let Err(err) = ctx.set_mainshow(requirement.target_name.as_deref()) {
        tracing::error!(%err, "SET_MAINSHOW: failed to select mainshow");
    }
}

/// Builds the registry wired with all four built-in commands.
#[must_use]
pub fn default_registry() -> CommandRegistry<Context> {
    let mut registry = CommandRegistry::new();
    registry.register(CommandKind::NoOp, no_op);
    registry.register(CommandKind::PlayFiles, play_files);
    registry.register(CommandKind::LegalId, legal_id);
    registry.register(CommandKind::SetMainshow, set_mainshow);
    registry
}

#[cfg(test)]
mod tests {
    use super::default_registry;
    use crate::{Context, LoopConfig};
    use catalog::{ItemType, PlayableItem, Store};
    use player::{PlayerSession, SessionConfig};
    use requirements::{
        CommandKind, EngineConfig, PlayFilesEntry, Requirement, RequirementEngine, Schedule,
        TimeSpecification,
    };

    fn fast_exit_player() -> PlayerSession {
        PlayerSession::new(SessionConfig {
            player_path: "true".into(),
            ..SessionConfig::default()
        })
    }

    fn test_context(store: Store) -> Context {
        let engine = RequirementEngine::new(EngineConfig::default(), Schedule::default(), 0);
        Context::new(
            store,
            fast_exit_player(),
            engine,
            default_registry(),
            LoopConfig::default(),
        )
        .expect("valid registry and initial mainshow selection")
    }

    fn req(kind: CommandKind) -> Requirement {
        Requirement {
            kind,
            payload: Vec::new(),
            target_name: None,
            when: TimeSpecification::default(),
            reboot: false,
            internal_time_advance: 1,
        }
    }

    #[test]
    fn default_registry_passes_check_validity() {
        assert!(default_registry().check_validity().is_ok());
    }

    #[test]
    fn play_files_increments_playcount_before_play() {
        let store = Store::open_in_memory().expect("in-memory store");
        let id = store
            .insert_item(&PlayableItem::new("track.mp3", ItemType::Local))
            .expect("insert");
        let ctx = test_context(store);

        let mut requirement = req(CommandKind::PlayFiles);
        requirement.payload = vec![PlayFilesEntry::CatalogId(id)];
        ctx.registry.dispatch(&ctx, 0, &requirement);

        let item = ctx
            .store
            .fetch_item_by_id(id)
            .expect("lookup")
            .expect("item exists");
        assert_eq!(item.playcount, 1);
    }

    #[test]
    fn play_files_raw_entry_does_not_touch_the_catalog() {
        let store = Store::open_in_memory().expect("in-memory store");
        let ctx = test_context(store);

        let mut requirement = req(CommandKind::PlayFiles);
        requirement.payload = vec![PlayFilesEntry::Raw(requirements::RawPlayableItem {
            filename: "transient.mp3".into(),
            duration: 30,
            description: "one-off upload".into(),
        })];
        // Must not panic despite there being no such catalog row.
        ctx.registry.dispatch(&ctx, 0, &requirement);
    }

    #[test]
    fn legal_id_retries_past_an_unfit_item() {
        let store = Store::open_in_memory().expect("in-memory store");
        let legalid_playlist_id = store.create_playlist("legalid", 1).expect("create playlist");
        let mut too_long = PlayableItem::new("long.mp3", ItemType::Local);
        too_long.duration = 600;
        let long_id = store.insert_item(&too_long).expect("insert");
        let mut short = PlayableItem::new("short.mp3", ItemType::Local);
        short.duration = 10;
        let short_id = store.insert_item(&short).expect("insert");
        store
            .update_playlist_items(legalid_playlist_id, &[long_id, short_id])
            .expect("set items");

        let ctx = test_context(store);
        ctx.registry.dispatch(&ctx, 0, &req(CommandKind::LegalId));

        let short_item = ctx
            .store
            .fetch_item_by_id(short_id)
            .expect("lookup")
            .expect("item exists");
        assert_eq!(short_item.playcount, 1);
        let long_item = ctx
            .store
            .fetch_item_by_id(long_id)
            .expect("lookup")
            .expect("item exists");
        assert_eq!(long_item.playcount, 0);
    }

    #[test]
    #[should_panic(expected = "LEGAL_ID: legalid playlist exhausted")]
    fn legal_id_on_empty_playlist_is_fatal() {
        let store = Store::open_in_memory().expect("in-memory store");
        store.create_playlist("legalid", 1).expect("create playlist");
        let ctx = test_context(store);
        ctx.registry.dispatch(&ctx, 0, &req(CommandKind::LegalId));
    }

    #[test]
    fn set_mainshow_falls_back_when_target_not_found() {
        let store = Store::open_in_memory().expect("in-memory store");
        store.create_playlist("fallback", 1).expect("create playlist");
        let ctx = test_context(store);

        let mut requirement = req(CommandKind::SetMainshow);
        requirement.target_name = Some("does-not-exist".into());
        ctx.registry.dispatch(&ctx, 0, &requirement);
        assert_eq!(ctx.mainshow_size(), 0);
    }
}
