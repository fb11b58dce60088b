//! Automation Loop (component C6): `run_once`, one iteration of deciding
//! what to play next and playing it.

use crate::{Context, Error};
use std::time::Duration;

fn play_request_for(item: &catalog::PlayableItem) -> player::PlayRequest {
    player::PlayRequest {
        filename: item.filename.clone(),
        duration: item.duration,
        is_webstream: item.item_type == catalog::ItemType::Webstream,
        cache: item.cache,
    }
}

/// Drains the override queue while manual override is enabled or the queue
/// is non-empty, playing each item to completion before considering the
/// next. Returns whether anything was played.
///
/// Unlike the source, which busy-waits with `usleep(500)` and calls
/// `exit(0)` once a process-wide shutdown flag is observed, this polls
/// [`Context::is_shutdown_requested`] and simply returns control to the
/// caller — the decision to actually end the process belongs to whatever
/// owns the automation thread, not to this loop.
///
/// # Errors
/// Propagates catalog lookup errors.
fn drain_manual_override(ctx: &Context) -> Result<bool, Error> {
    let mut did_anything = false;
    while ctx.manual_override() || ctx.override_queue_size() > 0 {
        did_anything = true;
        if let Some(item) = ctx.pop_override()? {
            if let Err(err) = ctx.player.play(&play_request_for(&item)) {
                tracing::error!(%err, "override queue item failed to play");
            }
        } else if ctx.is_shutdown_requested() {
            break;
        } else {
            std::thread::sleep(Duration::from_micros(500));
        }
    }
    Ok(did_anything)
}

/// Advances the automation state by possibly playing a track, blocking
/// until it finishes. Returns `true` if something (including silence) was
/// played this iteration; `false` if the loop made no progress and should
/// be retried immediately (e.g. after abandoning an empty mainshow).
///
/// # Errors
/// Propagates catalog, player, and requirement-engine errors.
pub fn run_once(ctx: &Context) -> Result<bool, Error> {
    if drain_manual_override(ctx)? {
        ctx.engine.set_time(shared::time_now().timestamp());
    }

    if ctx.bumperlist_size() == 0 {
        ctx.reset_bumpers()?;
    }

    let (next_requirements, deadline, gap) = ctx.engine.fill_next();
    let now = shared::time_now().timestamp();

    if now >= deadline {
        ctx.engine
            .run_block(deadline, &next_requirements, &ctx.registry, ctx);
        // Needed only if bumpers were consumed by what we just ran, but
        // cheap enough to do unconditionally.
        ctx.reset_bumpers()?;
        return Ok(true);
    }

    let timelimit = deadline - now + gap;
    if let Some(item) = ctx.pop_mainshow_with_timelimit(timelimit)? {
        // At-least-once: counted before playback starts (spec §9).
        if let Some(id) = item.id {
            ctx.store.increment_playcount(id)?;
        }
        ctx.player.play(&play_request_for(&item))?;
        return Ok(true);
    }

    if deadline - now >= ctx.config.bumpercutoff && ctx.mainshow_size() == 0 {
        tracing::warn!("abandoning mainshow due to too much remaining time");
        ctx.set_mainshow(None)?;
        return Ok(false);
    }

    if let Some(item) = ctx.pop_bumper_with_timelimit(deadline - now + gap)? {
        // At-least-once: counted before playback starts (spec §9).
        if let Some(id) = item.id {
            ctx.store.increment_playcount(id)?;
        }
        ctx.player.play(&play_request_for(&item))?;
        return Ok(true);
    }

    let time_left = deadline - now;
    if time_left <= 0 {
        return Ok(true);
    }
    if time_left <= ctx.config.sleepcutoff {
        std::thread::sleep(Duration::from_secs(
            u64::try_from(time_left).unwrap_or(0),
        ));
        return Ok(true);
    }

    tracing::warn!("too much time left to sleep post-bumpers");
    Ok(false)
}
