//! `warp` routes for the resources documented in spec §6.

use crate::format::{self, ContentFormat};
use crate::messages::{
    Ack, ErrorMessage, PlayerStateMessage, PlaylistFetchQuery, PlaylistUpdateQuery, SeekQuery,
    SpeedQuery, SqlQuery,
};
use crate::{ApiConfig, Error};
use automation::Context;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

/// Builds the full set of control-surface routes over `ctx`.
pub fn routes(
    ctx: Arc<Context>,
    config: ApiConfig,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    override_enable(ctx.clone())
        .or(override_disable(ctx.clone()))
        .unify()
        .or(requirements_fetch(ctx.clone()))
        .unify()
        .or(requirements_update(ctx.clone(), config.clone()))
        .unify()
        .or(requirements_runonce(ctx.clone()))
        .unify()
        .or(playlist_fetch(ctx.clone()))
        .unify()
        .or(playlist_all(ctx.clone()))
        .unify()
        .or(playlist_update(ctx.clone()))
        .unify()
        .or(player_pause(ctx.clone()))
        .unify()
        .or(player_stop(ctx.clone()))
        .unify()
        .or(player_state(ctx.clone()))
        .unify()
        .or(player_speed(ctx.clone()))
        .unify()
        .or(player_seek(ctx.clone()))
        .unify()
        .or(sql(ctx, config))
        .unify()
}

fn with_ctx(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Arc<Context>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn remote_user() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-remote-user")
}

fn log_remote_user(resource: &'static str, remote_user: Option<&str>) {
    tracing::info!(resource, remote_user, "control-surface request");
}

fn parse_format(query: &HashMap<String, String>) -> Result<ContentFormat, Error> {
    query.get("format").map_or(Ok(ContentFormat::default()), |raw| {
        ContentFormat::from_str(raw).map_err(Error::InvalidRequest)
    })
}

fn respond<T: serde::Serialize + std::fmt::Debug>(
    format: ContentFormat,
    result: Result<T, Error>,
) -> Response {
    match result {
        Ok(value) => format::encode(format, &value),
        Err(err) => render_error(format, &err),
    }
}

fn render_error(format: ContentFormat, err: &Error) -> Response {
    let status = match err {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::Constraint(_) => StatusCode::CONFLICT,
        Error::SqlDisabled => StatusCode::FORBIDDEN,
        Error::Context(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorMessage {
        message: err.to_string(),
    };
    let mut response = format::encode(format, &body);
    *response.status_mut() = status;
    response
}

fn override_enable(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("override" / "enable")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/override/enable", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            ctx.set_manual_override(true);
            respond(format, Ok(Ack::default()))
        })
}

fn override_disable(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("override" / "disable")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/override/disable", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            ctx.set_manual_override(false);
            ctx.restore_player_defaults();
            respond(format, Ok(Ack::default()))
        })
}

fn requirements_fetch(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("requirements" / "fetch")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/requirements/fetch", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            respond(format, Ok(ctx.schedule()))
        })
}

fn requirements_update(
    ctx: Arc<Context>,
    config: ApiConfig,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("requirements" / "update")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .and(warp::body::bytes())
        .map(
            move |ctx: Arc<Context>,
                  query: HashMap<String, String>,
                  user: Option<String>,
                  body: bytes::Bytes| {
                log_remote_user("/requirements/update", user.as_deref());
                let format = parse_format(&query).unwrap_or_default();
                let result = (|| -> Result<Ack, Error> {
                    if !config.is_authorized(user.as_deref()) {
                        return Err(Error::InvalidRequest(
                            "requirements/update requires a super-user".into(),
                        ));
                    }
                    let schedule = format::decode(format, &body)
                        .map_err(Error::InvalidRequest)?;
                    ctx.replace_schedule(schedule)?;
                    Ok(Ack::default())
                })();
                respond(format, result)
            },
        )
}

fn requirements_runonce(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("requirements" / "runonce")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .and(warp::body::bytes())
        .map(
            |ctx: Arc<Context>,
             query: HashMap<String, String>,
             user: Option<String>,
             body: bytes::Bytes| {
                log_remote_user("/requirements/runonce", user.as_deref());
                let format = parse_format(&query).unwrap_or_default();
                let result = (|| -> Result<Ack, Error> {
                    let requirement = format::decode(format, &body).map_err(Error::InvalidRequest)?;
                    ctx.run_requirement_once(&requirement);
                    Ok(Ack::default())
                })();
                respond(format, result)
            },
        )
}

fn playlist_fetch(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("playlist" / "fetch")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::query::<PlaylistFetchQuery>())
        .and(remote_user())
        .map(
            |ctx: Arc<Context>,
             raw_query: HashMap<String, String>,
             query: PlaylistFetchQuery,
             user: Option<String>| {
                log_remote_user("/playlist/fetch", user.as_deref());
                let format = parse_format(&raw_query).unwrap_or_default();
                let result = playlist_fetch_impl(&ctx, &query);
                respond(format, result)
            },
        )
}

fn playlist_fetch_impl(
    ctx: &Context,
    query: &PlaylistFetchQuery,
) -> Result<catalog::Playlist, Error> {
    let mut playlist = if let Some(name) = &query.new {
        let id = ctx.create_playlist(name, 1)?;
        catalog::Playlist {
            id,
            name: name.clone(),
            weight: 1,
            item_ids: Vec::new(),
        }
    } else if query.mainshow {
        ctx.mainshow_snapshot()
    } else if query.override_queue {
        ctx.override_snapshot()
    } else if query.bumperlist {
        ctx.bumperlist_snapshot()
    } else if query.fetchall {
        ctx.fetch_superlist(query.limit.unwrap_or(i64::MAX), query.offset.unwrap_or(0))?
    } else if let Some(id) = query.id {
        ctx.fetch_playlist_by_id(id)?
            .ok_or_else(|| Error::InvalidRequest(format!("no playlist with id {id}")))?
    } else {
        return Err(Error::InvalidRequest(
            "one of id|mainshow|override|bumperlist|new|fetchall is required".into(),
        ));
    };
    if let Some(pattern) = &query.filter {
        let view = catalog::PlaylistView::from_playlist(playlist.clone(), true);
        playlist = view
            .filter(ctx.store(), pattern)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
    }
    if let Some(limit) = query.truncate {
        playlist.item_ids.truncate(limit);
    }
    if query.noitems {
        playlist.item_ids.clear();
    }
    Ok(playlist)
}

fn playlist_all(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("playlist" / "all")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/playlist/all", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            let result = ctx.list_playlists().map_err(Error::from);
            respond(format, result)
        })
}

fn playlist_update(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("playlist" / "update")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::query::<PlaylistUpdateQuery>())
        .and(remote_user())
        .and(warp::body::bytes())
        .map(
            |ctx: Arc<Context>,
             raw_query: HashMap<String, String>,
             query: PlaylistUpdateQuery,
             user: Option<String>,
             body: bytes::Bytes| {
                log_remote_user("/playlist/update", user.as_deref());
                let format = parse_format(&raw_query).unwrap_or_default();
                let result = (|| -> Result<Ack, Error> {
                    let request = format::decode(format, &body).map_err(Error::InvalidRequest)?;
                    ctx.update_stored_playlist(query.id, &request, query.overwrite)?;
                    Ok(Ack::default())
                })();
                respond(format, result)
            },
        )
}

fn player_pause(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("player" / "pause")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/player/pause", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            if ctx.manual_override() {
                ctx.pause_player();
            } else {
                tracing::debug!("pause ignored: not in manual override");
            }
            respond(format, Ok(Ack::default()))
        })
}

fn player_stop(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("player" / "stop")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/player/stop", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            ctx.stop_player();
            respond(format, Ok(Ack::default()))
        })
}

fn player_state(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("player" / "state")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .map(|ctx: Arc<Context>, query: HashMap<String, String>, user: Option<String>| {
            log_remote_user("/player/state", user.as_deref());
            let format = parse_format(&query).unwrap_or_default();
            let state: PlayerStateMessage = ctx.player_state().into();
            respond(format, Ok(state))
        })
}

fn player_speed(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("player" / "speed")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::query::<SpeedQuery>())
        .and(remote_user())
        .map(
            |ctx: Arc<Context>, raw: HashMap<String, String>, query: SpeedQuery, user: Option<String>| {
                log_remote_user("/player/speed", user.as_deref());
                let format = parse_format(&raw).unwrap_or_default();
                ctx.set_player_speed(query.speed);
                respond(format, Ok(Ack::default()))
            },
        )
}

fn player_seek(ctx: Arc<Context>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("player" / "seek")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::query::<SeekQuery>())
        .and(remote_user())
        .map(
            |ctx: Arc<Context>, raw: HashMap<String, String>, query: SeekQuery, user: Option<String>| {
                log_remote_user("/player/seek", user.as_deref());
                let format = parse_format(&raw).unwrap_or_default();
                ctx.seek_player(query.time_pos);
                respond(format, Ok(Ack::default()))
            },
        )
}

fn sql(
    ctx: Arc<Context>,
    config: ApiConfig,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("sql")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and(warp::query::<HashMap<String, String>>())
        .and(remote_user())
        .and(warp::body::bytes())
        .map(
            move |ctx: Arc<Context>,
                  query: HashMap<String, String>,
                  user: Option<String>,
                  body: bytes::Bytes| {
                log_remote_user("/sql", user.as_deref());
                let format = parse_format(&query).unwrap_or_default();
                let result = (|| -> Result<catalog::SqlResultSet, Error> {
                    if !config.expose_sql {
                        return Err(Error::SqlDisabled);
                    }
                    if !config.is_authorized(user.as_deref()) {
                        return Err(Error::InvalidRequest(
                            "/sql requires a super-user".into(),
                        ));
                    }
                    let SqlQuery { query: sql } =
                        format::decode(format, &body).map_err(Error::InvalidRequest)?;
                    Ok(ctx.query_raw(&sql)?)
                })();
                respond(format, result)
            },
        )
}
