// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
#![deny(clippy::pedantic)]
#![allow(clippy::bool_to_int_with_if)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Remote control surface (spec §6): the one external-collaborator piece
//! the core spec names but treats as out of scope for the core subsystems
//! themselves. Exposes the Automation Loop's [`automation::Context`] over
//! HTTP with `warp`, the way `soundbox-ii::web` exposes its `vlc_http`
//! controller.
//!
//! No protobuf toolchain is introduced for the `pb` format (wire formats
//! are explicitly out of scope per spec §1): `pb` is served as `bincode`
//! bytes of the same `serde`-derived message types `json` uses.

mod error;
mod filter;
mod format;
mod messages;

pub use error::Error;
pub use messages::{PlayerStateMessage, PlaylistFetchQuery, PlaylistUpdateQuery};

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

/// Control-surface-specific configuration, separate from
/// [`automation::LoopConfig`] since it governs access, not playout
/// behavior.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Gates the `/sql` resource (spec §6); `false` is a safer default than
    /// the source's always-on `FLAGS_expose_sql`.
    pub expose_sql: bool,
    /// Remote-user identities (spec §6: carried by the transport, e.g. a
    /// certificate subject) permitted to perform destructive operations
    /// (`/requirements/update`, `/sql`). Empty means nobody is authorized.
    pub super_users: HashSet<String>,
}
impl ApiConfig {
    /// `true` if `remote_user` is present and listed in [`ApiConfig::super_users`].
    #[must_use]
    pub fn is_authorized(&self, remote_user: Option<&str>) -> bool {
        remote_user.is_some_and(|user| self.super_users.contains(user))
    }
}

/// Binds and serves the control surface at `bind_address` until
/// `shutdown` resolves.
pub async fn serve(
    ctx: Arc<automation::Context>,
    config: ApiConfig,
    bind_address: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) {
    use warp::Filter;

    let routes = filter::routes(ctx, config).with(warp::trace::request());
    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(bind_address, shutdown);
    tracing::info!(%addr, "control surface listening");
    server.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation::{Context, LoopConfig};
    use catalog::{ItemType, PlayableItem, Store};
    use player::{PlayerSession, SessionConfig};
    use requirements::{EngineConfig, RequirementEngine, Schedule};

    fn test_context() -> Arc<Context> {
        let store = Store::open_in_memory().expect("open");
        let item = PlayableItem::new("a.mp3", ItemType::Local);
        store.insert_item(&item).expect("insert");
        let engine = RequirementEngine::new(EngineConfig::default(), Schedule::default(), 0);
        let registry = automation::default_registry();
        let player = PlayerSession::new(SessionConfig {
            player_path: "false".into(),
            ..SessionConfig::default()
        });
        Arc::new(
            Context::new(store, player, engine, registry, LoopConfig::default()).expect("ctx"),
        )
    }

    #[tokio::test]
    async fn override_enable_is_reachable_and_acknowledged() {
        let ctx = test_context();
        let routes = filter::routes(ctx.clone(), ApiConfig::default());
        let resp = warp::test::request()
            .method("POST")
            .path("/override/enable")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), warp::http::StatusCode::OK);
        assert!(ctx.manual_override());
    }

    #[tokio::test]
    async fn playlist_all_returns_json_array() {
        let ctx = test_context();
        let routes = filter::routes(ctx, ApiConfig::default());
        let resp = warp::test::request()
            .method("POST")
            .path("/playlist/all")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), warp::http::StatusCode::OK);
        let body: Vec<catalog::PlaylistSummary> =
            serde_json::from_slice(resp.body()).expect("valid json array");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn sql_is_forbidden_when_not_exposed() {
        let ctx = test_context();
        let routes = filter::routes(ctx, ApiConfig::default());
        let resp = warp::test::request()
            .method("POST")
            .path("/sql")
            .body(
                serde_json::to_vec(&messages::SqlQuery {
                    query: "SELECT 1".into(),
                })
                .expect("ser"),
            )
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), warp::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn requirements_update_rejects_unauthorized_caller() {
        let ctx = test_context();
        let routes = filter::routes(ctx, ApiConfig::default());
        let schedule = requirements::Schedule::default();
        let resp = warp::test::request()
            .method("POST")
            .path("/requirements/update")
            .body(serde_json::to_vec(&schedule).expect("ser"))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), warp::http::StatusCode::BAD_REQUEST);
    }
}
