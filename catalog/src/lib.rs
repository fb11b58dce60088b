// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
#![deny(clippy::pedantic)]
#![allow(clippy::bool_to_int_with_if)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Durable catalog: playable items, playlists, and schedule-blob storage
//! (component C1).
//!
//! Backed by `rusqlite`. A `PlaylistView` never writes through to the
//! backing store on its own; callers persist explicitly via [`Store`].

mod error;
mod item;
mod playlist;
mod store;

pub use error::Error;
pub use item::{ItemType, PlayableItem};
pub use playlist::{MergeRequest, Playlist, PlaylistSummary, PlaylistView};
pub use store::{SqlResultSet, Store};
