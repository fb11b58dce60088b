// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
#![deny(clippy::pedantic)]
#![allow(clippy::bool_to_int_with_if)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Automation Loop (component C6) and Shared State (component C7): drives
//! the Player Session from whatever the Requirement Engine and the three
//! session-lifetime playlists (override, mainshow, bumpers) say is next.

mod actions;
mod context;
mod error;
mod run_once;

pub use actions::default_registry;
pub use context::{Context, LoopConfig};
pub use error::Error;
pub use run_once::run_once;
