// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
#![deny(clippy::pedantic)]
#![allow(clippy::bool_to_int_with_if)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unsafe_code)]
//! Player Session (component C3): supervises one external media-player
//! subprocess at a time, driven over its `-slave` control pipe.
//!
//! This is the one crate in the workspace that needs raw syscalls: marking
//! the hand-rolled slave pipe close-on-exec, arranging `PR_SET_PDEATHSIG` so
//! an orphaned subprocess cannot outlive us, and `setpgid` so the whole
//! child process group can be signalled at once.

mod error;
mod request;
mod session;
mod state;

pub use error::Error;
pub use request::PlayRequest;
pub use session::{PlayerSession, SessionConfig};
pub use state::{Phase, PlayerState};
