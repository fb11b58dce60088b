// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
#![deny(clippy::pedantic)]
#![allow(clippy::bool_to_int_with_if)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Requirement Engine (component C4) and Command Registry (component C5):
//! the time-pattern schedule of Requirements, and the dispatch table that
//! turns a due Requirement into an action.

mod engine;
mod error;
mod registry;
mod requirement;
mod time_spec;

pub use engine::{EngineConfig, RequirementEngine};
pub use error::Error;
pub use registry::{CommandRegistry, Handler};
pub use requirement::{CommandKind, PlayFilesEntry, RawPlayableItem, Requirement, Schedule};
pub use time_spec::TimeSpecification;
