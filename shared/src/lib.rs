// radio-automation/shared: common types used across the engine's crates
// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
//! Types and utilities shared across the automation engine's crates.

// teach me
#![deny(clippy::pedantic)]
// no unsafe
#![forbid(unsafe_code)]
// no unwrap
#![deny(clippy::unwrap_used)]
// no panic
#![deny(clippy::panic)]
// docs!
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod license;

/// Constructs an enum of single-variant wrapper types, generating `From` impls for each.
#[macro_export]
macro_rules! wrapper_enum {
    (
        $(
            $(#[$meta:meta])*
            $vis:vis enum $name:ident {
                $(
                    $(#[$item_meta:meta])*
                    $variant:ident $( ( $inner:ty ) )?
                ),+ $(,)?
                $(
                    { impl None for }
                    $(
                        $(#[$item_simple_meta:meta])*
                        $simple_variant:ident $( ( $($simple_ty:ty),+ ) )?
                    ),+ $(,)?
                )?
            }
        )+
    ) => {
        $(
            $(#[$meta])*
            $vis enum $name {
                $(
                    $(#[$item_meta])*
                    $variant $( ( $inner ) )?
                ),+
                $(
                    ,
                    $(
                        $(#[$item_simple_meta])*
                        $simple_variant $( ( $($simple_ty),+ ) )?
                    ),+
                )?
            }
            $(
                $( impl From<$inner> for $name {
                    fn from(other: $inner) -> Self {
                        $name::$variant(other)
                    }
                } )?
            )+
        )+
    };
}

/// Signal that the process should shut down.
#[must_use]
#[derive(Clone, Copy)]
pub struct Shutdown;

/// Un-instantiable type, used where a channel direction never produces an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Never {}
impl std::fmt::Display for Never {
    fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {}
    }
}
/// Extension trait to discharge a [`Never`] error without a panic.
pub trait IgnoreNever<T> {
    /// Like unwrap, but with no panic possible.
    fn ignore_never(self) -> T;
}
impl<T> IgnoreNever<T> for Result<T, Never> {
    fn ignore_never(self) -> T {
        match self {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

/// Wall-clock timestamp, UTC.
pub type Time = chrono::DateTime<chrono::offset::Utc>;
/// Difference between two [`Time`]s.
pub type TimeDifference = chrono::Duration;

/// Current timestamp.
#[must_use]
pub fn time_now() -> Time {
    chrono::Utc::now()
}

/// Timestamp from seconds since the epoch, truncated to whole seconds (useful in tests).
#[must_use]
pub fn time_from_secs(secs: i64) -> Time {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Identity of the caller of a control-surface request, as carried by the transport
/// (e.g. a certificate subject). Opaque to the core; logged for audit purposes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteUser(pub String);
impl std::fmt::Display for RemoteUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire representation requested for a control-surface response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    /// Length-prefixed binary (bincode) of the documented message schema.
    Pb,
    /// The same schema round-tripped through JSON text.
    #[default]
    Json,
    /// Human debug form. Responses only.
    DebugPb,
}
impl std::str::FromStr for ContentFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pb" => Ok(Self::Pb),
            "json" => Ok(Self::Json),
            "debugpb" => Ok(Self::DebugPb),
            other => Err(format!("unknown format {other:?}, expected pb|json|debugpb")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{time_from_secs, ContentFormat};

    #[test]
    fn parses_known_formats() {
        assert_eq!("json".parse(), Ok(ContentFormat::Json));
        assert_eq!("pb".parse(), Ok(ContentFormat::Pb));
        assert_eq!("debugpb".parse(), Ok(ContentFormat::DebugPb));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("xml".parse::<ContentFormat>().is_err());
    }

    #[test]
    fn time_from_secs_is_stable() {
        let t = time_from_secs(1_700_000_000);
        assert_eq!(t.timestamp(), 1_700_000_000);
    }
}
