// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
//! Parses command-line arguments (spec §6 configuration table).

use clap::Parser;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fully validated configuration, assembled from [`RawArgs`].
pub struct Config {
    /// Path to the `SQLite` catalog file.
    pub db: PathBuf,
    /// If set, create the schema at `db` and exit without serving.
    pub dbinit: bool,
    /// Automation Loop behavior.
    pub loop_behavior: automation::LoopConfig,
    /// Requirement Engine behavior.
    pub engine_behavior: requirements::EngineConfig,
    /// Media subprocess session behavior.
    pub session: player::SessionConfig,
    /// Run every `reboot=true` requirement once before serving (spec §6 `doinit`).
    pub doinit: bool,
    /// Exit immediately on shutdown signal instead of between tracks.
    pub fast_shutdown: bool,
    /// Control-surface bind address.
    pub bind_address: SocketAddr,
    /// Control-surface worker thread count (spec §5: default 8).
    pub threads: usize,
    /// Control-surface access configuration.
    pub api: webapi::ApiConfig,
}

// Each bool is an independent command-line switch (spec §6's configuration
// table); bundling them into enums would not reduce the surface this mirrors.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser)]
#[clap(version)]
#[clap(about = "Unattended radio-automation engine: schedule-driven playout with catalog fallback")]
struct RawArgs {
    /// Path to the `SQLite` catalog file.
    #[clap(long, env = "RADIO_DB", default_value = "radio.sqlite3")]
    db: String,
    /// Create the schema at `db` and exit without serving.
    #[clap(long)]
    dbinit: bool,
    /// Name of the bumpers playlist (empty means the synthetic superlist).
    #[clap(long, env = "RADIO_BUMPERS", default_value = "")]
    bumpers: String,
    /// Legal-id playlist name.
    #[clap(long, env = "RADIO_LEGALID", default_value = "legalid")]
    legalid: String,
    /// Longest legal-id item considered playable, in seconds.
    #[clap(long, env = "RADIO_LEGALID_MAX_LENGTH", default_value_t = 60)]
    legalid_max_length: i64,
    /// Seconds threshold above which the loop rotates main show instead of using bumpers.
    #[clap(long, env = "RADIO_BUMPERCUTOFF", default_value_t = 200)]
    bumpercutoff: i64,
    /// Max deliberately generated dead air, in seconds.
    #[clap(long, env = "RADIO_SLEEPCUTOFF", default_value_t = 4)]
    sleepcutoff: i64,
    /// Auto-insert a top-of-hour `LEGAL_ID` requirement.
    #[clap(long)]
    implicit_legalid: bool,
    /// Gap (seconds) used by the auto-inserted `LEGAL_ID` requirement.
    #[clap(long, default_value_t = 180)]
    implicit_legalid_gap: i64,
    /// Start in manual-override mode.
    #[clap(long)]
    defaulthuman: bool,
    /// At startup, run all `reboot=true` requirements before serving.
    #[clap(long)]
    doinit: bool,
    /// On shutdown signal, exit immediately rather than between tracks.
    #[clap(long)]
    fast_shutdown: bool,
    /// Media subprocess binary.
    #[clap(long, env = "RADIO_MPLAYER", default_value = "mplayer")]
    mplayer: String,
    /// Media subprocess liveness timeout, in seconds.
    #[clap(long, default_value_t = 6)]
    mplayertimeout: u64,
    /// Path the media subprocess's stderr is redirected to.
    #[clap(long, default_value = "/dev/null")]
    mplayer_errorlog: String,
    /// Address and port to bind the control surface.
    #[clap(short = 'b', long, env = "RADIO_BIND_ADDRESS", default_value = "127.0.0.1:8090")]
    bind_address: String,
    /// Control-surface worker thread count.
    #[clap(long, default_value_t = 8)]
    threads: usize,
    /// Exposes the `/sql` resource.
    #[clap(long)]
    expose_sql: bool,
    /// Remote-user identities authorized for destructive control-surface operations.
    #[clap(long = "super-user")]
    super_users: Vec<String>,
}

/// Parses `argv`, exiting the process with a usage message on failure.
#[must_use]
pub fn parse_or_exit() -> Config {
    use clap::CommandFactory;
    let raw_args = RawArgs::parse();
    match Config::try_from(raw_args) {
        Ok(config) => config,
        Err(message) => {
            let usage = RawArgs::command().render_usage();
            eprintln!("{usage}");
            eprintln!();
            eprintln!("ERROR: {message}");
            std::process::exit(1)
        }
    }
}

impl TryFrom<RawArgs> for Config {
    type Error = String;

    fn try_from(raw: RawArgs) -> Result<Self, Self::Error> {
        let bind_address = SocketAddr::from_str(&raw.bind_address)
            .map_err(|err| format!("{err} (bind address argument \"{}\")", raw.bind_address))?;
        let super_users: HashSet<String> = raw.super_users.into_iter().collect();

        let loop_config = automation::LoopConfig {
            defaulthuman: raw.defaulthuman,
            bumpercutoff: raw.bumpercutoff,
            sleepcutoff: raw.sleepcutoff,
            bumpers: raw.bumpers,
            legalid: raw.legalid,
            legalid_max_length: raw.legalid_max_length,
        };
        let engine_config = requirements::EngineConfig {
            implicit_legalid: raw.implicit_legalid,
            implicit_legalid_gap: raw.implicit_legalid_gap,
        };
        let session_config = player::SessionConfig {
            player_path: raw.mplayer,
            timeout: Duration::from_secs(raw.mplayertimeout),
            errorlog_path: PathBuf::from(raw.mplayer_errorlog),
        };
        let api_config = webapi::ApiConfig {
            expose_sql: raw.expose_sql,
            super_users,
        };

        Ok(Self {
            db: PathBuf::from(raw.db),
            dbinit: raw.dbinit,
            loop_behavior: loop_config,
            engine_behavior: engine_config,
            session: session_config,
            doinit: raw.doinit,
            fast_shutdown: raw.fast_shutdown,
            bind_address,
            threads: raw.threads,
            api: api_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::RawArgs;

    #[test]
    fn cli_args() {
        use clap::CommandFactory;
        RawArgs::command().debug_assert();
    }
}
