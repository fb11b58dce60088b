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
//! Binary crate wiring together the Catalog Store, Player Session,
//! Requirement Engine, Automation Loop, and control surface into one
//! unattended radio-automation process (spec §2, §5).

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

mod config;
mod task;

use shared::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use task::ShutdownReceiver;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    eprintln!("{}", shared::license::WELCOME);

    let config = config::parse_or_exit();

    if config.dbinit {
        match catalog::Store::open(&config.db) {
            Ok(_store) => {
                println!("initialized catalog schema at {}", config.db.display());
                std::process::exit(0);
            }
            Err(err) => {
                eprintln!(
                    "ERROR: failed to initialize {}: {err}",
                    config.db.display()
                );
                std::process::exit(1);
            }
        }
    }

    raise_fd_limit();

    if let Err(err) = run(config) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

/// Raises the process' open-file-descriptor ceiling (spec §5), best-effort:
/// a failure here degrades to the platform default rather than preventing
/// startup.
fn raise_fd_limit() {
    const WANTED: u64 = 4096;
    match rlimit::Resource::NOFILE.get() {
        Ok((_soft, hard)) => {
            let target = WANTED.min(hard);
            if let Err(err) = rlimit::Resource::NOFILE.set(target, hard) {
                tracing::warn!(%err, "setrlimit(RLIMIT_NOFILE) failed, leaving default FD ceiling");
            } else {
                tracing::info!(limit = target, "raised FD ceiling");
            }
        }
        Err(err) => {
            tracing::warn!(%err, "getrlimit(RLIMIT_NOFILE) failed, leaving default FD ceiling");
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum RunError {
    #[error("catalog: {0}")]
    Catalog(#[from] catalog::Error),
    #[error("requirement engine: {0}")]
    Requirements(#[from] requirements::Error),
    #[error("automation context: {0}")]
    Automation(#[from] automation::Error),
    #[error("tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn run(config: config::Config) -> Result<(), RunError> {
    let now = shared::time_now().timestamp();
    let store = catalog::Store::open(&config.db)?;
    let engine = requirements::RequirementEngine::load(config.engine_behavior, &store, now)?;
    let player = player::PlayerSession::new(config.session);
    let registry = automation::default_registry();
    let ctx = Arc::new(automation::Context::new(
        store,
        player,
        engine,
        registry,
        config.loop_behavior,
    )?);

    if config.doinit {
        tracing::info!("running reboot-flagged requirements before serving");
        ctx.run_reboot_requirements();
    }

    let (shutdown_tx, shutdown_rx) = ShutdownReceiver::new();
    let shutdown_flag = install_signal_handlers(Arc::clone(&ctx), shutdown_tx, config.fast_shutdown);

    println!("  - Listening on: {}", config.bind_address);
    println!();

    let automation_handle = launch_automation_thread(Arc::clone(&ctx));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads)
        .enable_all()
        .build()?;
    runtime.block_on(webapi::serve(
        Arc::clone(&ctx),
        config.api,
        config.bind_address,
        shutdown_rx.wait_for_shutdown(),
    ));

    ctx.request_shutdown();
    automation_handle
        .join()
        .expect("automation thread ends without panicking");
    drop(shutdown_flag);

    println!("[main exit]");
    Ok(())
}

/// Runs the Automation Loop on its own dedicated thread (spec §5: one
/// thread drives it, independent of the control surface's worker pool).
fn launch_automation_thread(ctx: Arc<automation::Context>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !ctx.is_shutdown_requested() {
            if let Err(err) = automation::run_once(&ctx) {
                tracing::error!(%err, "automation loop iteration failed");
            }
        }
        println!("automation loop ended");
    })
}

/// Registers `SIGTERM`/`SIGINT`/`SIGUSR1` to request shutdown, and ignores
/// `SIGPIPE` (spec §5). If `fast_shutdown` is set, a watcher thread exits
/// the process as soon as a signal lands rather than waiting for the
/// automation loop and control surface to wind down between tracks.
fn install_signal_handlers(
    ctx: Arc<automation::Context>,
    shutdown_tx: tokio::sync::watch::Sender<Option<Shutdown>>,
    fast_shutdown: bool,
) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGUSR1,
    ] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&flag)) {
            tracing::warn!(signal, %err, "failed to register shutdown signal");
        }
    }
    let sigpipe_ignore = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGPIPE, sigpipe_ignore) {
        tracing::warn!(%err, "failed to ignore SIGPIPE");
    }

    let watcher_flag = Arc::clone(&flag);
    std::thread::spawn(move || loop {
        if watcher_flag.load(Ordering::SeqCst) {
            tracing::warn!("shutdown signal received");
            ctx.request_shutdown();
            let _ = shutdown_tx.send(Some(Shutdown));
            if fast_shutdown {
                std::process::exit(0);
            }
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    });
    flag
}
