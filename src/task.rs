// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
//! Shutdown signaling shared between the control surface's tokio runtime and
//! the automation thread, adapted from the source's `ShutdownReceiver`.

use shared::Shutdown;
use tokio::sync::watch;

/// Receiver for the [`Shutdown`] signal, cheaply cloned for every task that
/// needs to observe it.
#[derive(Clone)]
pub struct ShutdownReceiver(watch::Receiver<Option<Shutdown>>);

impl ShutdownReceiver {
    /// Constructs a [`watch::Sender`] / `ShutdownReceiver` pair.
    pub fn new() -> (watch::Sender<Option<Shutdown>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self(rx))
    }

    /// Resolves once [`Shutdown`] has been sent.
    pub async fn wait_for_shutdown(mut self) {
        loop {
            if self.0.borrow().is_some() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}
