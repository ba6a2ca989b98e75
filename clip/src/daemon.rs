//! Polling loop driving the controller
//!
//! Single task: the controller and its provider are `!Send`, so the loop is
//! meant to run on a current-thread runtime or inside a `LocalSet`.

use crate::config::Config;
use crate::controller::ClipboardController;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Daemon {
    controller: ClipboardController,
    interval: Duration,
}

impl Daemon {
    pub fn new(controller: ClipboardController, interval: Duration) -> Self {
        Self { controller, interval }
    }

    pub fn from_config(controller: ClipboardController, config: &Config) -> Self {
        Self::new(controller, config.daemon.refresh_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn controller(&self) -> &ClipboardController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ClipboardController {
        &mut self.controller
    }

    pub fn into_controller(self) -> ClipboardController {
        self.controller
    }

    /// One poll; true when a new clipboard value was accepted
    pub fn tick(&mut self) -> bool {
        self.controller.poll()
    }

    /// Poll every `interval` until `shutdown` fires. Ticks that fall behind are
    /// skipped rather than replayed. Returns the number of accepted values.
    pub async fn run(&mut self, shutdown: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "clipboard daemon started");

        let mut accepted = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.tick() {
                        accepted += 1;
                        debug!(accepted, "recorded clipboard change");
                    }
                }
            }
        }

        info!(accepted, "clipboard daemon stopped");
        accepted
    }
}
