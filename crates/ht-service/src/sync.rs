//! Device sync countdown.
//!
//! Sensors ask `GET /next` how long to sleep before their next post. The
//! server answers from a shared one-second countdown that restarts at the
//! configured refresh rate each time it reaches zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::settings::{DEFAULT_REFRESH_RATE, SettingsStore};

/// Added to the countdown when telling browsers when to refresh, so the page
/// reloads after the sensors have posted.
pub const REFRESH_HINT_PADDING: u32 = 5;

/// Countdown state, advanced once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCountdown {
    remaining: u32,
    rate: u32,
}

impl Default for SyncCountdown {
    fn default() -> Self {
        Self {
            remaining: 0,
            rate: DEFAULT_REFRESH_RATE,
        }
    }
}

impl SyncCountdown {
    /// Seconds until the next sync.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Last known-good refresh rate.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Advance one second. Returns true when the countdown hit zero and
    /// needs [`reload`](Self::reload).
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    /// Restart from the refresh rate. `None` keeps the previous rate.
    pub fn reload(&mut self, rate: Option<u32>) {
        if let Some(rate) = rate {
            self.rate = rate;
        }
        self.remaining = self.rate;
    }
}

/// Shared handle to the countdown.
#[derive(Debug, Clone)]
pub struct SyncTimer {
    remaining: Arc<AtomicU32>,
}

impl Default for SyncTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTimer {
    /// Create a timer reporting the fallback rate until it first runs.
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(AtomicU32::new(DEFAULT_REFRESH_RATE)),
        }
    }

    /// Seconds until devices should post again.
    pub fn seconds_remaining(&self) -> u32 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Seconds until a dashboard should reload.
    pub fn next_refresh_hint(&self) -> u32 {
        self.seconds_remaining() + REFRESH_HINT_PADDING
    }

    /// Drive the countdown until `cancel` fires.
    ///
    /// The refresh rate is re-read from `settings` each time the countdown
    /// reaches zero. A failed read is logged and the last known-good rate is
    /// reused.
    pub async fn run(&self, settings: &SettingsStore, cancel: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut countdown = SyncCountdown::default();

        info!("Sync timer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if countdown.tick() {
                let rate = match settings.refresh_rate().await {
                    Ok(rate) => Some(rate),
                    Err(e) => {
                        warn!(
                            "Failed to read refresh rate, keeping {}s: {}",
                            countdown.rate(),
                            e
                        );
                        None
                    }
                };
                countdown.reload(rate);
                debug!("Sync countdown restarted at {}s", countdown.remaining());
            }

            self.remaining.store(countdown.remaining(), Ordering::Relaxed);
        }

        info!("Sync timer stopped");
    }
}
