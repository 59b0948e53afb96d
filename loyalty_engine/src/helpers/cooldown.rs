use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use tokio::time::{sleep_until, Instant};

/// Cooldowns longer than this are cut short. It is far enough away to mean "until restarted".
const MAX_COOLDOWN: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// A shared "stop talking to the oracle until T" flag.
///
/// When the accrual system signals overload, every unit of work should pause, not just the one that was told. Any
/// clone of a `Cooldown` can trigger it, and every clone observes it.
#[derive(Clone, Debug, Default)]
pub struct Cooldown {
    until: Arc<Mutex<Option<Instant>>>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a cooldown lasting `duration` from now. An active cooldown is extended if the new deadline is later,
    /// and is never shortened. Durations beyond [`MAX_COOLDOWN`] are clamped, so any duration is safe to pass.
    pub fn trigger(&self, duration: Duration) {
        let duration = duration.min(MAX_COOLDOWN);
        let Some(deadline) = Instant::now().checked_add(duration) else {
            error!("🏅️ Cannot represent a cooldown of {duration:?} on this platform. Ignoring it");
            return;
        };
        let Ok(mut until) = self.until.lock() else {
            error!("🏅️ Cooldown lock is poisoned. Cannot start a cooldown");
            return;
        };
        match *until {
            Some(current) if current >= deadline => {},
            _ => {
                debug!("🏅️ Cooldown triggered for {duration:?}");
                *until = Some(deadline);
            },
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.until.lock().ok().and_then(|until| *until).filter(|d| *d > Instant::now())
    }

    pub fn is_active(&self) -> bool {
        self.deadline().is_some()
    }

    /// How long until the cooldown lifts. Zero if it is not active.
    pub fn remaining(&self) -> Duration {
        self.deadline().map(|d| d.saturating_duration_since(Instant::now())).unwrap_or_default()
    }

    /// Waits until no cooldown is active. Returns immediately if there is none. If the cooldown is extended while
    /// waiting, the wait is extended too.
    pub async fn wait(&self) {
        while let Some(deadline) = self.deadline() {
            sleep_until(deadline).await;
        }
    }
}
