//! Scheduler loop driving periodic revalidation.

use super::AsyncCache;
use std::time::Duration;

/// Cadence of the scan over cache entries. Per-entry refresh cadence comes
/// from each entry's `refresh_interval`; this only bounds how quickly a
/// newly-due entry is noticed.
pub const TICK_INTERVAL: Duration = Duration::from_millis(150);

impl AsyncCache {
    /// Drive the refresh scheduler until the future is dropped.
    ///
    /// One recurring tick scans all entries — no per-entry timers.
    /// `subscribe` and `refresh` wake the loop early so a forced fetch does
    /// not wait out a full tick. A fetch that fails only marks its own entry;
    /// the loop itself never stops.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shared.wake.notified() => {}
            }
            self.tick();
        }
    }
}
