//! Server clock and time sync broadcaster
//!
//! The server is the only source of truth for epoch time. Listeners derive
//! their offset from the `timesync` events published here; no round trip or
//! latency compensation is attempted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radiosync_common::events::{EventBus, RadioEvent};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Source of epoch milliseconds
pub trait EpochClock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl EpochClock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        radiosync_common::time::now_epoch_ms()
    }
}

/// Clock that only moves when told to
///
/// Used to pin start instants in tests while tokio's paused time drives timers.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl EpochClock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Periodically publishes the server's epoch time to every observer
pub struct TimesyncBroadcaster {
    clock: Arc<dyn EpochClock>,
    events: EventBus,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimesyncBroadcaster {
    pub fn new(clock: Arc<dyn EpochClock>, events: EventBus, interval: Duration) -> Self {
        Self {
            clock,
            events,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Start broadcasting; the first sample goes out one interval from now
    ///
    /// Calling `start` while already running restarts the schedule.
    pub fn start(&self) {
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let server_epoch_ms = clock.now_epoch_ms();
                debug!("timesync {}", server_epoch_ms);
                events.emit_lossy(RadioEvent::TimeSync { server_epoch_ms });
            }
        });

        if let Some(previous) = self.lock_task().replace(handle) {
            previous.abort();
        }
        info!("Timesync broadcaster started, interval: {:?}", period);
    }

    /// Stop broadcasting
    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            info!("Timesync broadcaster stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TimesyncBroadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_epoch_ms(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_epoch_ms(), 1_250);
        clock.set(5);
        assert_eq!(clock.now_epoch_ms(), 5);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // After 2020-01-01
        assert!(SystemClock.now_epoch_ms() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcasts_server_time_every_interval() {
        let clock = Arc::new(ManualClock::new(42_000));
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let broadcaster = TimesyncBroadcaster::new(clock.clone(), bus, Duration::from_secs(5));

        let started = Instant::now();
        broadcaster.start();
        assert!(broadcaster.is_running());

        let first = rx.recv().await.unwrap();
        assert_eq!(first, RadioEvent::TimeSync { server_epoch_ms: 42_000 });
        assert!(started.elapsed() >= Duration::from_secs(5));

        clock.advance(5_000);
        let second = rx.recv().await.unwrap();
        assert_eq!(second, RadioEvent::TimeSync { server_epoch_ms: 47_000 });
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_broadcasts() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let broadcaster =
            TimesyncBroadcaster::new(Arc::new(ManualClock::new(0)), bus, Duration::from_secs(5));

        broadcaster.start();
        broadcaster.stop();
        assert!(!broadcaster.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
