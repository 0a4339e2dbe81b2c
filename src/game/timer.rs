//! Session countdown.
//!
//! [`Countdown`] is the pure clock state owned by the engine. [`SessionTimer`]
//! is the ticker task the controller runs while a game is `playing`; it only
//! emits ticks, the engine decides what they mean.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Tick period of the session clock.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Remaining and elapsed seconds of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// Seconds remaining; saturates at zero.
    pub time_left: u32,
    /// Seconds elapsed; counts every tick, independent of `time_left`.
    pub time_spent: u32,
}

impl Countdown {
    /// Start a countdown of `duration_secs`.
    pub fn new(duration_secs: u32) -> Self {
        Self {
            time_left: duration_secs,
            time_spent: 0,
        }
    }

    /// Advance one second. Returns true when time has run out.
    pub fn tick(&mut self) -> bool {
        self.time_spent = self.time_spent.saturating_add(1);
        self.time_left = self.time_left.saturating_sub(1);
        self.is_expired()
    }

    /// True once `time_left` reached zero.
    pub fn is_expired(&self) -> bool {
        self.time_left == 0
    }
}

/// Background task calling `on_tick` once per [`TICK_PERIOD`].
///
/// The first tick fires one period after start. Dropping the timer stops it.
#[derive(Debug)]
pub struct SessionTimer {
    handle: JoinHandle<()>,
}

impl SessionTimer {
    /// Start ticking. `on_tick` returns false to stop the timer from inside.
    pub fn start<F>(on_tick: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !on_tick() {
                    debug!("Session timer stopped by its owner");
                    break;
                }
            }
        });

        Self { handle }
    }

    /// Stop ticking immediately.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// True once the ticker task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_countdown_tracks_time_spent_past_zero() {
        let mut countdown = Countdown::new(2);
        assert!(!countdown.tick());
        assert!(countdown.tick());
        assert!(countdown.tick());
        assert_eq!(countdown.time_left, 0);
        assert_eq!(countdown.time_spent, 3);
    }

    #[test]
    fn test_zero_length_countdown_is_expired() {
        assert!(Countdown::new(0).is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_once_per_second() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let timer = SessionTimer::start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        timer.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_when_callback_declines() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let timer = SessionTimer::start(move || counter.fetch_add(1, Ordering::SeqCst) < 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(timer.is_finished());
    }
}
