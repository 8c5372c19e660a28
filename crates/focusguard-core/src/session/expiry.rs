//! End-of-session scheduling.
//!
//! A bounded session has two completions: a tokio task sleeping until the
//! end time, and a durable host alarm that survives the process being
//! suspended. Whichever arrives first does the work; the debounce window
//! swallows the other.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::host::{AlarmHost, AlarmSchedule};

/// Durable alarm for the end of a bounded session. Repeats after its first
/// fire and doubles as the periodic cap check.
pub const TIMER_ALARM: &str = "focusguard-timer";

/// Durable alarm driving heartbeat ticks while blocking is on.
pub const HEARTBEAT_ALARM: &str = "focusguard-heartbeat";

pub struct ExpiryScheduler {
    alarms: Arc<dyn AlarmHost>,
    timer: Mutex<Option<JoinHandle<()>>>,
    last_fired_ms: Mutex<Option<i64>>,
    debounce_ms: i64,
    check_period_minutes: u32,
    heartbeat_period_minutes: u32,
}

impl ExpiryScheduler {
    pub fn new(alarms: Arc<dyn AlarmHost>) -> Self {
        Self {
            alarms,
            timer: Mutex::new(None),
            last_fired_ms: Mutex::new(None),
            debounce_ms: 5_000,
            check_period_minutes: 1,
            heartbeat_period_minutes: 1,
        }
    }

    pub fn with_periods(
        mut self,
        debounce: Duration,
        check_period_minutes: u32,
        heartbeat_period_minutes: u32,
    ) -> Self {
        self.debounce_ms = i64::try_from(debounce.as_millis()).unwrap_or(i64::MAX);
        self.check_period_minutes = check_period_minutes.max(1);
        self.heartbeat_period_minutes = heartbeat_period_minutes.max(1);
        self
    }

    /// Arm both completions for a session ending at `end_ms`, replacing any
    /// earlier schedule. `on_fire` runs on its own task once the in-process
    /// timer elapses, so cancelling from inside it is safe.
    pub fn schedule<F>(&self, end_ms: i64, now_ms: i64, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let delay = Duration::from_millis(u64::try_from(end_ms - now_ms).unwrap_or(0));
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(on_fire);
        });
        *self.lock_timer() = Some(handle);

        self.alarms.create(
            TIMER_ALARM,
            AlarmSchedule {
                when_ms: Some(end_ms),
                period_minutes: Some(self.check_period_minutes),
            },
        );
        debug!(end_ms, delay_ms = delay.as_millis() as u64, "expiry scheduled");
    }

    /// Drop both completions.
    pub fn cancel(&self) {
        self.stop_timer();
        if self.alarms.clear(TIMER_ALARM) {
            debug!("expiry alarm cleared");
        }
    }

    /// Drop only the in-process timer, leaving the durable alarm to wake a
    /// later process.
    pub fn stop_timer(&self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
        }
    }

    /// Whether the in-process timer is still pending.
    pub fn is_scheduled(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Claim the right to run expiry at `now_ms`. Returns `false` when an
    /// expiry already ran inside the debounce window.
    pub fn claim(&self, now_ms: i64) -> bool {
        let mut last = self
            .last_fired_ms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = *last {
            if now_ms >= prev && now_ms - prev < self.debounce_ms {
                debug!(since_ms = now_ms - prev, "duplicate expiry suppressed");
                return false;
            }
        }
        *last = Some(now_ms);
        true
    }

    pub fn arm_heartbeat(&self) {
        self.alarms.create(
            HEARTBEAT_ALARM,
            AlarmSchedule {
                when_ms: None,
                period_minutes: Some(self.heartbeat_period_minutes),
            },
        );
    }

    pub fn disarm_heartbeat(&self) {
        self.alarms.clear(HEARTBEAT_ALARM);
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
