#![forbid(unsafe_code)]

//! Real-time single-threaded host.
//!
//! [`EventLoop`] reads the wall clock for [`Clock::now`] and schedules timers
//! against a monotonic [`Instant`] origin, so wall-clock steps never make a
//! timer fire early or late. The loop is driven by the caller: nothing runs
//! until [`EventLoop::turn`], [`EventLoop::run_for`] or
//! [`EventLoop::run_until_idle`] is called on the owning thread.
//!
//! An interval that falls behind (slow callback, suspended process) fires
//! once and resumes at its next period boundary; missed slots are dropped.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use synclock_core::{Clock, TimeValue, TimerCallback, TimerHandle, TimerHost};
use tracing::trace;

use crate::timer_queue::TimerQueue;

/// Wall-clock host driving timers with `thread::sleep`.
#[derive(Debug)]
pub struct EventLoop {
    origin: Instant,
    timers: RefCell<TimerQueue>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            timers: RefCell::new(TimerQueue::new()),
        }
    }

    /// Monotonic milliseconds since the loop was created.
    fn loop_millis(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Fire every timer that is due right now. Returns how many fired.
    pub fn turn(&self) -> usize {
        let now = self.loop_millis();
        let mut fired_count = 0;
        loop {
            let fired = self.timers.borrow_mut().pop_due_skipping_missed(now);
            let Some(fired) = fired else {
                break;
            };
            trace!(
                timer = fired.handle.as_raw(),
                deadline_ms = fired.deadline_ms,
                late_ms = now - fired.deadline_ms,
                "timer fired"
            );
            (fired.callback)();
            fired_count += 1;
        }
        fired_count
    }

    /// Run timers for `duration`, sleeping between deadlines.
    pub fn run_for(&self, duration: Duration) {
        let end = self
            .loop_millis()
            .saturating_add(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX));
        loop {
            self.turn();
            let now = self.loop_millis();
            if now >= end {
                break;
            }
            let wake = self
                .timers
                .borrow()
                .next_deadline()
                .map_or(end, |deadline| deadline.min(end));
            let nap = u64::try_from(wake.saturating_sub(now)).unwrap_or(0);
            if nap > 0 {
                std::thread::sleep(Duration::from_millis(nap));
            }
        }
    }

    /// Run until no timer is armed. Never returns while an interval is live.
    pub fn run_until_idle(&self) {
        loop {
            self.turn();
            let Some(deadline) = self.timers.borrow().next_deadline() else {
                break;
            };
            let nap = u64::try_from(deadline.saturating_sub(self.loop_millis())).unwrap_or(0);
            if nap > 0 {
                std::thread::sleep(Duration::from_millis(nap));
            }
        }
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Disarm everything.
    pub fn clear(&self) {
        self.timers.borrow_mut().clear();
    }
}

impl Clock for EventLoop {
    fn now(&self) -> TimeValue {
        TimeValue::now()
    }
}

impl TimerHost for EventLoop {
    fn start_timeout(&self, delay_ms: u64, callback: TimerCallback) -> TimerHandle {
        let now = self.loop_millis();
        self.timers.borrow_mut().arm(now, delay_ms, None, callback)
    }

    fn start_interval(&self, period_ms: u64, callback: TimerCallback) -> TimerHandle {
        let now = self.loop_millis();
        self.timers
            .borrow_mut()
            .arm(now, period_ms, Some(period_ms), callback)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers.borrow_mut().cancel(handle);
    }
}
