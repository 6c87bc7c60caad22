#![forbid(unsafe_code)]

//! Deterministic simulated host.
//!
//! [`VirtualTime`] implements both [`Clock`] and [`TimerHost`] over a virtual
//! millisecond counter. Time only moves when [`VirtualTime::advance`] (or
//! [`VirtualTime::advance_to`]) is called; every timer due in the advanced
//! window fires in deadline order, and each callback observes the clock at
//! exactly its own deadline.
//!
//! ```ignore
//! let host = Rc::new(VirtualTime::starting_at(TimeValue::from_millis(0)?));
//! let scheduler = SyncScheduler::new(SchedulerConfig::default(), host.clone(), host.clone())?;
//! let _sub = scheduler.subscribe_fn(Cadence::every(1000)?, |tv| println!("{tv}"));
//! host.advance(3_000); // three ticks
//! ```

use std::cell::RefCell;

use synclock_core::{Clock, TimeValue, TimerCallback, TimerHandle, TimerHost};
use tracing::trace;

use crate::timer_queue::TimerQueue;

#[derive(Debug)]
struct VirtualState {
    now_ms: i64,
    timers: TimerQueue,
    fired: u64,
}

/// Simulated clock and timer host.
#[derive(Debug)]
pub struct VirtualTime {
    state: RefCell<VirtualState>,
}

impl VirtualTime {
    /// A host whose clock reads `start`.
    #[must_use]
    pub fn starting_at(start: TimeValue) -> Self {
        Self {
            state: RefCell::new(VirtualState {
                now_ms: start.timestamp_millis(),
                timers: TimerQueue::new(),
                fired: 0,
            }),
        }
    }

    /// Current virtual time in milliseconds since the epoch.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.state.borrow().now_ms
    }

    /// Move time forward by `ms`, firing due timers along the way.
    pub fn advance(&self, ms: u64) {
        let target = self
            .now_millis()
            .saturating_add(i64::try_from(ms).unwrap_or(i64::MAX));
        self.advance_to(target);
    }

    /// Move time forward to `target_ms`, firing due timers along the way.
    /// A target in the past fires nothing and leaves the clock unchanged.
    pub fn advance_to(&self, target_ms: i64) {
        loop {
            // The borrow must end before the callback runs: callbacks re-enter
            // the host to arm and cancel timers.
            let fired = {
                let mut state = self.state.borrow_mut();
                let Some(fired) = state.timers.pop_due(target_ms) else {
                    break;
                };
                state.now_ms = state.now_ms.max(fired.deadline_ms);
                state.fired += 1;
                fired
            };
            trace!(
                timer = fired.handle.as_raw(),
                deadline_ms = fired.deadline_ms,
                "virtual timer fired"
            );
            (fired.callback)();
        }
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.max(target_ms);
    }

    /// Set the clock without firing anything, simulating a wall-clock step
    /// (forwards or backwards). Armed deadlines are not moved.
    pub fn jump_to(&self, ms: i64) {
        self.state.borrow_mut().now_ms = ms;
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Deadline of the earliest armed timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<i64> {
        self.state.borrow().timers.next_deadline()
    }

    /// Total timer firings so far.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.state.borrow().fired
    }
}

impl Clock for VirtualTime {
    fn now(&self) -> TimeValue {
        TimeValue::saturating_from_millis(self.now_millis())
    }
}

impl TimerHost for VirtualTime {
    fn start_timeout(&self, delay_ms: u64, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let now = state.now_ms;
        state.timers.arm(now, delay_ms, None, callback)
    }

    fn start_interval(&self, period_ms: u64, callback: TimerCallback) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let now = state.now_ms;
        state.timers.arm(now, period_ms, Some(period_ms), callback)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.state.borrow_mut().timers.cancel(handle);
    }
}
