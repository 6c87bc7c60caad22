#![forbid(unsafe_code)]

//! Host capabilities: reading the clock and arming timers.
//!
//! The scheduler never touches global time or timer facilities directly. It
//! receives a [`Clock`] and a [`TimerHost`] at construction, which keeps it
//! deterministic under simulated time.
//!
//! # Host contract
//!
//! - `start_timeout` / `start_interval` never invoke the callback
//!   synchronously; the first invocation happens on a later turn.
//! - `cancel` is total: unknown, already-fired and already-cancelled handles
//!   are ignored, and cancelling from inside a firing callback is allowed.
//! - Callbacks may re-enter the host (start or cancel other timers).

use std::rc::Rc;

use crate::time_value::TimeValue;

/// Callback invoked when a timer fires.
pub type TimerCallback = Rc<dyn Fn()>;

/// Opaque handle to an armed timer, minted by a [`TimerHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a host-specific timer id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Source of "now".
pub trait Clock {
    fn now(&self) -> TimeValue;
}

/// One-shot and periodic timers on a single-threaded event loop.
pub trait TimerHost {
    /// Fire `callback` once, `delay_ms` from now.
    fn start_timeout(&self, delay_ms: u64, callback: TimerCallback) -> TimerHandle;

    /// Fire `callback` every `period_ms`, first after one full period.
    fn start_interval(&self, period_ms: u64, callback: TimerCallback) -> TimerHandle;

    /// Disarm a timer. Total; see the module docs.
    fn cancel(&self, handle: TimerHandle);
}

/// The host wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeValue {
        TimeValue::now()
    }
}
