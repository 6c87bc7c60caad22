#![forbid(unsafe_code)]

//! Deadline-ordered timer storage shared by the bundled hosts.
//!
//! Entries live in a `BTreeMap` keyed by `(deadline_ms, id)`, so the earliest
//! deadline is always the first key and equal deadlines fire in creation
//! order. The queue never runs callbacks itself: [`TimerQueue::pop_due`] hands
//! the next due callback to the host, which invokes it after releasing any
//! borrow on the queue. Periodic timers are re-armed *before* they are handed
//! out, so a callback that cancels its own interval finds it still queued and
//! removes it.

use std::collections::{BTreeMap, HashMap};

use synclock_core::{TimerCallback, TimerHandle};

struct Armed {
    period_ms: Option<u64>,
    callback: TimerCallback,
}

/// A timer that has come due.
pub(crate) struct Fired {
    pub(crate) handle: TimerHandle,
    pub(crate) deadline_ms: i64,
    pub(crate) callback: TimerCallback,
}

#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    queue: BTreeMap<(i64, u64), Armed>,
    deadlines: HashMap<u64, i64>,
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("armed", &self.queue.len())
            .field("next_deadline_ms", &self.next_deadline())
            .finish()
    }
}

fn offset(from_ms: i64, delay_ms: u64) -> i64 {
    from_ms.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX))
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arm a timer `delay_ms` after `now_ms`. With `period_ms`, it re-arms
    /// every period after each firing.
    pub(crate) fn arm(
        &mut self,
        now_ms: i64,
        delay_ms: u64,
        period_ms: Option<u64>,
        callback: TimerCallback,
    ) -> TimerHandle {
        self.next_id += 1;
        let id = self.next_id;
        let deadline = offset(now_ms, delay_ms);
        self.queue.insert(
            (deadline, id),
            Armed {
                // A zero period would re-fire forever within one advance.
                period_ms: period_ms.map(|p| p.max(1)),
                callback,
            },
        );
        self.deadlines.insert(id, deadline);
        TimerHandle::from_raw(id)
    }

    /// Disarm a timer. Returns `false` if it was not armed.
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        let id = handle.as_raw();
        match self.deadlines.remove(&id) {
            Some(deadline) => self.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<i64> {
        self.queue.first_key_value().map(|(&(deadline, _), _)| deadline)
    }

    /// Remove the earliest timer due at or before `now_ms`. A periodic timer
    /// is re-armed one period after its deadline, so every slot in an
    /// advanced window fires.
    pub(crate) fn pop_due(&mut self, now_ms: i64) -> Option<Fired> {
        self.pop(now_ms, false)
    }

    /// Like [`Self::pop_due`], but a late periodic timer is re-armed at the
    /// first slot after `now_ms`. Missed slots are dropped and the phase is
    /// kept.
    pub(crate) fn pop_due_skipping_missed(&mut self, now_ms: i64) -> Option<Fired> {
        self.pop(now_ms, true)
    }

    fn pop(&mut self, now_ms: i64, skip_missed: bool) -> Option<Fired> {
        let (&(deadline, id), _) = self.queue.first_key_value()?;
        if deadline > now_ms {
            return None;
        }
        let armed = self.queue.remove(&(deadline, id))?;
        let callback = armed.callback.clone();
        match armed.period_ms {
            Some(period) => {
                let mut next = offset(deadline, period);
                if skip_missed && next <= now_ms {
                    let period = i64::try_from(period).unwrap_or(i64::MAX);
                    let missed = (now_ms - next) / period + 1;
                    next = next.saturating_add(missed.saturating_mul(period));
                }
                self.queue.insert((next, id), armed);
                self.deadlines.insert(id, next);
            }
            None => {
                self.deadlines.remove(&id);
            }
        }
        Some(Fired {
            handle: TimerHandle::from_raw(id),
            deadline_ms: deadline,
            callback,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}
