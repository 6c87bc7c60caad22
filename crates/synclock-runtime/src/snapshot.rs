#![forbid(unsafe_code)]

//! Published scheduler state.
//!
//! A [`Snapshot`] is immutable and replaced wholesale. The scheduler hands out
//! `Rc<Snapshot>`, and the same allocation is returned by every read until the
//! next observable change (subscriber count, value, disposal). Readers may
//! compare snapshots with `Rc::ptr_eq` to detect change without inspecting
//! fields.

use std::rc::Rc;

use synclock_core::TimeValue;

/// Immutable view of scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Snapshot {
    value: Rc<TimeValue>,
    subscriber_count: usize,
    frozen: bool,
    disposed: bool,
    minimum_cadence_ms: u64,
    allow_duplicate_callback_invocation: bool,
}

impl Snapshot {
    pub(crate) fn new(
        value: Rc<TimeValue>,
        subscriber_count: usize,
        frozen: bool,
        disposed: bool,
        minimum_cadence_ms: u64,
        allow_duplicate_callback_invocation: bool,
    ) -> Self {
        Self {
            value,
            subscriber_count,
            frozen,
            disposed,
            minimum_cadence_ms,
            allow_duplicate_callback_invocation,
        }
    }

    /// The current time value. Same allocation subscribers received in the
    /// last dispatch round.
    #[must_use]
    pub fn value(&self) -> &Rc<TimeValue> {
        &self.value
    }

    /// Live subscriptions (registrations, not distinct callbacks).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn minimum_cadence_ms(&self) -> u64 {
        self.minimum_cadence_ms
    }

    #[must_use]
    pub fn allows_duplicate_callback_invocation(&self) -> bool {
        self.allow_duplicate_callback_invocation
    }
}
