#![forbid(unsafe_code)]

//! Shared-cadence time scheduler.
//!
//! # Design
//!
//! [`SyncScheduler`] keeps one [`TimeValue`] and one timer for any number of
//! subscribers. Each subscription requests a [`Cadence`]; the timer runs at
//! the fastest live request, and every tick hands the *same* `Rc<TimeValue>`
//! to every subscriber, so consumers never drift out of phase.
//!
//! State lives in `Rc<RefCell<..>>` (single-threaded, cooperative). Timer
//! callbacks hold a `Weak` back-reference. Dispatch follows the
//! collect-then-notify pattern: receivers are collected under the borrow, the
//! borrow is released, then callbacks run. Callbacks may therefore subscribe,
//! cancel, invalidate or dispose re-entrantly.
//!
//! # Retiming
//!
//! When the fastest cadence changes, the timer is reprogrammed relative to
//! the age of the current value (`remaining = cadence - elapsed`):
//!
//! | Condition                 | Action                                         |
//! |---------------------------|------------------------------------------------|
//! | unbounded, frozen, disposed | cancel timer, stay quiescent                 |
//! | `remaining <= 0`          | refresh now, dispatch if due, start interval   |
//! | `remaining >= cadence`    | start interval                                 |
//! | otherwise                 | one-shot bridge of `remaining`, then interval  |
//!
//! The bridge never dispatches; it only re-phases the interval.
//!
//! # Invariants
//!
//! 1. At most one timer handle is live; the old one is cancelled before any
//!    new timer starts.
//! 2. The cached fastest cadence equals a fresh scan of all registrations.
//! 3. A new [`Snapshot`] is allocated only on subscriber count change, value
//!    change, or disposal. Reads in between return the same `Rc`.
//! 4. Frozen and disposed schedulers never start timers, never refresh, and
//!    never dispatch.

use std::cell::{Cell, RefCell};
use std::num::NonZeroU64;
use std::rc::{Rc, Weak};

use synclock_core::{
    Cadence, Clock, NotificationPolicy, SyncError, TimeValue, TimerHandle, TimerHost,
    staleness_threshold_from_f64,
};
use tracing::{debug, debug_span, trace, warn};

use crate::config::SchedulerConfig;
use crate::registry::{CadenceEntry, EntryId, Receiver, SubscriptionRegistry, UpdateCallback};
use crate::snapshot::Snapshot;
use crate::subscription::SubscriptionHandle;

/// Arguments for [`SyncScheduler::invalidate_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvalidateOptions {
    /// Refresh only if the value is at least this old. 0 always refreshes.
    pub staleness_threshold_ms: u64,
    pub policy: NotificationPolicy,
}

impl InvalidateOptions {
    #[must_use]
    pub fn with_staleness_threshold_ms(mut self, ms: u64) -> Self {
        self.staleness_threshold_ms = ms;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: NotificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate untyped arguments: the threshold first, then the policy name.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] or [`SyncError::UnsupportedPolicy`].
    pub fn parse(staleness_threshold_ms: f64, policy: &str) -> Result<Self, SyncError> {
        Ok(Self {
            staleness_threshold_ms: staleness_threshold_from_f64(staleness_threshold_ms)?,
            policy: policy.parse()?,
        })
    }
}

pub(crate) type SharedInner = Rc<RefCell<SchedulerInner>>;
pub(crate) type WeakInner = Weak<RefCell<SchedulerInner>>;

/// Receivers and the value they all get, collected under the borrow.
struct DispatchRound {
    value: Rc<TimeValue>,
    receivers: Vec<Receiver>,
}

pub(crate) struct SchedulerInner {
    self_ref: WeakInner,
    config: SchedulerConfig,
    floor: NonZeroU64,
    clock: Rc<dyn Clock>,
    timers: Rc<dyn TimerHost>,
    registry: SubscriptionRegistry,
    fastest: Cadence,
    timer: Option<TimerHandle>,
    value: Rc<TimeValue>,
    snapshot: Rc<Snapshot>,
    notification_owed: bool,
    disposed: bool,
    next_entry: u64,
}

impl SchedulerInner {
    fn is_inert(&self) -> bool {
        self.disposed || self.config.frozen
    }

    fn publish(&mut self) {
        self.snapshot = Rc::new(Snapshot::new(
            Rc::clone(&self.value),
            self.registry.len(),
            self.config.frozen,
            self.disposed,
            self.floor.get(),
            self.config.allow_duplicate_callback_invocation,
        ));
    }

    /// Replace the value with a fresh clock reading if it is at least
    /// `threshold_ms` old. Returns whether the value changed; publishing is
    /// left to the caller.
    fn refresh(&mut self, threshold_ms: u64) -> bool {
        let now = self.clock.now();
        let age = now.millis_since(&self.value);
        if age < i64::try_from(threshold_ms).unwrap_or(i64::MAX) {
            return false;
        }
        if now == *self.value {
            return false;
        }
        self.value = Rc::new(now);
        true
    }

    fn take_round(&self) -> DispatchRound {
        DispatchRound {
            value: Rc::clone(&self.value),
            receivers: self
                .registry
                .receivers(self.config.allow_duplicate_callback_invocation),
        }
    }

    /// A round if the value changed or a notification is owed. Clears the debt.
    fn owed_round(&mut self, changed: bool) -> Option<DispatchRound> {
        let due = changed || self.notification_owed;
        self.notification_owed = false;
        due.then(|| self.take_round())
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.timers.cancel(handle);
        }
    }

    fn start_interval(&mut self, period_ms: u64) {
        self.cancel_timer();
        let weak = self.self_ref.clone();
        let handle = self
            .timers
            .start_interval(period_ms, Rc::new(move || SyncScheduler::on_tick(&weak)));
        trace!(timer = handle.as_raw(), period_ms, "interval started");
        self.timer = Some(handle);
    }

    fn start_bridge(&mut self, delay_ms: u64, period_ms: u64) {
        self.cancel_timer();
        let weak = self.self_ref.clone();
        let handle = self.timers.start_timeout(
            delay_ms,
            Rc::new(move || SyncScheduler::on_bridge(&weak, period_ms)),
        );
        trace!(timer = handle.as_raw(), delay_ms, period_ms, "bridge started");
        self.timer = Some(handle);
    }

    fn recompute_fastest(&mut self) -> Option<DispatchRound> {
        let fastest = self.registry.fastest();
        debug_assert_eq!(fastest, self.registry.scan_fastest());
        if fastest == self.fastest {
            return None;
        }
        debug!(from = %self.fastest, to = %fastest, "fastest cadence changed");
        self.fastest = fastest;
        self.retime()
    }

    fn retime(&mut self) -> Option<DispatchRound> {
        self.cancel_timer();
        let period = match self.fastest {
            Cadence::Every(ms) if !self.is_inert() => ms.get(),
            _ => {
                debug!("no bounded cadence, timer idle");
                return None;
            }
        };
        let elapsed = self.clock.now().millis_since(&self.value);
        let period_i64 = i64::try_from(period).unwrap_or(i64::MAX);
        let remaining = period_i64.saturating_sub(elapsed);

        if remaining <= 0 {
            debug!(period_ms = period, elapsed_ms = elapsed, "value stale, refreshing now");
            let changed = self.refresh(0);
            if changed {
                self.publish();
            }
            self.start_interval(period);
            return self.owed_round(changed);
        }
        if remaining >= period_i64 {
            self.start_interval(period);
        } else {
            // 0 < remaining < period, so the cast is lossless.
            self.start_bridge(remaining as u64, period);
        }
        None
    }
}

impl Drop for SchedulerInner {
    // Last handle gone without dispose(): disarm so the host can go idle.
    fn drop(&mut self) {
        if self.timer.is_some() {
            trace!("scheduler dropped with timer armed, cancelling");
        }
        self.cancel_timer();
    }
}

/// One shared timer, many synchronized subscribers.
///
/// Cloning a `SyncScheduler` creates a new handle to the **same** state.
pub struct SyncScheduler {
    inner: SharedInner,
}

impl Clone for SyncScheduler {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SyncScheduler")
            .field("value", &*inner.value)
            .field("fastest", &inner.fastest)
            .field("registry", &inner.registry)
            .field("timer", &inner.timer)
            .field("frozen", &inner.config.frozen)
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl SyncScheduler {
    /// Create a scheduler reading `clock` and arming timers on `timers`.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] if `config.minimum_cadence_ms` is 0.
    pub fn new(
        config: SchedulerConfig,
        clock: Rc<dyn Clock>,
        timers: Rc<dyn TimerHost>,
    ) -> Result<Self, SyncError> {
        let floor = config.validate()?;
        let value = Rc::new(config.initial_value.unwrap_or_else(|| clock.now()));
        debug!(
            value = %value,
            frozen = config.frozen,
            minimum_cadence_ms = floor.get(),
            allow_duplicates = config.allow_duplicate_callback_invocation,
            "scheduler created"
        );
        let inner = Rc::new_cyclic(|self_ref| {
            let snapshot = Rc::new(Snapshot::new(
                Rc::clone(&value),
                0,
                config.frozen,
                false,
                floor.get(),
                config.allow_duplicate_callback_invocation,
            ));
            RefCell::new(SchedulerInner {
                self_ref: self_ref.clone(),
                config,
                floor,
                clock,
                timers,
                registry: SubscriptionRegistry::new(),
                fastest: Cadence::Unbounded,
                timer: None,
                value,
                snapshot,
                notification_owed: false,
                disposed: false,
                next_entry: 0,
            })
        });
        Ok(Self { inner })
    }

    /// Create a scheduler on a host that is both clock and timer source.
    ///
    /// # Errors
    ///
    /// As [`SyncScheduler::new`].
    pub fn with_host<H>(config: SchedulerConfig, host: Rc<H>) -> Result<Self, SyncError>
    where
        H: Clock + TimerHost + 'static,
    {
        let clock: Rc<dyn Clock> = host.clone();
        let timers: Rc<dyn TimerHost> = host;
        Self::new(config, clock, timers)
    }

    /// Register `on_update` at `cadence`.
    ///
    /// The effective cadence is `cadence` slowed to the configured minimum.
    /// Registering the same `Rc` again adds another cadence request for the
    /// same callback; by default it is still invoked once per tick.
    ///
    /// On a frozen or disposed scheduler nothing is registered and the
    /// returned handle is inert.
    pub fn subscribe(&self, cadence: Cadence, on_update: UpdateCallback) -> SubscriptionHandle {
        let (handle, round) = {
            let mut inner = self.inner.borrow_mut();
            if inner.is_inert() {
                trace!(cadence = %cadence, "subscribe on inert scheduler ignored");
                return SubscriptionHandle::inert();
            }
            let effective = cadence.at_least(inner.floor);
            inner.next_entry += 1;
            let id = EntryId(inner.next_entry);
            let cancelled = Rc::new(Cell::new(false));
            inner.registry.insert(
                &on_update,
                CadenceEntry {
                    id,
                    cadence: effective,
                    cancelled: Rc::clone(&cancelled),
                },
            );
            if inner.registry.len() == 1 {
                // Unknown time has passed since construction or since the
                // last subscriber left.
                inner.refresh(0);
            }
            let round = inner.recompute_fastest();
            inner.publish();
            trace!(
                cadence = %effective,
                subscribers = inner.registry.len(),
                "subscribed"
            );
            (
                SubscriptionHandle::linked(Rc::downgrade(&self.inner), id, cancelled),
                round,
            )
        };
        if let Some(round) = round {
            dispatch(&self.inner, round);
        }
        handle
    }

    /// [`SyncScheduler::subscribe`] with a freshly allocated callback.
    pub fn subscribe_fn(
        &self,
        cadence: Cadence,
        on_update: impl Fn(&Rc<TimeValue>) + 'static,
    ) -> SubscriptionHandle {
        self.subscribe(cadence, Rc::new(on_update))
    }

    /// The current snapshot. Same `Rc` until the next observable change.
    #[must_use]
    pub fn state_snapshot(&self) -> Rc<Snapshot> {
        Rc::clone(&self.inner.borrow().snapshot)
    }

    /// Refresh on demand and notify according to `options.policy`.
    ///
    /// Frozen and disposed schedulers return their snapshot untouched.
    pub fn invalidate_state(&self, options: InvalidateOptions) -> Rc<Snapshot> {
        let round = {
            let mut inner = self.inner.borrow_mut();
            if inner.is_inert() {
                return Rc::clone(&inner.snapshot);
            }
            let changed = inner.refresh(options.staleness_threshold_ms);
            if changed {
                inner.publish();
            }
            trace!(policy = %options.policy, changed, "invalidate");
            match options.policy {
                NotificationPolicy::Never => {
                    if changed {
                        inner.notification_owed = true;
                    }
                    None
                }
                NotificationPolicy::Always => {
                    inner.notification_owed = false;
                    Some(inner.take_round())
                }
                NotificationPolicy::OnChange => inner.owed_round(changed),
            }
        };
        if let Some(round) = round {
            dispatch(&self.inner, round);
        }
        self.state_snapshot()
    }

    /// [`SyncScheduler::invalidate_state`] for untyped input. Arguments are
    /// validated before the scheduler's lifecycle is consulted, so malformed
    /// calls fail even on a disposed scheduler.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] for a bad threshold,
    /// [`SyncError::UnsupportedPolicy`] for an unknown policy name.
    pub fn invalidate_state_raw(
        &self,
        staleness_threshold_ms: f64,
        policy: &str,
    ) -> Result<Rc<Snapshot>, SyncError> {
        let options = InvalidateOptions::parse(staleness_threshold_ms, policy)?;
        Ok(self.invalidate_state(options))
    }

    /// Stop the timer and drop every subscription. Idempotent.
    pub fn dispose(&self) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.cancel_timer();
            let (entries, callbacks) = inner.registry.drain();
            for entry in &entries {
                entry.cancelled.set(true);
            }
            inner.fastest = Cadence::Unbounded;
            inner.notification_owed = false;
            inner.publish();
            debug!(released = entries.len(), "scheduler disposed");
            callbacks
        };
        drop(released);
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().config.frozen
    }

    /// The cadence the shared timer currently runs at.
    #[must_use]
    pub fn fastest_cadence(&self) -> Cadence {
        self.inner.borrow().fastest
    }

    /// Live registrations.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    /// Distinct callbacks among the live registrations.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.inner.borrow().registry.callback_count()
    }

    /// The configuration this scheduler was built with.
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config.clone()
    }

    fn on_tick(weak: &WeakInner) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let round = {
            let Ok(mut state) = inner.try_borrow_mut() else {
                warn!("tick fired while scheduler busy, skipped");
                return;
            };
            if state.is_inert() {
                state.cancel_timer();
                return;
            }
            let changed = state.refresh(0);
            if changed {
                state.publish();
            }
            trace!(value = %state.value, changed, "tick");
            state.owed_round(changed)
        };
        if let Some(round) = round {
            dispatch(&inner, round);
        }
    }

    fn on_bridge(weak: &WeakInner, period_ms: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let Ok(mut state) = inner.try_borrow_mut() else {
            warn!("bridge fired while scheduler busy, skipped");
            return;
        };
        if state.is_inert() {
            state.cancel_timer();
            return;
        }
        state.start_interval(period_ms);
    }
}

/// Cancel one registration. Called by [`SubscriptionHandle::cancel`].
pub(crate) fn cancel_entry(inner: &SharedInner, id: EntryId) {
    let (round, released) = {
        let mut state = inner.borrow_mut();
        let Some((entry, released)) = state.registry.remove(id) else {
            return;
        };
        entry.cancelled.set(true);
        if state.registry.is_empty() {
            state.notification_owed = false;
        }
        let round = state.recompute_fastest();
        state.publish();
        trace!(
            cadence = %entry.cadence,
            subscribers = state.registry.len(),
            "unsubscribed"
        );
        (round, released)
    };
    if let Some(round) = round {
        dispatch(inner, round);
    }
    drop(released);
}

/// Invoke a collected round. No borrow is held while callbacks run; each
/// receiver is re-checked so one removed earlier in this round is skipped.
fn dispatch(inner: &SharedInner, round: DispatchRound) {
    let _span = debug_span!(
        "synclock.dispatch",
        receivers = round.receivers.len(),
        value_ms = round.value.timestamp_millis()
    )
    .entered();
    for receiver in &round.receivers {
        let live = {
            let state = inner.borrow();
            !state.is_inert() && state.registry.is_live(receiver.slot)
        };
        if !live {
            trace!("receiver removed mid-round, skipped");
            continue;
        }
        (receiver.callback)(&round.value);
    }
}
