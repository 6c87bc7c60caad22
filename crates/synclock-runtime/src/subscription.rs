#![forbid(unsafe_code)]

//! Cancellation handles for subscriptions.
//!
//! [`SubscriptionHandle`] is the explicit one-shot cancel: calling
//! [`cancel`](SubscriptionHandle::cancel) more than once is a no-op, and so
//! is cancelling after the scheduler was disposed or dropped. Clones share the
//! same one-shot state.
//!
//! [`SubscriptionGuard`] is the RAII flavour: dropping it cancels.

use std::cell::Cell;
use std::rc::Rc;

use crate::registry::EntryId;
use crate::scheduler::{WeakInner, cancel_entry};

#[derive(Clone)]
struct Link {
    scheduler: WeakInner,
    entry: EntryId,
    cancelled: Rc<Cell<bool>>,
}

/// Cancels one subscription.
#[derive(Clone)]
#[must_use = "dropping a SubscriptionHandle leaves the subscription registered; call cancel() or into_guard()"]
pub struct SubscriptionHandle {
    link: Option<Link>,
}

impl SubscriptionHandle {
    /// A handle that was never registered (frozen or disposed scheduler).
    pub(crate) fn inert() -> Self {
        Self { link: None }
    }

    pub(crate) fn linked(scheduler: WeakInner, entry: EntryId, cancelled: Rc<Cell<bool>>) -> Self {
        Self {
            link: Some(Link {
                scheduler,
                entry,
                cancelled,
            }),
        }
    }

    /// Remove this subscription. Takes effect for all future ticks.
    pub fn cancel(&self) {
        let Some(link) = &self.link else {
            return;
        };
        if link.cancelled.replace(true) {
            return;
        }
        if let Some(inner) = link.scheduler.upgrade() {
            cancel_entry(&inner, link.entry);
        }
    }

    /// True while the subscription is registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.link.as_ref().is_some_and(|link| !link.cancelled.get())
    }

    /// Convert into a guard that cancels on drop.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { handle: self }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// RAII guard: cancels its subscription when dropped.
#[must_use = "dropping a SubscriptionGuard cancels the subscription immediately"]
pub struct SubscriptionGuard {
    handle: SubscriptionHandle,
}

impl SubscriptionGuard {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SchedulerConfig, SyncScheduler, VirtualTime};
    use synclock_core::{Cadence, TimeValue};

    fn setup() -> (Rc<VirtualTime>, SyncScheduler) {
        let host = Rc::new(VirtualTime::starting_at(TimeValue::from_millis(0).unwrap()));
        let scheduler = SyncScheduler::with_host(SchedulerConfig::default(), Rc::clone(&host)).unwrap();
        (host, scheduler)
    }

    #[test]
    fn guard_cancels_on_drop() {
        let (host, scheduler) = setup();
        let guard = scheduler
            .subscribe_fn(Cadence::every(100).unwrap(), |_| {})
            .into_guard();
        assert!(guard.is_active());
        assert_eq!(scheduler.subscriber_count(), 1);
        drop(guard);
        assert_eq!(scheduler.subscriber_count(), 0);
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn clones_share_one_shot() {
        let (_host, scheduler) = setup();
        let a = scheduler.subscribe_fn(Cadence::every(100).unwrap(), |_| {});
        let _b = scheduler.subscribe_fn(Cadence::every(100).unwrap(), |_| {});
        let a2 = a.clone();
        a.cancel();
        assert!(!a2.is_active());
        a2.cancel();
        assert_eq!(scheduler.subscriber_count(), 1);
    }

    #[test]
    fn inert_handle_is_harmless() {
        let handle = SubscriptionHandle::inert();
        assert!(!handle.is_active());
        handle.cancel();
        let guard = handle.into_guard();
        drop(guard);
    }

    #[test]
    fn guard_owned_by_callback_released_on_dispose() {
        let (_host, scheduler) = setup();
        let inner_guard = scheduler
            .subscribe_fn(Cadence::every(50).unwrap(), |_| {})
            .into_guard();
        // The outer callback owns the inner guard; dropping it re-enters cancel.
        let _outer = scheduler.subscribe_fn(Cadence::every(100).unwrap(), move |_| {
            let _keep = &inner_guard;
        });
        scheduler.dispose();
        assert_eq!(scheduler.subscriber_count(), 0);
    }
}
