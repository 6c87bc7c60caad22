//! Property-based invariant tests for the shared-cadence scheduler.
//!
//! Random sequences of subscribe, cancel, advance and invalidate run against
//! a [`VirtualTime`] host while a plain model tracks the live registrations.
//! After every step:
//!
//! 1. The scheduler's fastest cadence equals the minimum over the model.
//! 2. Exactly one timer is armed while that minimum is bounded, none otherwise.
//! 3. Two snapshot reads with no step in between return the same `Rc`.
//! 4. The published subscriber count matches the model.
//! 5. The value never moves backwards while the clock only advances.
//!
//! A second group checks that frozen schedulers stay inert under any sequence.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use synclock_runtime::{
    Cadence, InvalidateOptions, NotificationPolicy, SchedulerConfig, SubscriptionHandle,
    SyncScheduler, TimeValue, UpdateCallback, VirtualTime,
};

#[derive(Debug, Clone)]
enum Op {
    Subscribe { cadence: Option<u64>, callback: usize },
    Cancel(usize),
    Advance(u64),
    Invalidate { threshold: u64, policy: NotificationPolicy },
}

fn policy_strategy() -> impl Strategy<Value = NotificationPolicy> {
    prop_oneof![
        Just(NotificationPolicy::OnChange),
        Just(NotificationPolicy::Never),
        Just(NotificationPolicy::Always),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (proptest::option::weighted(0.85, 1u64..2_000), 0usize..4)
            .prop_map(|(cadence, callback)| Op::Subscribe { cadence, callback }),
        2 => (0usize..16).prop_map(Op::Cancel),
        3 => (0u64..3_000).prop_map(Op::Advance),
        1 => (0u64..1_000, policy_strategy())
            .prop_map(|(threshold, policy)| Op::Invalidate { threshold, policy }),
    ]
}

fn to_cadence(ms: Option<u64>) -> Cadence {
    ms.map_or(Cadence::Unbounded, |n| Cadence::every(n).unwrap())
}

struct Harness {
    host: Rc<VirtualTime>,
    scheduler: SyncScheduler,
    callbacks: Vec<UpdateCallback>,
    invocations: Rc<Cell<u64>>,
    live: Vec<(SubscriptionHandle, Cadence)>,
}

impl Harness {
    fn new(config: SchedulerConfig) -> Self {
        let host = Rc::new(VirtualTime::starting_at(
            TimeValue::from_millis(1_700_000_000_000).unwrap(),
        ));
        let scheduler = SyncScheduler::with_host(config, Rc::clone(&host)).unwrap();
        let invocations = Rc::new(Cell::new(0u64));
        let callbacks = (0..4)
            .map(|_| {
                let inv = Rc::clone(&invocations);
                let cb: UpdateCallback = Rc::new(move |_| inv.set(inv.get() + 1));
                cb
            })
            .collect();
        Self {
            host,
            scheduler,
            callbacks,
            invocations,
            live: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Subscribe { cadence, callback } => {
                let cadence = to_cadence(cadence);
                let handle = self
                    .scheduler
                    .subscribe(cadence, Rc::clone(&self.callbacks[callback]));
                if handle.is_active() {
                    self.live.push((handle, cadence));
                }
            }
            Op::Cancel(i) => {
                if !self.live.is_empty() {
                    let (handle, _) = self.live.remove(i % self.live.len());
                    handle.cancel();
                }
            }
            Op::Advance(ms) => self.host.advance(ms),
            Op::Invalidate { threshold, policy } => {
                self.scheduler.invalidate_state(
                    InvalidateOptions::default()
                        .with_staleness_threshold_ms(threshold)
                        .with_policy(policy),
                );
            }
        }
    }

    fn model_fastest(&self) -> Cadence {
        Cadence::fastest(self.live.iter().map(|(_, c)| *c))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn scheduler_tracks_model(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let mut h = Harness::new(SchedulerConfig::default());
        let mut last_value = **h.scheduler.state_snapshot().value();

        for op in &ops {
            h.apply(op);

            let fastest = h.model_fastest();
            prop_assert_eq!(h.scheduler.fastest_cadence(), fastest, "after {:?}", op);

            let expected_timers = usize::from(!fastest.is_unbounded());
            prop_assert_eq!(h.host.pending_timers(), expected_timers, "after {:?}", op);

            let a = h.scheduler.state_snapshot();
            let b = h.scheduler.state_snapshot();
            prop_assert!(Rc::ptr_eq(&a, &b));
            prop_assert_eq!(a.subscriber_count(), h.live.len());

            let value = **a.value();
            prop_assert!(value >= last_value, "value went backwards after {:?}", op);
            last_value = value;
        }
    }

    #[test]
    fn unbounded_only_never_dispatches_on_ticks(
        advances in proptest::collection::vec(0u64..10_000, 1..20),
        subscribers in 1usize..4,
    ) {
        let mut h = Harness::new(SchedulerConfig::default());
        for i in 0..subscribers {
            h.apply(&Op::Subscribe { cadence: None, callback: i });
        }
        for ms in advances {
            h.host.advance(ms);
        }
        prop_assert_eq!(h.invocations.get(), 0);
        prop_assert_eq!(h.host.pending_timers(), 0);
    }

    #[test]
    fn frozen_scheduler_stays_inert(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut h = Harness::new(SchedulerConfig::default().with_frozen(true));
        let before = h.scheduler.state_snapshot();
        for op in &ops {
            h.apply(op);
        }
        prop_assert!(h.live.is_empty());
        prop_assert_eq!(h.invocations.get(), 0);
        prop_assert_eq!(h.host.pending_timers(), 0);
        prop_assert!(Rc::ptr_eq(&before, &h.scheduler.state_snapshot()));
    }

    #[test]
    fn dispose_mid_sequence_releases_everything(
        head in proptest::collection::vec(op_strategy(), 0..30),
        tail in proptest::collection::vec(op_strategy(), 0..30),
    ) {
        let mut h = Harness::new(SchedulerConfig::default());
        for op in &head {
            h.apply(op);
        }
        h.scheduler.dispose();
        let after_dispose = h.invocations.get();
        prop_assert!(h.live.iter().all(|(handle, _)| !handle.is_active()));
        h.live.clear();

        for op in &tail {
            h.apply(op);
        }
        prop_assert_eq!(h.invocations.get(), after_dispose);
        prop_assert_eq!(h.host.pending_timers(), 0);
        prop_assert_eq!(h.scheduler.subscriber_count(), 0);
        prop_assert!(h.scheduler.state_snapshot().is_disposed());
    }

    #[test]
    fn deduplicated_dispatch_invokes_each_callback_once_per_tick(
        cadences in proptest::collection::vec(1u64..500, 1..12),
    ) {
        let mut h = Harness::new(SchedulerConfig::default());
        for (i, ms) in cadences.iter().enumerate() {
            h.apply(&Op::Subscribe { cadence: Some(*ms), callback: i % 4 });
        }
        let distinct = cadences.len().min(4) as u64;
        let period = *cadences.iter().min().unwrap();
        prop_assert_eq!(h.scheduler.callback_count() as u64, distinct);

        h.host.advance(period);
        prop_assert_eq!(h.invocations.get(), distinct);
    }
}
