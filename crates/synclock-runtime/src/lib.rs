#![forbid(unsafe_code)]

//! Runtime: one shared timer, many synchronized time subscribers.
//!
//! # Role in synclock
//! `synclock-runtime` owns the interval-consolidation scheduler. Consumers
//! subscribe with the cadence they need; the scheduler runs a single timer at
//! the fastest requested cadence and fans each refreshed [`TimeValue`] out to
//! every subscriber in one round.
//!
//! # Primary responsibilities
//! - **SyncScheduler**: subscriptions, retiming, dispatch, invalidation,
//!   disposal.
//! - **Snapshot**: referentially stable published state.
//! - **Hosts**: [`VirtualTime`] for deterministic tests, [`EventLoop`] for
//!   real time. Any other event loop can implement the
//!   [`Clock`]/[`TimerHost`] traits from `synclock-core`.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use synclock_runtime::{Cadence, SchedulerConfig, SyncScheduler, VirtualTime, TimeValue};
//!
//! let host = Rc::new(VirtualTime::starting_at(TimeValue::from_millis(0)?));
//! let scheduler = SyncScheduler::with_host(SchedulerConfig::from_env(), host.clone())?;
//! let clock_face = scheduler.subscribe_fn(Cadence::every(1000)?, |now| render(now));
//! let seconds_hand = scheduler.subscribe_fn(Cadence::every(250)?, |now| render(now));
//! host.advance(1_000); // both callbacks see the same four values
//! seconds_hand.cancel(); // timer slows to 1000ms, phase preserved
//! ```

pub mod config;
pub mod event_loop;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod subscription;
mod timer_queue;
pub mod virtual_time;

pub use config::SchedulerConfig;
pub use event_loop::EventLoop;
pub use registry::UpdateCallback;
pub use scheduler::{InvalidateOptions, SyncScheduler};
pub use snapshot::Snapshot;
pub use subscription::{SubscriptionGuard, SubscriptionHandle};
pub use virtual_time::VirtualTime;

pub use synclock_core::{
    Cadence, Clock, NotificationPolicy, SyncError, SystemClock, TimeValue, TimerCallback,
    TimerHandle, TimerHost,
};
