#![forbid(unsafe_code)]

//! Core: immutable time values, cadences, and host capabilities.
//!
//! # Role in synclock
//! `synclock-core` is the leaf layer. It owns the value type that subscribers
//! receive ([`TimeValue`]), the vocabulary for refresh requests ([`Cadence`],
//! [`NotificationPolicy`]), the error taxonomy ([`SyncError`]), and the
//! capability traits through which the scheduler reads the clock and arms
//! timers ([`Clock`], [`TimerHost`]).
//!
//! # How it fits in the system
//! `synclock-runtime` builds the shared-cadence scheduler on top of these
//! types and supplies concrete hosts (simulated and real-time).

pub mod cadence;
pub mod error;
pub mod host;
#[cfg(feature = "tracing")]
pub mod logging;
pub mod policy;
pub mod time_value;

pub use cadence::Cadence;
pub use error::SyncError;
pub use host::{Clock, SystemClock, TimerCallback, TimerHandle, TimerHost};
pub use policy::{NotificationPolicy, staleness_threshold_from_f64};
pub use time_value::TimeValue;
