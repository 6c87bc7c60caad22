#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! Configuration is fixed at construction. Every field has a default, and
//! deployments can override them through `SYNCLOCK_*` environment variables
//! via [`SchedulerConfig::from_env`].

use std::num::NonZeroU64;

use synclock_core::{SyncError, TimeValue};
use tracing::warn;

/// Minimum cadence floor, in milliseconds.
pub const MIN_CADENCE_ENV: &str = "SYNCLOCK_MIN_CADENCE_MS";
/// `1|true|yes|on` freezes the scheduler.
pub const FROZEN_ENV: &str = "SYNCLOCK_FROZEN";
/// `1|true|yes|on` allows one invocation per registration.
pub const ALLOW_DUPLICATES_ENV: &str = "SYNCLOCK_ALLOW_DUPLICATES";

/// Configuration for [`SyncScheduler`](crate::SyncScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Starting value. `None` reads the clock at construction.
    pub initial_value: Option<TimeValue>,

    /// Never advance, never notify. One-way: there is no unfreeze.
    pub frozen: bool,

    /// Floor applied to every subscription's requested cadence. Must be > 0.
    /// Default: 1ms.
    pub minimum_cadence_ms: u64,

    /// Invoke a callback once per registration instead of once per tick.
    /// Default: false.
    pub allow_duplicate_callback_invocation: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_value: None,
            frozen: false,
            minimum_cadence_ms: 1,
            allow_duplicate_callback_invocation: false,
        }
    }
}

#[inline]
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_initial_value(mut self, value: TimeValue) -> Self {
        self.initial_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    #[must_use]
    pub fn with_minimum_cadence_ms(mut self, ms: u64) -> Self {
        self.minimum_cadence_ms = ms;
        self
    }

    #[must_use]
    pub fn with_duplicate_callback_invocation(mut self, allow: bool) -> Self {
        self.allow_duplicate_callback_invocation = allow;
        self
    }

    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through a custom environment lookup.
    ///
    /// Values that do not parse are ignored with a warning.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = get_env(MIN_CADENCE_ENV) {
            match raw.trim().parse::<NonZeroU64>() {
                Ok(ms) => config.minimum_cadence_ms = ms.get(),
                Err(_) => warn!(key = MIN_CADENCE_ENV, value = %raw, "ignoring invalid minimum cadence"),
            }
        }
        if let Some(raw) = get_env(FROZEN_ENV) {
            config.frozen = env_flag(&raw);
        }
        if let Some(raw) = get_env(ALLOW_DUPLICATES_ENV) {
            config.allow_duplicate_callback_invocation = env_flag(&raw);
        }
        config
    }

    /// The minimum cadence as a non-zero floor.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] when `minimum_cadence_ms` is 0.
    pub fn validate(&self) -> Result<NonZeroU64, SyncError> {
        NonZeroU64::new(self.minimum_cadence_ms)
            .ok_or_else(|| SyncError::invalid_interval("minimum cadence", self.minimum_cadence_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.minimum_cadence_ms, 1);
        assert!(!config.frozen);
        assert!(!config.allow_duplicate_callback_invocation);
        assert!(config.initial_value.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_minimum_is_invalid() {
        let config = SchedulerConfig::default().with_minimum_cadence_ms(0);
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidInterval { what: "minimum cadence", .. })
        ));
    }

    #[test]
    fn env_overrides() {
        let config = SchedulerConfig::from_env_with(lookup(&[
            (MIN_CADENCE_ENV, " 250 "),
            (FROZEN_ENV, "Yes"),
            (ALLOW_DUPLICATES_ENV, "on"),
        ]));
        assert_eq!(config.minimum_cadence_ms, 250);
        assert!(config.frozen);
        assert!(config.allow_duplicate_callback_invocation);
    }

    #[test]
    fn bad_env_values_fall_back() {
        let config = SchedulerConfig::from_env_with(lookup(&[
            (MIN_CADENCE_ENV, "0"),
            (FROZEN_ENV, "maybe"),
        ]));
        assert_eq!(config.minimum_cadence_ms, 1);
        assert!(!config.frozen);
    }

    #[test]
    fn builders_chain() {
        let start = TimeValue::from_millis(5).unwrap();
        let config = SchedulerConfig::default()
            .with_initial_value(start)
            .with_frozen(true)
            .with_minimum_cadence_ms(1000)
            .with_duplicate_callback_invocation(true);
        assert_eq!(config.initial_value, Some(start));
        assert!(config.frozen);
        assert_eq!(config.minimum_cadence_ms, 1000);
        assert!(config.allow_duplicate_callback_invocation);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_roundtrip() {
        let config = SchedulerConfig::default()
            .with_initial_value(TimeValue::from_millis(42).unwrap())
            .with_minimum_cadence_ms(500);
        let json = serde_json::to_string(&config).unwrap();
        let back: SchedulerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
