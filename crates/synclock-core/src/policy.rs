#![forbid(unsafe_code)]

//! Notification policies for on-demand invalidation.

use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// When an invalidation should dispatch to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotificationPolicy {
    /// Dispatch if the value changed, or if an earlier notification is owed.
    #[default]
    OnChange,
    /// Never dispatch; a change is remembered and delivered later.
    Never,
    /// Always dispatch, changed or not.
    Always,
}

impl NotificationPolicy {
    /// The wire name of this policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OnChange => "onChange",
            Self::Never => "never",
            Self::Always => "always",
        }
    }
}

impl FromStr for NotificationPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onChange" => Ok(Self::OnChange),
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            other => Err(SyncError::UnsupportedPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an untyped staleness threshold (milliseconds, non-negative integer).
///
/// # Errors
///
/// [`SyncError::InvalidInterval`] for negative, fractional, NaN or infinite input.
pub fn staleness_threshold_from_f64(millis: f64) -> Result<u64, SyncError> {
    let integral = millis.is_finite() && millis.fract() == 0.0;
    if !integral || millis < 0.0 || millis >= u64::MAX as f64 {
        return Err(SyncError::invalid_interval("staleness threshold", millis));
    }
    Ok(millis as u64)
}
