#![forbid(unsafe_code)]

//! Requested refresh cadences.
//!
//! A [`Cadence`] is either a positive number of milliseconds or
//! [`Cadence::Unbounded`] ("no strict requirement"). The derived ordering puts
//! every bounded cadence before `Unbounded`, so the minimum of any set of
//! cadences is the fastest one, and the minimum of an empty set is
//! conventionally `Unbounded` (see [`Cadence::fastest`]).

use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use crate::error::SyncError;

/// A refresh-rate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cadence {
    /// Refresh at least every `n` milliseconds.
    Every(NonZeroU64),
    /// No refresh requirement.
    Unbounded,
}

impl Cadence {
    /// A bounded cadence of `millis` milliseconds.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] when `millis` is zero.
    pub fn every(millis: u64) -> Result<Self, SyncError> {
        NonZeroU64::new(millis)
            .map(Self::Every)
            .ok_or_else(|| SyncError::invalid_interval("cadence", millis))
    }

    /// A bounded cadence from a [`Duration`], truncated to whole milliseconds.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] when the duration is shorter than 1ms.
    pub fn from_duration(duration: Duration) -> Result<Self, SyncError> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        NonZeroU64::new(millis)
            .map(Self::Every)
            .ok_or_else(|| SyncError::invalid_interval("cadence", format!("{duration:?}")))
    }

    /// Interpret an untyped millisecond value: `+inf` is [`Cadence::Unbounded`],
    /// a finite positive integer is bounded, anything else is rejected.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInterval`] for NaN, `-inf`, zero, negative or
    /// fractional values, and integers too large for `u64`.
    pub fn from_millis_f64(millis: f64) -> Result<Self, SyncError> {
        if millis == f64::INFINITY {
            return Ok(Self::Unbounded);
        }
        let integral = millis.is_finite() && millis.fract() == 0.0;
        if !integral || millis < 1.0 || millis >= u64::MAX as f64 {
            return Err(SyncError::invalid_interval("cadence", millis));
        }
        Self::every(millis as u64)
    }

    /// Apply a floor: bounded cadences faster than `floor` are slowed to it.
    #[must_use]
    pub fn at_least(self, floor: NonZeroU64) -> Self {
        match self {
            Self::Every(ms) => Self::Every(ms.max(floor)),
            Self::Unbounded => Self::Unbounded,
        }
    }

    /// Milliseconds for a bounded cadence, `None` when unbounded.
    #[inline]
    #[must_use]
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Every(ms) => Some(ms.get()),
            Self::Unbounded => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// The fastest cadence in `cadences`, or `Unbounded` if there are none.
    #[must_use]
    pub fn fastest(cadences: impl IntoIterator<Item = Cadence>) -> Self {
        cadences.into_iter().min().unwrap_or(Self::Unbounded)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(ms) => write!(f, "{ms}ms"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Cadence {
        Cadence::every(n).unwrap()
    }

    #[test]
    fn zero_is_invalid() {
        assert!(matches!(
            Cadence::every(0),
            Err(SyncError::InvalidInterval { what: "cadence", .. })
        ));
        assert!(Cadence::from_duration(Duration::from_micros(999)).is_err());
        assert_eq!(
            Cadence::from_duration(Duration::from_millis(250)).unwrap(),
            ms(250)
        );
    }

    #[test]
    fn untyped_values() {
        assert_eq!(Cadence::from_millis_f64(f64::INFINITY).unwrap(), Cadence::Unbounded);
        assert_eq!(Cadence::from_millis_f64(500.0).unwrap(), ms(500));
        for bad in [0.0, -1.0, 1.5, f64::NAN, f64::NEG_INFINITY, 1e30] {
            assert!(Cadence::from_millis_f64(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn unbounded_sorts_last() {
        assert!(ms(u64::MAX) < Cadence::Unbounded);
        assert!(ms(200) < ms(500));
        assert_eq!(Cadence::fastest([ms(500), Cadence::Unbounded, ms(200)]), ms(200));
        assert_eq!(Cadence::fastest([Cadence::Unbounded]), Cadence::Unbounded);
        assert_eq!(Cadence::fastest([]), Cadence::Unbounded);
    }

    #[test]
    fn floor_applies_to_bounded_only() {
        let floor = NonZeroU64::new(1000).unwrap();
        assert_eq!(ms(500).at_least(floor), ms(1000));
        assert_eq!(ms(1500).at_least(floor), ms(1500));
        assert_eq!(Cadence::Unbounded.at_least(floor), Cadence::Unbounded);
    }

    #[test]
    fn display() {
        assert_eq!(ms(250).to_string(), "250ms");
        assert_eq!(Cadence::Unbounded.to_string(), "unbounded");
    }
}
