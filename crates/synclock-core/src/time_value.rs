#![forbid(unsafe_code)]

//! Immutable point-in-time value.
//!
//! [`TimeValue`] is a `Copy` wrapper around milliseconds since the Unix epoch
//! (UTC). It has no mutators, so a value handed to many subscribers can never
//! be changed underneath them. Equality, ordering and hashing consider the
//! timestamp only.
//!
//! Calendar accessors go through [`chrono`], which also bounds the set of
//! representable instants: anything `chrono::DateTime<Utc>` cannot hold is
//! rejected with [`SyncError::InvalidInput`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Timelike, Utc, Weekday};

use crate::error::SyncError;

/// An immutable instant with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue {
    millis: i64,
}

impl TimeValue {
    /// Read the host wall clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Build from a millisecond timestamp.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] if the instant is outside the representable
    /// calendar range.
    pub fn from_millis(millis: i64) -> Result<Self, SyncError> {
        if DateTime::<Utc>::from_timestamp_millis(millis).is_none() {
            return Err(SyncError::InvalidInput(format!(
                "timestamp {millis}ms is out of range"
            )));
        }
        Ok(Self { millis })
    }

    /// Build from a floating-point millisecond timestamp, as received from an
    /// untyped boundary. Fractional milliseconds are truncated toward zero.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] for NaN, infinities, or out-of-range values.
    pub fn from_millis_f64(millis: f64) -> Result<Self, SyncError> {
        if !millis.is_finite() {
            return Err(SyncError::InvalidInput(format!(
                "timestamp {millis} is not finite"
            )));
        }
        let truncated = millis.trunc();
        if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
            return Err(SyncError::InvalidInput(format!(
                "timestamp {millis}ms is out of range"
            )));
        }
        Self::from_millis(truncated as i64)
    }

    /// Build from a millisecond timestamp, clamping to the representable range.
    #[must_use]
    pub fn saturating_from_millis(millis: i64) -> Self {
        let lo = DateTime::<Utc>::MIN_UTC.timestamp_millis();
        let hi = DateTime::<Utc>::MAX_UTC.timestamp_millis();
        Self {
            millis: millis.clamp(lo, hi),
        }
    }

    /// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as UTC
    /// midnight.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] if neither form matches.
    pub fn parse(input: &str) -> Result<Self, SyncError> {
        let trimmed = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self::from(naive.and_utc()))
            .ok_or_else(|| SyncError::InvalidInput(format!("cannot parse {input:?} as a date")))
    }

    /// Milliseconds since the Unix epoch.
    #[inline]
    #[must_use]
    pub const fn timestamp_millis(&self) -> i64 {
        self.millis
    }

    /// Signed milliseconds elapsed from `earlier` to `self`.
    #[inline]
    #[must_use]
    pub fn millis_since(&self, earlier: &TimeValue) -> i64 {
        self.millis.saturating_sub(earlier.millis)
    }

    /// The instant as a `chrono` UTC datetime.
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        // Construction guarantees the timestamp is representable.
        DateTime::<Utc>::from_timestamp_millis(self.millis).unwrap_or_default()
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.to_datetime().year()
    }

    /// Month of the year, 1-based.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.to_datetime().month()
    }

    /// Day of the month, 1-based.
    #[must_use]
    pub fn day(&self) -> u32 {
        self.to_datetime().day()
    }

    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.to_datetime().weekday()
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.to_datetime().hour()
    }

    #[must_use]
    pub fn minute(&self) -> u32 {
        self.to_datetime().minute()
    }

    #[must_use]
    pub fn second(&self) -> u32 {
        self.to_datetime().second()
    }

    #[must_use]
    pub fn millisecond(&self) -> u32 {
        self.to_datetime().timestamp_subsec_millis()
    }

    /// RFC 3339 rendering with millisecond precision and a `Z` suffix.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl From<DateTime<Utc>> for TimeValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            millis: dt.timestamp_millis(),
        }
    }
}

impl From<TimeValue> for DateTime<Utc> {
    fn from(value: TimeValue) -> Self {
        value.to_datetime()
    }
}

impl TryFrom<i64> for TimeValue {
    type Error = SyncError;

    fn try_from(millis: i64) -> Result<Self, Self::Error> {
        Self::from_millis(millis)
    }
}

impl FromStr for TimeValue {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TimeValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.millis)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TimeValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let millis = <i64 as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_millis(millis).map_err(serde::de::Error::custom)
    }
}
