#![forbid(unsafe_code)]

//! Error taxonomy shared by every synclock crate.
//!
//! All errors are raised synchronously, before any state is touched, and are
//! never recovered internally. Calls on a disposed or frozen scheduler are
//! not errors; they are no-ops.

/// Errors from synclock operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A cadence or staleness threshold is not a positive integer (or a
    /// non-negative one, for thresholds) and not the unbounded sentinel.
    InvalidInterval {
        /// Which argument was rejected (`"cadence"`, `"staleness threshold"`, ...).
        what: &'static str,
        /// The rejected value, rendered for diagnostics.
        value: String,
    },
    /// A time value could not be built from the given input.
    InvalidInput(String),
    /// A notification policy name that is not `onChange`, `never` or `always`.
    UnsupportedPolicy(String),
}

impl SyncError {
    /// Shorthand for [`SyncError::InvalidInterval`].
    pub fn invalid_interval(what: &'static str, value: impl ToString) -> Self {
        Self::InvalidInterval {
            what,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInterval { what, value } => {
                write!(f, "invalid interval for {what}: {value}")
            }
            Self::InvalidInput(msg) => write!(f, "invalid time input: {msg}"),
            Self::UnsupportedPolicy(name) => write!(
                f,
                "unsupported notification policy {name:?} (expected onChange, never or always)"
            ),
        }
    }
}

impl std::error::Error for SyncError {}
