//! Error status - how an error should be handled

use std::fmt;

/// The status of an error: whether retrying the operation can help.
///
/// - `Permanent`: retrying will not help (bad input, missing session, ...)
/// - `Temporary`: retrying may help (network hiccup, rate limit, ...)
/// - `Persistent`: was temporary, but retries were exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// The error is permanent; retrying the same operation cannot succeed
    Permanent,
    /// The error is temporary; the operation may succeed if retried
    Temporary,
    /// The error was temporary but persisted through retries
    Persistent,
}

impl ErrorStatus {
    /// Check if an operation with this status is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Transition a temporary status to persistent after failed retries.
    ///
    /// Permanent stays permanent; persistent stays persistent.
    pub fn persist(self) -> Self {
        match self {
            ErrorStatus::Temporary => ErrorStatus::Persistent,
            other => other,
        }
    }

    /// Returns the status as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
            ErrorStatus::Persistent => "persistent",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
