//! Error kinds for gridrun operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Users can match on ErrorKind to decide how to handle specific error cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    // =========================================================================
    // Session errors
    // =========================================================================
    /// The requested session was not found (or already expired)
    SessionNotFound,

    /// The session exists but is in a state that forbids the operation
    SessionInvalid,

    /// A continuation was requested without a usable seed frame
    MissingSeedFrame,

    // =========================================================================
    // Frame errors
    // =========================================================================
    /// Frame data did not match any recognized grid shape
    FrameMalformed,

    /// An action token on the wire could not be normalized
    ActionUnrecognized,

    /// Tool arguments failed schema validation
    ActionInvalid,

    // =========================================================================
    // Remote game API errors
    // =========================================================================
    /// The remote game API returned a non-success status
    RemoteApiFailed,

    /// The remote game API rate limited the caller
    RateLimited,

    /// Authentication with the remote game API failed
    AuthenticationFailed,

    // =========================================================================
    // LLM provider errors
    // =========================================================================
    /// The LLM provider call failed
    ProviderFailed,

    /// The LLM provider is not available or not configured
    ProviderUnavailable,

    // =========================================================================
    // Persistence errors
    // =========================================================================
    /// Frame log record not found
    RecordNotFound,

    /// Persistence operation failed
    StorageFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    // =========================================================================
    // Streaming errors
    // =========================================================================
    /// The streaming channel for a session is closed or was never opened
    StreamClosed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Session
            ErrorKind::SessionNotFound => "SessionNotFound",
            ErrorKind::SessionInvalid => "SessionInvalid",
            ErrorKind::MissingSeedFrame => "MissingSeedFrame",

            // Frame
            ErrorKind::FrameMalformed => "FrameMalformed",
            ErrorKind::ActionUnrecognized => "ActionUnrecognized",
            ErrorKind::ActionInvalid => "ActionInvalid",

            // Remote API
            ErrorKind::RemoteApiFailed => "RemoteApiFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // Provider
            ErrorKind::ProviderFailed => "ProviderFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",

            // Persistence
            ErrorKind::RecordNotFound => "RecordNotFound",
            ErrorKind::StorageFailed => "StorageFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // Streaming
            ErrorKind::StreamClosed => "StreamClosed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RemoteApiFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderFailed
                | ErrorKind::ProviderUnavailable
                | ErrorKind::NetworkFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::SessionNotFound.to_string(), "SessionNotFound");
        assert_eq!(ErrorKind::RemoteApiFailed.to_string(), "RemoteApiFailed");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::SessionNotFound.is_retryable());
        assert!(!ErrorKind::MissingSeedFrame.is_retryable());
    }
}
