//! The main Error type for gridrun

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// The unified error type for all gridrun operations.
///
/// This error type provides:
/// - `kind`: What type of error occurred
/// - `message`: Human-readable description
/// - `status`: Whether the error is retryable
/// - `operation`: What operation caused the error
/// - `context`: Key-value pairs for debugging
/// - `source`: The underlying error (if any)
///
/// # Example
///
/// ```rust
/// use gridrun_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::RemoteApiFailed, "execute_action returned 503")
///     .with_operation("client::execute_action")
///     .with_status(ErrorStatus::Temporary)
///     .with_context("game_id", "ls20")
///     .with_context("action", "ACTION6");
///
/// assert_eq!(err.kind(), ErrorKind::RemoteApiFailed);
/// assert!(err.status().is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error status
    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Get the operation that caused this error
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Get the context key-value pairs
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Get the source error (if any)
    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the error status
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as temporary (retryable)
    pub fn temporary(mut self) -> Self {
        self.status = ErrorStatus::Temporary;
        self
    }

    /// Mark as permanent (not retryable)
    pub fn permanent(mut self) -> Self {
        self.status = ErrorStatus::Permanent;
        self
    }

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    // =========================================================================
    // Status mutations
    // =========================================================================

    /// Mark as persistent after failed retries
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Convenient From implementations (be careful not to leak raw errors!)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    /// Create an Unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Create an Unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Create a SessionNotFound error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self::new(
            ErrorKind::SessionNotFound,
            format!("session '{}' not found or expired", session_id),
        )
        .with_context("session_id", session_id)
    }

    /// Create a MissingSeedFrame error
    pub fn missing_seed_frame(game_guid: impl Into<String>) -> Self {
        let game_guid = game_guid.into();
        Self::new(
            ErrorKind::MissingSeedFrame,
            "cannot continue an existing game without a seed frame",
        )
        .with_context("game_guid", game_guid)
    }

    /// Create a FrameMalformed error
    pub fn frame_malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FrameMalformed, message)
    }

    /// Create an ActionUnrecognized error
    pub fn action_unrecognized(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(
            ErrorKind::ActionUnrecognized,
            format!("unrecognized action token '{}'", token),
        )
        .with_context("token", token)
    }

    /// Create an ActionInvalid error
    pub fn action_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ActionInvalid, message)
    }

    /// Create a RemoteApiFailed error
    pub fn remote_api_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteApiFailed, message)
    }

    /// Create a ProviderFailed error
    pub fn provider_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderFailed, message)
    }

    /// Create a RecordNotFound error
    pub fn record_not_found(record_id: impl Into<String>) -> Self {
        let record_id = record_id.into();
        Self::new(ErrorKind::RecordNotFound, format!("record '{}' not found", record_id))
            .with_context("record_id", record_id)
    }

    /// Create a StorageFailed error
    pub fn storage_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageFailed, message)
    }

    /// Create a SerializationFailed error
    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }

    /// Create a StreamClosed error
    pub fn stream_closed(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self::new(
            ErrorKind::StreamClosed,
            format!("no active stream for session '{}'", session_id),
        )
        .with_context("session_id", session_id)
    }

    /// Create a ConfigInvalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a ParseFailed error
    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::SessionNotFound, "session 'abc' not found");
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
        assert_eq!(err.message(), "session 'abc' not found");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::RemoteApiFailed, "timeout")
            .with_operation("client::execute_action")
            .with_context("game_id", "ls20")
            .with_context("action", "ACTION3");

        assert_eq!(err.operation(), "client::execute_action");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("game_id", "ls20".to_string()));
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::IoFailed, "write failed")
            .with_operation("frame_store::save_frame")
            .with_operation("runner::record_frames");

        assert_eq!(err.operation(), "runner::record_frames");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "frame_store::save_frame".to_string()));
    }

    #[test]
    fn test_temporary_status() {
        let err = Error::new(ErrorKind::RemoteApiFailed, "rate limited");
        assert!(err.is_retryable()); // RemoteApiFailed defaults to temporary

        let err = Error::new(ErrorKind::SessionNotFound, "not found");
        assert!(!err.is_retryable()); // SessionNotFound defaults to permanent
    }

    #[test]
    fn test_persist() {
        let err = Error::new(ErrorKind::NetworkFailed, "connection refused").temporary();
        assert!(err.is_retryable());

        let err = err.persist();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::RemoteApiFailed, "server unavailable")
            .with_operation("client::start_game")
            .with_context("game_id", "ft09")
            .with_context("attempt", "3");

        let display = format!("{}", err);
        assert!(display.contains("RemoteApiFailed"));
        assert!(display.contains("temporary"));
        assert!(display.contains("client::start_game"));
        assert!(display.contains("game_id: ft09"));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::session_not_found("run_42");
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
        assert!(err.message().contains("run_42"));

        let err = Error::missing_seed_frame("guid-1");
        assert_eq!(err.kind(), ErrorKind::MissingSeedFrame);

        let err = Error::action_unrecognized("ACTION9");
        assert_eq!(err.kind(), ErrorKind::ActionUnrecognized);
        assert!(err.message().contains("ACTION9"));
    }

    #[test]
    fn test_set_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::new(ErrorKind::FileNotFound, "frames.json not found").set_source(io_err);

        assert!(err.source_ref().is_some());
    }
}
