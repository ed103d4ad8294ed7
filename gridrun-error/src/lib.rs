//! # gridrun-error
//!
//! Unified error handling for gridrun - following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., SessionNotFound, RemoteApiFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use gridrun_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::SessionNotFound, "session 'run_3f' not found")
//!         .with_operation("orchestrator::start_stream")
//!         .with_context("session_id", "run_3f")
//!         .with_context("game_id", "ls20"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, gridrun_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using gridrun Error
pub type Result<T> = std::result::Result<T, Error>;
