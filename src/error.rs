//! Error types for tui_stepcheck.
//!
//! Two layers of errors exist:
//!
//! - [`SessionError`] covers everything that can go wrong while driving the
//!   virtual terminal (PTY allocation, spawn, I/O, timeouts). A [`Gateway`]
//!   reports failures with this type.
//! - [`StepError`] is what running a single Step produces. Gateway failures are
//!   wrapped unchanged in [`StepError::Gateway`].
//!
//! # Examples
//!
//! ```rust
//! use tui_stepcheck::{SessionError, StepError};
//!
//! let err: StepError = SessionError::Timeout { timeout_ms: 5000 }.into();
//! match err {
//!     StepError::Gateway(SessionError::Timeout { timeout_ms }) => {
//!         assert_eq!(timeout_ms, 5000);
//!     }
//!     other => panic!("unexpected: {other}"),
//! }
//! ```
//!
//! [`Gateway`]: crate::Gateway

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result type alias for Step-level operations.
pub type Result<T> = std::result::Result<T, StepError>;

/// Result type alias for Gateway and session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while running one Step.
///
/// Every variant is fatal to the Step that produced it. None of them is retried.
#[derive(Debug, Error)]
pub enum StepError {
    /// The caller described the Step incorrectly, for example without a
    /// verification mode.
    ///
    /// This is a bug in the test definition, not a runtime condition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The Gateway failed to capture output or timed out.
    #[error("Gateway error: {0}")]
    Gateway(#[from] SessionError),

    /// A fixture needed for exact comparison could not be loaded.
    #[error("Failed to load fixture '{}': {source}", path.display())]
    FixtureLoad {
        /// Path of the fixture file.
        path: PathBuf,
        /// Why the load failed.
        #[source]
        source: FixtureLoadError,
    },

    /// A regenerated fixture could not be written.
    #[error("Failed to save fixture '{}': {source}", path.display())]
    FixtureSave {
        /// Path of the fixture file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The captured output did not satisfy the Step's assertions.
    ///
    /// The message carries the full diagnostic: a unified diff for fixture
    /// comparisons, or the missing/forbidden strings for substring checks.
    #[error("Assertion mismatch:\n{0}")]
    AssertionMismatch(String),
}

/// Reasons a fixture could not be loaded.
#[derive(Debug, Error)]
pub enum FixtureLoadError {
    /// No fixture exists for the identity.
    #[error("fixture not found")]
    NotFound,

    /// The fixture exists but is not a valid record.
    #[error("malformed fixture: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The fixture exists but could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while driving the virtual terminal.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Error from PTY (pseudo-terminal) operations.
    #[error("PTY error: {0}")]
    Pty(String),

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The termination marker did not appear in time.
    #[error("Timeout waiting for condition after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Process spawn failed.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// A process is already running in the terminal.
    #[error("Process is already running")]
    ProcessAlreadyRunning,

    /// The child process terminated while output was still expected.
    #[error("Child process has exited")]
    ProcessExited,

    /// Invalid terminal dimensions.
    #[error("Invalid terminal dimensions: width={width}, height={height}")]
    InvalidDimensions {
        /// Terminal width in columns.
        width: u16,
        /// Terminal height in rows.
        height: u16,
    },

    /// The session was used after `close()`.
    #[error("Session is closed")]
    Closed,
}

// portable-pty reports its errors through anyhow
impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        SessionError::Pty(err.to_string())
    }
}
