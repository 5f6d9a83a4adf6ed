//! Error types for the BiDi client core.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bidi_webdriver::{Result, Driver};
//!
//! async fn example(driver: &Driver) -> Result<()> {
//!     driver.execute("session.status", serde_json::json!({}), None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Transport | [`Error::StartupTimeout`], [`Error::NotStarted`], [`Error::AlreadyStarted`], [`Error::SendContention`], [`Error::ConnectionAborted`] |
//! | Command | [`Error::CommandTimeout`], [`Error::CommandFailed`], [`Error::SessionClosed`], [`Error::IdExhausted`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Io`] |
//!
//! Protocol violations on the inbound path (malformed JSON, unknown message
//! type, response with no pending command) are logged and dropped by the
//! dispatcher; they never surface here and never fail the session.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The remote end never became reachable during `start`.
    ///
    /// Covers the whole retry loop: the wall clock ran out before any
    /// connect attempt succeeded.
    #[error("startup timed out after {timeout_ms}ms")]
    StartupTimeout {
        /// Milliseconds budgeted across all connect attempts.
        timeout_ms: u64,
    },

    /// Operation requires a live socket but none is open.
    #[error("transport not started")]
    NotStarted,

    /// `start` was called while the socket is already active.
    #[error("transport already started")]
    AlreadyStarted,

    /// The outbound send mutex could not be acquired in time.
    ///
    /// Another sender held the socket for longer than the data timeout.
    #[error("send contention: mutex not acquired within {timeout_ms}ms")]
    SendContention {
        /// Milliseconds waited for the send mutex.
        timeout_ms: u64,
    },

    /// The connection ended without a close handshake.
    #[error("connection aborted: {message}")]
    ConnectionAborted {
        /// Description of the abort.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// No response arrived before the command's deadline.
    ///
    /// The pending slot is removed when this fires; a late response is
    /// logged and dropped.
    #[error("command {method} timed out after {timeout_ms}ms")]
    CommandTimeout {
        /// Method name of the timed-out command.
        method: String,
        /// Milliseconds waited before the deadline.
        timeout_ms: u64,
    },

    /// The remote end answered with an error response.
    #[error("command failed: {error}: {message}")]
    CommandFailed {
        /// Protocol error code (e.g. `"invalid argument"`).
        error: String,
        /// Human-readable message from the remote end.
        message: String,
        /// Remote-end stack trace, when provided.
        stacktrace: Option<String>,
    },

    /// The session was stopped while the command was in flight,
    /// or an operation was attempted after the session stopped.
    #[error("session closed")]
    SessionClosed,

    /// The command id counter reached its ceiling.
    ///
    /// Ids are never wrapped or reused.
    #[error("command id space exhausted")]
    IdExhausted,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a startup timeout error.
    #[inline]
    #[must_use]
    pub fn startup_timeout(budget: Duration) -> Self {
        Self::StartupTimeout {
            timeout_ms: budget.as_millis() as u64,
        }
    }

    /// Creates a send contention error.
    #[inline]
    #[must_use]
    pub fn send_contention(waited: Duration) -> Self {
        Self::SendContention {
            timeout_ms: waited.as_millis() as u64,
        }
    }

    /// Creates a connection aborted error.
    #[inline]
    pub fn connection_aborted(message: impl Into<String>) -> Self {
        Self::ConnectionAborted {
            message: message.into(),
        }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(method: impl Into<String>, deadline: Duration) -> Self {
        Self::CommandTimeout {
            method: method.into(),
            timeout_ms: deadline.as_millis() as u64,
        }
    }

    /// Creates a command failed error from an error response.
    #[inline]
    pub fn command_failed(
        error: impl Into<String>,
        message: impl Into<String>,
        stacktrace: Option<String>,
    ) -> Self {
        Self::CommandFailed {
            error: error.into(),
            message: message.into(),
            stacktrace,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::StartupTimeout { .. } | Self::SendContention { .. } | Self::CommandTimeout { .. }
        )
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::StartupTimeout { .. }
                | Self::NotStarted
                | Self::AlreadyStarted
                | Self::SendContention { .. }
                | Self::ConnectionAborted { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the error came from the remote end.
    #[inline]
    #[must_use]
    pub fn is_remote_error(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }

    /// Returns `true` if the session is gone and retrying is pointless.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionClosed | Self::IdExhausted | Self::ConnectionAborted { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
