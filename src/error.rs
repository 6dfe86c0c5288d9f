//! Error types for the pub/sub connection pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Lower-level operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rpc_pubsub_pool::{Result, Error};
//!
//! async fn example(monitor: &ConnectionMonitor) -> Result<()> {
//!     monitor.connect().await?;
//!     monitor.send_text(frame).await?;
//!     Ok(())
//! }
//! ```
//!
//! Socket faults never surface here: the monitor absorbs them as circuit
//! breaker failures. The pool reports failures through sentinel values.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotReady`], [`Error::MonitorStopped`] |
//! | External | [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`PoolBuilder::build`](crate::PoolBuilder::build) when an
    /// option is out of range.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint is not a usable WebSocket URL.
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Socket could not be opened.
    ///
    /// Returned when the socket fails before the open handshake completes.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Socket closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The monitor's socket is not open.
    #[error("Socket for {url} is not open")]
    NotReady {
        /// Endpoint of the monitor that was asked to send.
        url: String,
    },

    /// The monitor task has terminated (pool shut down).
    #[error("Connection monitor stopped")]
    MonitorStopped,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a not-ready error.
    #[inline]
    pub fn not_ready(url: impl Into<String>) -> Self {
        Self::NotReady { url: url.into() }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::NotReady { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
