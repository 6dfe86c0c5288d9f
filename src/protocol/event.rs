//! Socket event types.
//!
//! A transport reports everything that happens on a socket as one of these
//! events. The owning monitor receives them from a channel and handles them
//! one at a time.
//!
//! # Event Types
//!
//! | Event | Raised when |
//! |-------|-------------|
//! | `Opened` | Handshake completed |
//! | `Closed` | Socket closed (by either side, or after a failed handshake) |
//! | `Errored` | Transport fault; normally followed by `Closed` |
//! | `Message` | Inbound text or binary frame |
//! | `LivenessResponse` | Reply to a liveness probe (ws Pong) |

// ============================================================================
// Imports
// ============================================================================

use tokio_tungstenite::tungstenite::Bytes;

// ============================================================================
// Constants
// ============================================================================

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// SocketEvent
// ============================================================================

/// An event raised by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket finished its open handshake.
    Opened,

    /// The socket closed.
    Closed {
        /// WebSocket close code.
        code: u16,
    },

    /// The socket faulted.
    Errored {
        /// Human-readable cause.
        cause: String,
    },

    /// An inbound frame, forwarded raw.
    Message {
        /// Frame payload.
        bytes: Bytes,
    },

    /// The endpoint answered a liveness probe.
    LivenessResponse,
}

impl SocketEvent {
    /// Creates a closed event.
    #[inline]
    #[must_use]
    pub const fn closed(code: u16) -> Self {
        Self::Closed { code }
    }

    /// Creates an errored event.
    #[inline]
    #[must_use]
    pub fn errored(cause: impl Into<String>) -> Self {
        Self::Errored {
            cause: cause.into(),
        }
    }

    /// Creates a message event.
    #[inline]
    #[must_use]
    pub fn message(bytes: impl Into<Bytes>) -> Self {
        Self::Message {
            bytes: bytes.into(),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed { .. } => "closed",
            Self::Errored { .. } => "errored",
            Self::Message { .. } => "message",
            Self::LivenessResponse => "liveness_response",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
