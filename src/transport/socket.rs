//! Socket abstraction between connection monitors and the wire.
//!
//! A [`Connector`] opens sockets; each open returns a [`Socket`] handle for
//! outbound traffic and reports everything else through an [`EventSink`].
//!
//! # Generations
//!
//! Every socket a monitor opens gets a new generation number. The sink tags
//! each event with it so the monitor can drop late events from a socket it
//! already replaced.
//!
//! ```text
//! Monitor ──open(url, sink#3)──► Connector ──spawn──► transport task
//!    ▲                                                     │
//!    └──────────── (3, SocketEvent) ◄──────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::SocketEvent;

// ============================================================================
// Types
// ============================================================================

/// Event tagged with the generation of the socket that raised it.
pub(crate) type TaggedEvent = (u64, SocketEvent);

// ============================================================================
// Socket
// ============================================================================

/// Outbound half of an open (or opening) socket.
///
/// All methods are non-blocking: they queue work for the transport.
pub trait Socket: Send + Sync {
    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if
    /// the transport has already shut down.
    fn send_text(&self, text: String) -> Result<()>;

    /// Queues a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if
    /// the transport has already shut down.
    fn ping(&self) -> Result<()>;

    /// Starts a graceful close.
    fn close(&self);

    /// Drops the connection immediately, without a close handshake.
    fn terminate(&self);
}

// ============================================================================
// Connector
// ============================================================================

/// Opens sockets for connection monitors.
///
/// `open` must return without waiting for the handshake. The outcome is
/// reported later through `events`: [`SocketEvent::Opened`] on success, or
/// [`SocketEvent::Errored`] / [`SocketEvent::Closed`] on failure.
pub trait Connector: Send + Sync + 'static {
    /// Starts opening a socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot even be constructed (for
    /// example a malformed URL). The monitor counts this as a failure.
    fn open(&self, url: &str, events: EventSink) -> Result<Arc<dyn Socket>>;
}

// ============================================================================
// EventSink
// ============================================================================

/// Delivers socket events to the owning monitor.
#[derive(Debug, Clone)]
pub struct EventSink {
    /// Generation of the socket this sink belongs to.
    generation: u64,
    /// Monitor's event channel.
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    /// Creates a sink for one socket generation.
    #[inline]
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Returns the socket generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sends an event to the monitor.
    ///
    /// Returns `false` if the monitor has stopped.
    #[inline]
    pub fn emit(&self, event: SocketEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    /// Returns `true` if the monitor has stopped listening.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        assert!(sink.emit(SocketEvent::Opened));
        assert_eq!(rx.try_recv().unwrap(), (7, SocketEvent::Opened));
        assert_eq!(sink.generation(), 7);
    }

    #[test]
    fn test_sink_reports_closed_monitor() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        drop(rx);

        assert!(sink.is_closed());
        assert!(!sink.emit(SocketEvent::LivenessResponse));
    }
}
