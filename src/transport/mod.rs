//! Connection transport layer.
//!
//! Everything between a pool and the endpoint: sockets, the per-socket
//! resilience unit and the pool itself.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐      ┌───────────────────┐      ┌───────────┐
//! │ ConnectionPool │─────►│ ConnectionMonitor │─────►│ Connector │──► ws / wss
//! │  (round-robin) │      │  breaker/backoff  │      │ (Socket)  │
//! └────────────────┘      │  heartbeat        │      └───────────┘
//!                         └───────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `breaker` | Circuit breaker and backoff policy |
//! | `connector` | tokio-tungstenite socket transport |
//! | `monitor` | Self-healing connection actor |
//! | `pool` | Bounded connection pool and subscription replay |
//! | `socket` | Transport traits and event sink |

// ============================================================================
// Submodules
// ============================================================================

/// Circuit breaker and reconnect backoff.
pub mod breaker;

/// WebSocket transport.
pub mod connector;

/// Per-socket resilience unit.
pub mod monitor;

/// Connection pool.
pub mod pool;

/// Transport abstraction.
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use breaker::{Admission, Backoff, BreakerState, CircuitBreaker};
pub use connector::WsConnector;
pub use monitor::{ConnectionMonitor, FrameHandler, MonitorStatus, ReconnectHook};
pub use pool::{ConnectionPool, HandlerError, HandlerResult, MessageHandler};
pub use socket::{Connector, EventSink, Socket};
