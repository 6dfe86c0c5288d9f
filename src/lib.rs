//! RPC pub/sub pool - Self-healing WebSocket connections for JSON-RPC subscriptions.
//!
//! This library keeps a bounded set of WebSocket connections to one JSON-RPC
//! pub/sub endpoint alive and spreads subscriptions across them.
//!
//! # Architecture
//!
//! - **Pool**: creates up to `max_connections` monitors, picks one round-robin
//!   per subscribe, and fans every inbound frame out to registered handlers
//! - **Monitor**: owns one socket; circuit breaker, jittered exponential
//!   backoff and a ping heartbeat keep it alive
//! - **Registry**: remembers every issued subscription so a reconnected socket
//!   can replay them
//!
//! Key design principles:
//!
//! - Each [`ConnectionMonitor`] is an actor: one task handles its socket
//!   events and timers one at a time
//! - Message handlers are bound at construction, before any socket opens
//! - Socket faults never surface as errors; `subscribe` reports failure as `None`
//!
//! # Quick Start
//!
//! ```no_run
//! use rpc_pubsub_pool::{ConnectionPool, Result, SubscriptionMethod};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pool = ConnectionPool::builder("wss://api.devnet.solana.com")
//!         .max_connections(2)
//!         .on_message(|frame| {
//!             println!("{}", String::from_utf8_lossy(frame));
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     match pool.subscribe(SubscriptionMethod::SlotSubscribe, vec![]).await {
//!         Some(id) => println!("Subscribed: {id}"),
//!         None => println!("Connection not ready"),
//!     }
//!
//!     pool.close_all();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Builder and option structs |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelope and socket events |
//! | [`subscription`] | Bounded subscription registry |
//! | [`transport`] | Sockets, monitors and the pool |

// ============================================================================
// Modules
// ============================================================================

/// Pool configuration.
///
/// Use [`ConnectionPool::builder()`] to create a configured pool.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// JSON-RPC envelope and socket event types.
pub mod protocol;

/// Subscription tracking.
pub mod subscription;

/// Connection transport layer.
///
/// Socket abstraction, connection monitors and the pool.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{MonitorOptions, PoolBuilder, PoolOptions, RegistryOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MonitorId, SubscriptionId};

// Protocol types
pub use protocol::{SocketEvent, SubscribeRequest, SubscriptionMethod};

// Subscription types
pub use subscription::{SubscriptionRecord, SubscriptionRegistry};

// Transport types
pub use transport::{
    BreakerState, ConnectionMonitor, ConnectionPool, Connector, EventSink, HandlerResult,
    MessageHandler, MonitorStatus, Socket, WsConnector,
};
