//! Connection pool for pub/sub subscriptions.
//!
//! Spreads subscriptions over a bounded set of [`ConnectionMonitor`]s and
//! tracks every subscription it issued, so a monitor that reconnects can
//! replay them onto its new socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ConnectionPool                 │
//! │                                              │
//! │  subscribe ──► round-robin ──► Monitor 1 ─┐  │
//! │                             ─► Monitor 2 ─┼──┼──► endpoint
//! │                             ─► Monitor 3 ─┘  │
//! │                                   │          │
//! │  SubscriptionRegistry ◄── replay ─┘          │
//! │  handlers[] ◄── fan-out ◄── inbound frames   │
//! └──────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{PoolBuilder, PoolOptions};
use crate::identifiers::{IdSequence, MonitorId, SubscriptionId};
use crate::protocol::SubscribeRequest;
use crate::subscription::{SubscriptionRecord, SubscriptionRegistry};

use super::monitor::{ConnectionMonitor, FrameHandler, ReconnectHook};
use super::socket::{Connector, Socket};

// ============================================================================
// Types
// ============================================================================

/// Error a message handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a message handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Handler receiving every inbound frame from every pooled connection.
///
/// Frames are passed raw; interpreting them is up to the handler.
pub type MessageHandler = Arc<dyn Fn(&[u8]) -> HandlerResult + Send + Sync>;

/// Monitors plus the round-robin cursor.
#[derive(Debug, Default)]
struct Slots {
    monitors: Vec<ConnectionMonitor>,
    cursor: usize,
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Bounded pool of self-healing connections to one endpoint.
///
/// Connections are created lazily, one per [`get_connection`] call, until
/// `max_connections` exist; after that calls rotate over them. Selection is
/// round-robin only, so a connection that is reconnecting can be picked and
/// the subscribe on it fails.
///
/// Dropping the pool (and every monitor handle obtained from it) stops all
/// monitors.
///
/// # Example
///
/// ```no_run
/// use rpc_pubsub_pool::{ConnectionPool, SubscriptionMethod};
/// use serde_json::json;
///
/// # async fn example() -> rpc_pubsub_pool::Result<()> {
/// let pool = ConnectionPool::builder("wss://api.devnet.solana.com")
///     .on_message(|frame| {
///         println!("{}", String::from_utf8_lossy(frame));
///         Ok(())
///     })
///     .build()?;
///
/// if let Some(id) = pool.subscribe(SubscriptionMethod::SlotSubscribe, vec![]).await {
///     println!("subscribed as {id}");
/// }
///
/// let account = json!("Vote111111111111111111111111111111111111111");
/// let _ = pool.subscribe("accountSubscribe", vec![account]).await;
/// # Ok(())
/// # }
/// ```
///
/// [`get_connection`]: Self::get_connection
pub struct ConnectionPool {
    /// Endpoint every monitor connects to.
    endpoint: Arc<str>,

    /// Pool settings.
    options: PoolOptions,

    /// Opens sockets for new monitors.
    connector: Arc<dyn Connector>,

    /// Active monitors and the selection cursor.
    slots: Mutex<Slots>,

    /// Subscriptions issued through this pool.
    registry: Arc<Mutex<SubscriptionRegistry>>,

    /// Fan-out over the registered message handlers.
    on_message: FrameHandler,

    /// Replays the registry on reconnect.
    on_reconnect: Arc<dyn ReconnectHook>,

    /// Request identifier source.
    ids: IdSequence,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoint", &self.endpoint)
            .field("connections", &self.connection_count())
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool {
    /// Creates a builder for a pool connecting to `endpoint`.
    #[inline]
    #[must_use]
    pub fn builder(endpoint: impl Into<String>) -> PoolBuilder {
        PoolBuilder::new(endpoint)
    }

    /// Assembles a pool from validated parts.
    pub(crate) fn from_parts(
        endpoint: String,
        options: PoolOptions,
        connector: Arc<dyn Connector>,
        handlers: Vec<MessageHandler>,
    ) -> Self {
        let registry = Arc::new(Mutex::new(SubscriptionRegistry::new(options.registry)));

        let on_reconnect: Arc<dyn ReconnectHook> = Arc::new(Resubscriber {
            registry: Arc::clone(&registry),
            interval: options.replay_interval,
        });

        debug!(
            endpoint = %endpoint,
            max_connections = options.max_connections,
            handlers = handlers.len(),
            "ConnectionPool created"
        );

        Self {
            endpoint: endpoint.into(),
            options,
            connector,
            slots: Mutex::new(Slots::default()),
            registry,
            on_message: fan_out(handlers.into()),
            on_reconnect,
            ids: IdSequence::new(),
        }
    }
}

// ============================================================================
// ConnectionPool - Accessors
// ============================================================================

impl ConnectionPool {
    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the pool settings.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Returns the number of monitors created so far.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.slots.lock().monitors.len()
    }

    /// Returns handles to every monitor, in creation order.
    #[must_use]
    pub fn monitors(&self) -> Vec<ConnectionMonitor> {
        self.slots.lock().monitors.clone()
    }

    /// Returns the number of tracked subscriptions.
    #[inline]
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns a snapshot of the tracked subscriptions, oldest first.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.registry.lock().get_active()
    }
}

// ============================================================================
// ConnectionPool - Operations
// ============================================================================

impl ConnectionPool {
    /// Returns a monitor for the next request.
    ///
    /// While fewer than `max_connections` monitors exist, creates one and
    /// waits for its first connection attempt. A failed attempt is logged;
    /// the monitor is returned anyway and keeps reconnecting in the
    /// background. Once the pool is full, rotates over existing monitors.
    pub async fn get_connection(&self) -> ConnectionMonitor {
        // Capacity check and round-robin pick share one critical section.
        let (monitor, total) = {
            let mut slots = self.slots.lock();

            if slots.monitors.len() >= self.options.max_connections {
                let index = slots.cursor % slots.monitors.len();
                slots.cursor = (index + 1) % slots.monitors.len();
                return slots.monitors[index].clone();
            }

            let monitor = ConnectionMonitor::spawn(
                Arc::clone(&self.endpoint),
                self.options.monitor,
                Arc::clone(&self.connector),
                Arc::clone(&self.on_message),
                Arc::clone(&self.on_reconnect),
            );
            slots.monitors.push(monitor.clone());
            (monitor, slots.monitors.len())
        };

        info!(monitor = %monitor.id(), total, "Opened pooled connection");
        if let Err(e) = monitor.connect().await {
            warn!(monitor = %monitor.id(), error = %e, "Initial connection attempt failed");
        }
        monitor
    }

    /// Subscribes to `method` on the next connection.
    ///
    /// Returns the request identifier, or `None` if the chosen connection
    /// is not open or the send failed. Nothing is queued or retried, and a
    /// failed subscribe leaves the registry untouched.
    pub async fn subscribe(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Option<SubscriptionId> {
        let method = method.into();
        let monitor = self.get_connection().await;

        if !monitor.is_open() {
            warn!(monitor = %monitor.id(), method = %method, "Connection not open, subscribe dropped");
            return None;
        }

        let id = self.ids.next_id();
        let frame = match SubscribeRequest::new(id, &method, &params).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(%id, method = %method, error = %e, "Failed to encode subscribe request");
                return None;
            }
        };

        if let Err(e) = monitor.send_text(frame).await {
            warn!(monitor = %monitor.id(), %id, method = %method, error = %e, "Subscribe send failed");
            return None;
        }

        debug!(monitor = %monitor.id(), %id, method = %method, "Subscribed");
        self.registry.lock().add_subscription(id, method, params);
        Some(id)
    }

    /// Stops tracking `id`, so it is no longer replayed on reconnect.
    ///
    /// Sends nothing to the endpoint. Returns `false` if `id` was not tracked.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.lock().remove_subscription(id)
    }

    /// Closes every connection and forgets every subscription.
    ///
    /// Pending reconnects, heartbeats and replays are cancelled. The pool
    /// can be used again afterwards; it starts from zero connections.
    pub fn close_all(&self) {
        let monitors = {
            let mut slots = self.slots.lock();
            slots.cursor = 0;
            std::mem::take(&mut slots.monitors)
        };

        for monitor in &monitors {
            monitor.close();
        }

        self.registry.lock().clear_all();

        info!(
            endpoint = %self.endpoint,
            closed = monitors.len(),
            "All pooled connections closed"
        );
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Builds the frame handler shared by every monitor.
///
/// Each handler is isolated: its error or panic is logged and the next
/// handler still runs.
fn fan_out(handlers: Arc<[MessageHandler]>) -> FrameHandler {
    Arc::new(move |bytes: &[u8]| {
        for (index, handler) in handlers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(bytes))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(handler = index, error = %e, "Message handler failed");
                }
                Err(_) => {
                    error!(handler = index, "Message handler panicked");
                }
            }
        }
    })
}

// ============================================================================
// Resubscriber
// ============================================================================

/// Reconnect hook replaying every tracked subscription.
struct Resubscriber {
    registry: Arc<Mutex<SubscriptionRegistry>>,
    /// Pause between two replayed requests.
    interval: Duration,
}

#[async_trait]
impl ReconnectHook for Resubscriber {
    async fn on_reconnect(&self, monitor: MonitorId, socket: Arc<dyn Socket>) {
        let records = self.registry.lock().get_active();
        if records.is_empty() {
            return;
        }

        info!(%monitor, count = records.len(), "Replaying subscriptions");

        let mut replayed = 0usize;
        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                sleep(self.interval).await;
            }

            let sent = SubscribeRequest::from_record(record)
                .to_frame()
                .and_then(|frame| socket.send_text(frame));

            match sent {
                Ok(()) => replayed += 1,
                Err(e) => warn!(
                    %monitor,
                    id = %record.id,
                    method = %record.method,
                    error = %e,
                    "Failed to replay subscription"
                ),
            }
        }

        info!(%monitor, replayed, total = records.len(), "Subscription replay finished");
    }
}

// ============================================================================
// Tests
// ============================================================================
