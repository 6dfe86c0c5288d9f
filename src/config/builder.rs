//! Builder pattern for pool configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionPool`]
//! instances. Message handlers are registered here, before any socket
//! exists, so no inbound frame can arrive unobserved.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rpc_pubsub_pool::ConnectionPool;
//!
//! # fn example() -> rpc_pubsub_pool::Result<()> {
//! let pool = ConnectionPool::builder("wss://api.mainnet-beta.solana.com")
//!     .max_connections(3)
//!     .max_subscriptions(200)
//!     .recovery_timeout(Duration::from_secs(60))
//!     .on_message(|_frame| Ok(()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{
    ConnectionPool, Connector, HandlerResult, MessageHandler, WsConnector,
};

use super::options::{MonitorOptions, PoolOptions, RegistryOptions};

// ============================================================================
// PoolBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionPool`].
///
/// Use [`ConnectionPool::builder()`] to create a new builder.
pub struct PoolBuilder {
    /// Endpoint every monitor connects to.
    endpoint: String,
    /// Pool, monitor and registry settings.
    options: PoolOptions,
    /// Inbound frame handlers, in delivery order.
    handlers: Vec<MessageHandler>,
    /// Transport override (defaults to [`WsConnector`]).
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .field("handlers", &self.handlers.len())
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// PoolBuilder Implementation
// ============================================================================

impl PoolBuilder {
    /// Creates a builder for `endpoint` with default options.
    #[inline]
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            options: PoolOptions::default(),
            handlers: Vec::new(),
            connector: None,
        }
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the maximum number of physical connections.
    #[inline]
    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.options.max_connections = max_connections;
        self
    }

    /// Sets the registry capacity.
    #[inline]
    #[must_use]
    pub fn max_subscriptions(mut self, max_subscriptions: usize) -> Self {
        self.options.registry.max_subscriptions = max_subscriptions;
        self
    }

    /// Sets the share of records evicted when the registry is full.
    #[inline]
    #[must_use]
    pub fn cleanup_ratio(mut self, cleanup_ratio: f64) -> Self {
        self.options.registry.cleanup_ratio = cleanup_ratio;
        self
    }

    /// Sets the failures needed to open a monitor's circuit breaker.
    #[inline]
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.options.monitor.failure_threshold = threshold;
        self
    }

    /// Sets how long an open breaker suppresses connection attempts.
    #[inline]
    #[must_use]
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.options.monitor.recovery_timeout = timeout;
        self
    }

    /// Sets the base and maximum reconnect delays.
    #[inline]
    #[must_use]
    pub fn backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.options.monitor.base_delay = base_delay;
        self.options.monitor.max_delay = max_delay;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.options.monitor.ping_interval = interval;
        self
    }

    /// Sets how many reconnect attempts a monitor makes before giving up.
    #[inline]
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.options.monitor.max_retries = max_retries;
        self
    }

    /// Replaces the monitor settings.
    #[inline]
    #[must_use]
    pub fn monitor_options(mut self, monitor: MonitorOptions) -> Self {
        self.options.monitor = monitor;
        self
    }

    /// Replaces the registry settings.
    #[inline]
    #[must_use]
    pub fn registry_options(mut self, registry: RegistryOptions) -> Self {
        self.options.registry = registry;
        self
    }

    /// Sets the pause between replayed subscribe requests.
    #[inline]
    #[must_use]
    pub fn replay_interval(mut self, interval: Duration) -> Self {
        self.options.replay_interval = interval;
        self
    }

    /// Registers an inbound frame handler.
    ///
    /// Handlers run in registration order for every frame from every
    /// connection. An error or panic in one handler is logged and does not
    /// stop delivery to the others.
    #[inline]
    #[must_use]
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[u8]) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Uses a custom transport instead of [`WsConnector`].
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the pool with validation.
    ///
    /// No connection is opened until the first subscribe.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if any option is out of range
    pub fn build(self) -> Result<ConnectionPool> {
        self.validate_endpoint()?;
        self.options.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new()));

        Ok(ConnectionPool::from_parts(
            self.endpoint,
            self.options,
            connector,
            self.handlers,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolBuilder {
    /// Validates the endpoint URL.
    fn validate_endpoint(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::invalid_endpoint(&self.endpoint, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(Error::invalid_endpoint(
                &self.endpoint,
                format!("scheme must be ws or wss, got {other}"),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
