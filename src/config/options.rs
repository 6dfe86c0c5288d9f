//! Tuning options for monitors, the registry and the pool.
//!
//! Every option has a default, so only the endpoint is mandatory.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use rpc_pubsub_pool::{MonitorOptions, PoolOptions};
//!
//! let options = PoolOptions::new()
//!     .with_max_connections(2)
//!     .with_monitor(MonitorOptions::new().with_failure_threshold(3));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default number of physical connections per pool.
pub const DEFAULT_MAX_CONNECTIONS: usize = 3;

/// Default registry capacity when the registry is used on its own.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 100;

/// Default registry capacity of a pool.
pub const DEFAULT_POOL_SUBSCRIPTIONS: usize = 200;

/// Default share of records evicted when the registry is full.
pub const DEFAULT_CLEANUP_RATIO: f64 = 0.1;

/// Default failures before the circuit breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time the breaker stays open.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default first backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default backoff cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default heartbeat period.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default upper bound of the random jitter added to each backoff delay.
pub const DEFAULT_JITTER_MAX: Duration = Duration::from_millis(1000);

/// Default pause between replayed subscribe requests.
pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// MonitorOptions
// ============================================================================

/// Circuit breaker, backoff and heartbeat settings for one connection monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Failures before the breaker opens.
    pub failure_threshold: u32,

    /// How long an open breaker suppresses connection attempts.
    pub recovery_timeout: Duration,

    /// Backoff delay of the first retry.
    pub base_delay: Duration,

    /// Cap on the exponential backoff delay (before jitter).
    pub max_delay: Duration,

    /// Heartbeat period.
    pub ping_interval: Duration,

    /// Reconnect attempts before the monitor gives up.
    pub max_retries: u32,

    /// Upper bound of the uniform jitter added to each backoff delay.
    pub jitter_max: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            ping_interval: DEFAULT_PING_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            jitter_max: DEFAULT_JITTER_MAX,
        }
    }

    /// Sets the failure threshold.
    #[inline]
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the recovery timeout.
    #[inline]
    #[must_use]
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the base and maximum backoff delays.
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the retry limit.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the jitter bound. `Duration::ZERO` disables jitter.
    #[inline]
    #[must_use]
    pub fn with_jitter_max(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::config("failure_threshold must be at least 1"));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::config(format!(
                "base_delay ({}ms) must not exceed max_delay ({}ms)",
                self.base_delay.as_millis(),
                self.max_delay.as_millis()
            )));
        }
        if self.ping_interval.is_zero() {
            return Err(Error::config("ping_interval must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// RegistryOptions
// ============================================================================

/// Capacity settings for the subscription registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryOptions {
    /// Maximum number of tracked subscriptions.
    pub max_subscriptions: usize,

    /// Share of records evicted (oldest first) when the registry is full.
    pub cleanup_ratio: f64,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            max_subscriptions: DEFAULT_REGISTRY_CAPACITY,
            cleanup_ratio: DEFAULT_CLEANUP_RATIO,
        }
    }
}

impl RegistryOptions {
    /// Creates options with the given capacity and the default cleanup ratio.
    #[inline]
    #[must_use]
    pub fn with_capacity(max_subscriptions: usize) -> Self {
        Self {
            max_subscriptions,
            ..Default::default()
        }
    }

    /// Sets the cleanup ratio.
    #[inline]
    #[must_use]
    pub fn with_cleanup_ratio(mut self, cleanup_ratio: f64) -> Self {
        self.cleanup_ratio = cleanup_ratio;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_subscriptions == 0 {
            return Err(Error::config("max_subscriptions must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.cleanup_ratio) {
            return Err(Error::config(format!(
                "cleanup_ratio must be within 0.0..=1.0, got {}",
                self.cleanup_ratio
            )));
        }
        Ok(())
    }
}

// ============================================================================
// PoolOptions
// ============================================================================

/// Settings for a connection pool and everything it owns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolOptions {
    /// Maximum number of physical connections.
    pub max_connections: usize,

    /// Pause between replayed subscribe requests.
    pub replay_interval: Duration,

    /// Settings for each connection monitor.
    pub monitor: MonitorOptions,

    /// Settings for the shared registry.
    pub registry: RegistryOptions,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            replay_interval: DEFAULT_REPLAY_INTERVAL,
            monitor: MonitorOptions::default(),
            registry: RegistryOptions::with_capacity(DEFAULT_POOL_SUBSCRIPTIONS),
        }
    }
}

impl PoolOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of connections.
    #[inline]
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Sets the replay pacing.
    #[inline]
    #[must_use]
    pub fn with_replay_interval(mut self, interval: Duration) -> Self {
        self.replay_interval = interval;
        self
    }

    /// Replaces the monitor settings.
    #[inline]
    #[must_use]
    pub fn with_monitor(mut self, monitor: MonitorOptions) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replaces the registry settings.
    #[inline]
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryOptions) -> Self {
        self.registry = registry;
        self
    }

    /// Checks the pool settings and the nested monitor and registry settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }
        self.monitor.validate()?;
        self.registry.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
