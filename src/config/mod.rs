//! Pool configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PoolBuilder`] | Fluent builder, validates and creates a pool |
//! | [`PoolOptions`] | Pool-level settings |
//! | [`MonitorOptions`] | Breaker, backoff and heartbeat settings |
//! | [`RegistryOptions`] | Registry capacity settings |
//!
//! # Example
//!
//! ```no_run
//! use rpc_pubsub_pool::{ConnectionPool, Result};
//!
//! # async fn example() -> Result<()> {
//! let pool = ConnectionPool::builder("wss://api.devnet.solana.com")
//!     .max_connections(2)
//!     .on_message(|frame| {
//!         println!("{}", String::from_utf8_lossy(frame));
//!         Ok(())
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for connection pools.
pub mod builder;

/// Option structs and defaults.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::PoolBuilder;
pub use options::{MonitorOptions, PoolOptions, RegistryOptions};
