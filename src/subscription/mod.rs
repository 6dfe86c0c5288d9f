//! Subscription tracking.
//!
//! The pool records every subscribe request it sends so it can replay them
//! after a socket reconnects.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Capacity-bounded record store with oldest-first eviction |

// ============================================================================
// Submodules
// ============================================================================

/// Capacity-bounded subscription store.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{SubscriptionRecord, SubscriptionRegistry};
