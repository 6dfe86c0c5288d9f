//! Type-safe identifiers for pool entities.
//!
//! Newtype wrappers keep request identifiers and monitor identifiers from
//! being mixed up at compile time.
//!
//! | Type | Wire form | Source |
//! |------|-----------|--------|
//! | [`SubscriptionId`] | JSON integer (`id` field) | [`IdSequence`] per pool |
//! | [`MonitorId`] | not sent | process-wide counter |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// SubscriptionId
// ============================================================================

/// Caller-visible identifier of a subscription request.
///
/// Sent as the JSON-RPC `id` of the subscribe request and reused verbatim
/// when the request is replayed after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubscriptionId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// IdSequence
// ============================================================================

/// Monotonic source of [`SubscriptionId`]s.
///
/// Starts at 1. Concurrent callers always receive distinct values.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    /// Creates a sequence whose first value is 1.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next identifier.
    #[inline]
    pub fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MonitorId
// ============================================================================

/// Global counter for monitor identifiers.
static MONITOR_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Identifies a connection monitor in logs and status snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(u32);

impl MonitorId {
    /// Allocates the next process-wide monitor identifier.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(MONITOR_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
