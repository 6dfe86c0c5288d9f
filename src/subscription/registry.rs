//! Capacity-bounded store of active subscription requests.
//!
//! The registry is what the pool replays onto a socket after it reconnects.
//! It never rejects an insert: when full, it silently evicts the oldest
//! records first.
//!
//! # Eviction
//!
//! ```text
//! capacity = 5, cleanup_ratio = 0.2
//!
//! before insert:  [t1] [t2] [t3] [t4] [t5]      len == capacity
//! evict floor(5 * 0.2) = 1 oldest:  [t1] dropped
//! after insert:   [t2] [t3] [t4] [t5] [t6]
//! ```
//!
//! Records are ordered by `(created_at, insertion sequence)`, so ties on the
//! timestamp are broken by insertion order.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::RegistryOptions;
use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Position of a record in eviction order: `(created_at, sequence)`.
type AgeKey = (u64, u64);

// ============================================================================
// SubscriptionRecord
// ============================================================================

/// A tracked subscription request.
///
/// Records are never rewritten after creation; re-adding an identifier
/// replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRecord {
    /// Caller-visible identifier, reused on replay.
    pub id: SubscriptionId,

    /// Subscription method name.
    pub method: String,

    /// Opaque method params, forwarded verbatim.
    pub params: Vec<Value>,

    /// Creation time in milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

impl SubscriptionRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(id: SubscriptionId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::with_created_at(id, method, params, now_millis())
    }

    /// Creates a record with an explicit creation time.
    #[must_use]
    pub fn with_created_at(
        id: SubscriptionId,
        method: impl Into<String>,
        params: Vec<Value>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            created_at,
        }
    }
}

/// Stored record plus its position in eviction order.
#[derive(Debug)]
struct Entry {
    record: SubscriptionRecord,
    key: AgeKey,
}

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Bounded mapping from [`SubscriptionId`] to [`SubscriptionRecord`].
///
/// `len() <= max_subscriptions` holds after every mutation.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    /// Capacity and cleanup ratio.
    options: RegistryOptions,
    /// Records by identifier.
    records: FxHashMap<SubscriptionId, Entry>,
    /// Identifiers in eviction order (oldest first).
    by_age: BTreeMap<AgeKey, SubscriptionId>,
    /// Insertion counter used as the tie-breaker.
    sequence: u64,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    ///
    /// A capacity of zero is raised to one so every insert can be kept.
    #[must_use]
    pub fn new(mut options: RegistryOptions) -> Self {
        options.max_subscriptions = options.max_subscriptions.max(1);
        Self {
            options,
            records: FxHashMap::default(),
            by_age: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Returns the configured capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.options.max_subscriptions
    }

    /// Returns the number of tracked records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if `id` is tracked.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.records.contains_key(&id)
    }

    /// Returns the record for `id`, if tracked.
    #[inline]
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&SubscriptionRecord> {
        self.records.get(&id).map(|entry| &entry.record)
    }

    /// Tracks a subscription created now.
    ///
    /// Evicts the oldest records first if the registry is full.
    pub fn add_subscription(
        &mut self,
        id: SubscriptionId,
        method: impl Into<String>,
        params: Vec<Value>,
    ) {
        self.insert(SubscriptionRecord::new(id, method, params));
    }

    /// Tracks a prebuilt record.
    ///
    /// An existing record with the same identifier is replaced.
    pub fn insert(&mut self, record: SubscriptionRecord) {
        self.remove_entry(record.id);

        if self.records.len() >= self.options.max_subscriptions {
            self.evict_oldest();
        }

        self.sequence += 1;
        let key = (record.created_at, self.sequence);
        let id = record.id;

        debug!(%id, method = %record.method, total = self.records.len() + 1, "Subscription added");

        self.by_age.insert(key, id);
        self.records.insert(id, Entry { record, key });
    }

    /// Stops tracking `id`.
    ///
    /// Returns `false` if it was not tracked.
    pub fn remove_subscription(&mut self, id: SubscriptionId) -> bool {
        let removed = self.remove_entry(id).is_some();
        if removed {
            debug!(%id, total = self.records.len(), "Subscription removed");
        }
        removed
    }

    /// Returns a snapshot of every tracked record, oldest first.
    ///
    /// Callers should rely on completeness only, not on the order.
    #[must_use]
    pub fn get_active(&self) -> Vec<SubscriptionRecord> {
        self.by_age
            .values()
            .filter_map(|id| self.records.get(id))
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Drops every record.
    pub fn clear_all(&mut self) {
        let count = self.records.len();
        self.records.clear();
        self.by_age.clear();
        debug!(count, "Cleared all subscriptions");
    }

    /// Evicts the oldest `floor(len * cleanup_ratio)` records.
    ///
    /// At least one record is evicted when the registry is non-empty, so an
    /// insert into a full registry never exceeds capacity. Returns the number
    /// of records evicted.
    pub fn evict_oldest(&mut self) -> usize {
        let len = self.records.len();
        if len == 0 {
            return 0;
        }

        let count = self.eviction_count(len);
        for _ in 0..count {
            let Some((_, id)) = self.by_age.pop_first() else {
                break;
            };
            if let Some(entry) = self.records.remove(&id) {
                debug!(%id, method = %entry.record.method, "Evicted old subscription");
            }
        }

        count
    }

    /// Number of records one eviction pass removes from `len` records.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn eviction_count(&self, len: usize) -> usize {
        let by_ratio = (len as f64 * self.options.cleanup_ratio).floor() as usize;
        by_ratio.max(1).min(len)
    }

    /// Removes a record and its age index entry.
    fn remove_entry(&mut self, id: SubscriptionId) -> Option<SubscriptionRecord> {
        let entry = self.records.remove(&id)?;
        self.by_age.remove(&entry.key);
        Some(entry.record)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Milliseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn registry(max_subscriptions: usize, cleanup_ratio: f64) -> SubscriptionRegistry {
        SubscriptionRegistry::new(RegistryOptions {
            max_subscriptions,
            cleanup_ratio,
        })
    }

    fn record(id: u64, created_at: u64) -> SubscriptionRecord {
        SubscriptionRecord::with_created_at(
            SubscriptionId::new(id),
            "slotSubscribe",
            vec![],
            created_at,
        )
    }

    fn ids(registry: &SubscriptionRegistry) -> Vec<u64> {
        let mut ids: Vec<_> = registry.get_active().iter().map(|r| r.id.as_u64()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_add_and_get() {
        let mut reg = registry(10, 0.1);
        reg.add_subscription(
            SubscriptionId::new(1),
            "accountSubscribe",
            vec![json!("acct"), json!({"commitment": "confirmed"})],
        );

        let rec = reg.get(SubscriptionId::new(1)).expect("tracked");
        assert_eq!(rec.method, "accountSubscribe");
        assert_eq!(rec.params[1]["commitment"], "confirmed");
        assert!(rec.created_at > 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut reg = registry(5, 0.2);
        for t in 1..=5 {
            reg.insert(record(t, t));
        }

        reg.insert(record(6, 6));

        assert_eq!(reg.len(), 5);
        assert!(!reg.contains(SubscriptionId::new(1)));
        assert_eq!(ids(&reg), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_eviction_follows_timestamp_not_insert_order() {
        let mut reg = registry(3, 0.5);
        reg.insert(record(1, 30));
        reg.insert(record(2, 10));
        reg.insert(record(3, 20));

        // floor(3 * 0.5) = 1 -> the record stamped 10
        reg.insert(record(4, 40));
        assert_eq!(ids(&reg), vec![1, 3, 4]);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let mut reg = registry(4, 0.5);
        reg.insert(record(9, 100));
        reg.insert(record(3, 100));
        reg.insert(record(7, 100));
        reg.insert(record(1, 100));

        reg.insert(record(5, 100));
        assert_eq!(ids(&reg), vec![1, 5, 7]);
    }

    #[test]
    fn test_eleven_inserts_into_capacity_ten() {
        let mut reg = registry(10, 0.1);
        for t in 1..=11 {
            reg.insert(record(t, 1_000 + t));
        }

        assert_eq!(reg.len(), 10);
        assert!(!reg.contains(SubscriptionId::new(1)));
        assert!(reg.contains(SubscriptionId::new(11)));
    }

    #[test]
    fn test_zero_ratio_still_makes_room() {
        let mut reg = registry(2, 0.0);
        reg.insert(record(1, 1));
        reg.insert(record(2, 2));
        reg.insert(record(3, 3));

        assert_eq!(reg.len(), 2);
        assert_eq!(ids(&reg), vec![2, 3]);
    }

    #[test]
    fn test_large_ratio_evicts_many() {
        let mut reg = registry(10, 0.5);
        for t in 1..=10 {
            reg.insert(record(t, t));
        }

        reg.insert(record(11, 11));
        assert_eq!(reg.len(), 6);
        assert_eq!(ids(&reg), vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_reinsert_replaces_record() {
        let mut reg = registry(3, 0.1);
        reg.insert(record(1, 1));
        reg.insert(record(2, 2));
        reg.insert(SubscriptionRecord::with_created_at(
            SubscriptionId::new(1),
            "logsSubscribe",
            vec![json!("all")],
            3,
        ));

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(SubscriptionId::new(1)).unwrap().method, "logsSubscribe");

        // id 1 is now the newest, so id 2 goes first
        reg.insert(record(3, 4));
        reg.insert(record(4, 5));
        assert_eq!(ids(&reg), vec![1, 3, 4]);
    }

    #[test]
    fn test_remove_subscription() {
        let mut reg = registry(10, 0.1);
        reg.insert(record(1, 1));
        reg.insert(record(2, 2));

        assert!(reg.remove_subscription(SubscriptionId::new(1)));
        assert_eq!(ids(&reg), vec![2]);

        // Unknown id is a no-op
        assert!(!reg.remove_subscription(SubscriptionId::new(99)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let mut reg = registry(10, 0.1);
        reg.insert(record(1, 1));
        reg.insert(record(2, 2));

        reg.clear_all();
        assert!(reg.is_empty());
        assert!(reg.get_active().is_empty());

        // Still usable afterwards
        reg.insert(record(3, 3));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut reg = registry(0, 0.1);
        assert_eq!(reg.capacity(), 1);

        reg.add_subscription(SubscriptionId::new(1), "slotSubscribe", vec![]);
        reg.add_subscription(SubscriptionId::new(2), "rootSubscribe", vec![]);

        assert_eq!(reg.len(), 1);
        assert!(reg.contains(SubscriptionId::new(2)));
    }

    #[test]
    fn test_evict_oldest_on_empty() {
        let mut reg = registry(10, 0.1);
        assert_eq!(reg.evict_oldest(), 0);
    }

    #[test]
    fn test_default_options() {
        let reg = SubscriptionRegistry::default();
        assert_eq!(reg.capacity(), 100);
        assert!(reg.is_empty());
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(
            capacity in 1usize..32,
            ratio in 0.0f64..=1.0,
            ops in prop::collection::vec((0u64..64, 0u64..1_000, any::<bool>()), 0..200),
        ) {
            let mut reg = registry(capacity, ratio);
            for (id, created_at, remove) in ops {
                if remove {
                    reg.remove_subscription(SubscriptionId::new(id));
                } else {
                    reg.insert(record(id, created_at));
                }
                prop_assert!(reg.len() <= capacity);
                prop_assert_eq!(reg.get_active().len(), reg.len());
            }
        }
    }
}
