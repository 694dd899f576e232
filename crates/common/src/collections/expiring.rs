//! Time-indexed key/value store with single-use lookups.
//!
//! Entries are indexed twice: by key in a `HashMap` for lookups and by expiry
//! in a min-heap so that [`ExpiringStore::sweep`] only touches entries that
//! are actually due. Re-inserting a key leaves its old heap node behind; the
//! node carries a generation number and is discarded when it no longer
//! matches the live entry.
//!
//! # Complexity
//! - `put`: `O(log n)`
//! - `validate_and_consume`: `O(1)`
//! - `sweep`: `O(k log n)` for `k` due heap nodes
//!
//! # Examples
//! ```
//! use calsync_common::collections::ExpiringStore;
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let mut store = ExpiringStore::new(Duration::minutes(10));
//! store.put_at("state-1", "google", now);
//!
//! assert_eq!(store.validate_and_consume("state-1", now), Some("google"));
//! assert_eq!(store.validate_and_consume("state-1", now), None);
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Duration, Utc};

struct Slot<V> {
    value: V,
    expires_at: DateTime<Utc>,
    generation: u64,
}

/// Store whose entries can be read once and vanish at their expiry.
pub struct ExpiringStore<V> {
    ttl: Duration,
    entries: HashMap<String, Slot<V>>,
    deadlines: BinaryHeap<Reverse<(DateTime<Utc>, u64, String)>>,
    next_generation: u64,
}

impl<V> ExpiringStore<V> {
    /// Creates an empty store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new(), deadlines: BinaryHeap::new(), next_generation: 0 }
    }

    /// Default lifetime applied by [`put_at`](Self::put_at).
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Inserts `value` under `key`, replacing any previous entry, and returns
    /// its expiry.
    pub fn put_at(&mut self, key: impl Into<String>, value: V, now: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = self.ttl;
        self.put_with_ttl(key, value, now, ttl)
    }

    /// Inserts with an explicit lifetime.
    pub fn put_with_ttl(
        &mut self,
        key: impl Into<String>,
        value: V,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> DateTime<Utc> {
        let key = key.into();
        let expires_at = now + ttl;
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        self.deadlines.push(Reverse((expires_at, generation, key.clone())));
        self.entries.insert(key, Slot { value, expires_at, generation });
        expires_at
    }

    /// Removes and returns the value if it exists and has not expired.
    ///
    /// The entry is removed in both cases, so a key can never be validated
    /// twice.
    pub fn validate_and_consume(&mut self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let slot = self.entries.remove(key)?;
        (slot.expires_at > now).then_some(slot.value)
    }

    /// True when `key` is present and unexpired. Does not consume.
    #[must_use]
    pub fn contains_live(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.entries.get(key).is_some_and(|slot| slot.expires_at > now)
    }

    /// Drops every entry whose expiry is at or before `now`, returning how
    /// many live entries were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(Reverse((expires_at, _, _))) = self.deadlines.peek() {
            if *expires_at > now {
                break;
            }
            let Some(Reverse((_, generation, key))) = self.deadlines.pop() else {
                break;
            };
            let current = self.entries.get(&key).is_some_and(|slot| slot.generation == generation);
            if current {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Number of entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> std::fmt::Debug for ExpiringStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("ttl_secs", &self.ttl.num_seconds())
            .field("len", &self.entries.len())
            .field("pending_deadlines", &self.deadlines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn consume_is_single_use() {
        let mut store = ExpiringStore::new(Duration::seconds(60));
        store.put_at("k", 1, t0());

        assert_eq!(store.validate_and_consume("k", t0()), Some(1));
        assert_eq!(store.validate_and_consume("k", t0()), None);
    }

    #[test]
    fn expired_entry_is_rejected_and_removed() {
        let mut store = ExpiringStore::new(Duration::seconds(60));
        let expires_at = store.put_at("k", "v", t0());

        assert_eq!(expires_at, t0() + Duration::seconds(60));
        assert_eq!(store.validate_and_consume("k", expires_at), None);
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_removes_only_due_entries() {
        let mut store = ExpiringStore::new(Duration::seconds(60));
        store.put_at("early", 1, t0());
        store.put_at("late", 2, t0() + Duration::seconds(30));

        assert_eq!(store.sweep(t0() + Duration::seconds(60)), 1);
        assert!(!store.contains_live("early", t0()));
        assert!(store.contains_live("late", t0() + Duration::seconds(60)));
        assert_eq!(store.sweep(t0() + Duration::seconds(120)), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn reinserted_key_survives_stale_deadline() {
        let mut store = ExpiringStore::new(Duration::seconds(60));
        store.put_at("k", 1, t0());
        store.put_at("k", 2, t0() + Duration::seconds(50));

        assert_eq!(store.sweep(t0() + Duration::seconds(61)), 0);
        assert_eq!(store.validate_and_consume("k", t0() + Duration::seconds(61)), Some(2));
    }

    #[test]
    fn sweep_after_consume_is_noop() {
        let mut store = ExpiringStore::new(Duration::seconds(1));
        store.put_at("k", (), t0());
        store.validate_and_consume("k", t0());

        assert_eq!(store.sweep(t0() + Duration::seconds(5)), 0);
    }
}
