//! Two-level concurrent map of append-only buckets.
//!
//! Lock granularity:
//! - the outer and inner maps are `DashMap`s (sharded locks, held only while a
//!   bucket handle is looked up or created),
//! - each bucket has its own mutex, held only while a value is appended or read.
//!
//! Creation goes through the `entry` API, so concurrent first inserts into the
//! same `(outer, inner)` key converge on a single bucket.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

type Bucket<V> = Arc<Mutex<Vec<V>>>;

pub struct BucketMap<L, K, V> {
    outer: DashMap<L, Arc<DashMap<K, Bucket<V>>>>,
}

impl<L, K, V> Default for BucketMap<L, K, V>
where
    L: Eq + Hash,
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            outer: DashMap::new(),
        }
    }
}

impl<L, K, V> BucketMap<L, K, V>
where
    L: Eq + Hash + Copy,
    K: Eq + Hash + Copy,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the `(outer, inner)` bucket, creating it if needed.
    pub fn push(&self, outer: L, inner: K, value: V) {
        let bucket = self.bucket_or_create(outer, inner);
        bucket.lock().push(value);
    }

    fn bucket_or_create(&self, outer: L, inner: K) -> Bucket<V> {
        // Shard guards are dropped at the end of each statement, before the bucket lock is taken.
        let inner_map = self.outer.entry(outer).or_default().clone();
        let bucket = inner_map.entry(inner).or_default();
        Arc::clone(bucket.value())
    }

    /// Existing buckets under `outer` for the given inner keys, or `None` if `outer` is absent.
    pub fn buckets(&self, outer: L, inner: &[K]) -> Option<Vec<Bucket<V>>> {
        let inner_map = self.outer.get(&outer)?.clone();
        Some(
            inner
                .iter()
                .filter_map(|key| inner_map.get(key).map(|b| b.clone()))
                .collect(),
        )
    }

    pub fn len_of(&self, outer: L, inner: K) -> usize {
        self.buckets(outer, &[inner])
            .and_then(|buckets| buckets.first().map(|b| b.lock().len()))
            .unwrap_or(0)
    }

    /// Number of values across all buckets.
    pub fn total_len(&self) -> usize {
        self.outer
            .iter()
            .map(|inner| inner.iter().map(|b| b.lock().len()).sum::<usize>())
            .sum()
    }
}
