//! Create-once publication of expensive values.
//!
//! A [`Publisher`] maps keys to values that are produced by a factory at
//! most once per key, no matter how many threads race to request the same
//! key. Each key owns a once-initialization cell; the map's shard lock is
//! only held long enough to find or insert the cell, so factories for
//! distinct keys run in parallel and a slow factory blocks only the callers
//! waiting on its own key.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

/// Concurrent create-once cache.
pub struct Publisher<K, V> {
    cells: DashMap<K, Arc<OnceLock<V>>, FxBuildHasher>,
    created: AtomicU64,
}

impl<K, V> Publisher<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self {
            cells: DashMap::with_hasher(FxBuildHasher),
            created: AtomicU64::new(0),
        }
    }

    /// Value for `key`, running `factory` if no caller has produced it yet.
    ///
    /// Every caller for the same key observes the same value.
    pub fn get_or_create<F>(&self, key: &K, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        // Clone the cell out so the shard lock is released before the
        // factory runs.
        let cell = Arc::clone(
            self.cells
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .value(),
        );
        cell.get_or_init(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            factory()
        })
        .clone()
    }

    /// Value for `key`, if already produced.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cells.get(key)?.value().get().cloned()
    }

    /// Whether a value for `key` has been produced.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of keys with a cell (produced or in progress).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no key has been requested.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of factory runs so far.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

impl<K, V> Default for Publisher<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for Publisher<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("created", &self.created.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;

    #[test]
    fn test_factory_runs_once_per_key() {
        let publisher: Publisher<u32, Arc<String>> = Publisher::new();
        let a = publisher.get_or_create(&1, || Arc::new("one".to_string()));
        let b = publisher.get_or_create(&1, || Arc::new("uno".to_string()));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(publisher.created(), 1);
        assert_eq!(publisher.len(), 1);
        assert!(publisher.contains(&1));
        assert!(!publisher.contains(&2));
    }

    #[test]
    fn test_distinct_keys_get_distinct_values() {
        let publisher: Publisher<&'static str, usize> = Publisher::default();
        assert!(publisher.is_empty());
        assert_eq!(publisher.get_or_create(&"a", || 1), 1);
        assert_eq!(publisher.get_or_create(&"b", || 2), 2);
        assert_eq!(publisher.get(&"a"), Some(1));
        assert_eq!(publisher.created(), 2);
    }

    #[test]
    fn test_racing_threads_share_one_value() {
        const THREADS: usize = 8;
        let publisher: Arc<Publisher<u32, Arc<u64>>> = Arc::new(Publisher::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let publisher = Arc::clone(&publisher);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    publisher.get_or_create(&7, || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Arc::new(i as u64)
                    })
                })
            })
            .collect();

        let values: Vec<Arc<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
