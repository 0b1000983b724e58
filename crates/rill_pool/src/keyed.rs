// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::default_max_size;

/// A recycling pool that hands out only compatible objects.
///
/// Objects that can only be reused with the same configuration - for example
/// a decoder state created for particular codec parameters - are stored under
/// a key and returned only for [`get()`][Self::get] calls with an equal key.
/// Within a key the freshest object is preferred; when the pool exceeds its
/// capacity the globally oldest object is evicted, whatever its key.
///
/// The pool keeps a one-slot cache for the common round-trip of `get` followed
/// by `put` with the same key, which then costs two pointer swaps instead of
/// map traffic.
///
/// A `KeyedRecyclingPool` is a shared handle: clones refer to the same pool.
#[derive(Debug)]
pub struct KeyedRecyclingPool<K, T>
where
    K: Clone + Eq + Hash,
{
    shared: Arc<Shared<K, T>>,
}

impl<K, T> Clone for KeyedRecyclingPool<K, T>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[derive(Debug)]
struct Shared<K, T>
where
    K: Clone + Eq + Hash,
{
    // Read without the lock; grown with a compare-exchange loop.
    max_size: AtomicUsize,
    inner: Mutex<Inner<K, T>>,
}

#[derive(Debug)]
struct Entry<T> {
    // `None` marks the entry whose object was taken by the last `get` and is
    // expected back with the same key; see `cache`.
    object: Option<T>,
    freshness: u64,
}

#[derive(Debug)]
struct Inner<K, T> {
    // The key of each pooled object, ordered by the freshness of the object
    // (oldest first). Total entries across `by_key` equal this map's length.
    by_freshness: BTreeMap<u64, K>,
    // Within each value the entries are ordered oldest to newest and the
    // list is non-empty.
    by_key: HashMap<K, VecDeque<Entry<T>>>,
    // Key of the placeholder entry left behind by the last `get`, if any.
    // The placeholder keeps its freshness slot so a matching `put` restores
    // the object in place.
    cache: Option<K>,
    next_freshness: u64,
}

impl<K, T> KeyedRecyclingPool<K, T>
where
    K: Clone + Eq + Hash,
{
    /// The default pool capacity.
    pub const DEFAULT_MAX_SIZE: usize = 16;

    /// Creates a pool keeping at most `max_size` idle objects across all keys.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_size: AtomicUsize::new(max_size),
                inner: Mutex::new(Inner {
                    by_freshness: BTreeMap::new(),
                    by_key: HashMap::new(),
                    cache: None,
                    next_freshness: 0,
                }),
            }),
        }
    }

    /// The capacity used by [`global()`][Self::global]: the maximum of 16 and
    /// the available parallelism.
    #[must_use]
    pub fn default_global_max_size() -> usize {
        default_max_size()
    }

    /// Returns an idle object stored under `key`, or creates one with
    /// `factory` on a miss.
    ///
    /// On a hit, `refurbisher` resets the recycled object first. Both
    /// callbacks run outside the pool lock. The handle puts the object back
    /// under the same key when dropped.
    pub fn get(
        &self,
        key: K,
        factory: impl FnOnce() -> T,
        refurbisher: impl FnOnce(&mut T),
    ) -> KeyedRecycled<K, T> {
        let object = self.raw_get(&key, factory, refurbisher);
        KeyedRecycled {
            key: Some(key),
            object: Some(object),
            pool: self.clone(),
        }
    }

    /// Like [`get()`][Self::get], but the object is not tied to the pool; put
    /// it back with [`raw_put()`][Self::raw_put] if it stays reusable.
    pub fn raw_get(&self, key: &K, factory: impl FnOnce() -> T, refurbisher: impl FnOnce(&mut T)) -> T {
        let recycled = {
            let mut inner = self.shared.inner.lock();
            inner.finish_erasing_cached();
            let taken = match inner.by_key.get_mut(key) {
                Some(entries) => {
                    let newest = entries.back_mut().expect("by_key values are non-empty");
                    debug_assert!(newest.object.is_some(), "placeholder was just erased");
                    newest.object.take()
                }
                None => None,
            };
            inner.cache = taken.is_some().then(|| key.clone());
            taken
        };
        match recycled {
            Some(mut object) => {
                refurbisher(&mut object);
                object
            }
            None => factory(),
        }
    }

    /// Puts an idle object into the pool under `key`, evicting the globally
    /// oldest object if the pool is over capacity.
    pub fn raw_put(&self, key: &K, object: T) {
        let mut evicted = None;
        {
            let mut inner = self.shared.inner.lock();
            if let Some(cached_key) = inner.cache.take() {
                if cached_key == *key {
                    // Round trip with a matching key: restore the object in
                    // its placeholder, keeping its freshness slot.
                    let entries = inner.by_key.get_mut(&cached_key).expect("cache refers to a live key");
                    let placeholder = entries.back_mut().expect("by_key values are non-empty");
                    debug_assert!(placeholder.object.is_none(), "cache points at the placeholder");
                    placeholder.object = Some(object);
                    return;
                }
                inner.cache = Some(cached_key);
                inner.finish_erasing_cached();
            }
            let freshness = inner.next_freshness;
            inner.next_freshness += 1;
            inner.by_freshness.insert(freshness, key.clone());
            inner.by_key.entry(key.clone()).or_default().push_back(Entry {
                object: Some(object),
                freshness,
            });
            if inner.by_freshness.len() > self.shared.max_size.load(Ordering::Relaxed) {
                evicted = Some(inner.evict_oldest());
            }
        }
        // The evicted object's destructor runs here, after the lock is
        // released: it may re-enter the allocator or this very pool.
        drop(evicted);
    }

    /// Grows the pool capacity to at least `max_size`. Never shrinks.
    pub fn ensure_max_size(&self, max_size: usize) {
        let mut previous = self.shared.max_size.load(Ordering::Relaxed);
        while previous < max_size {
            match self.shared.max_size.compare_exchange_weak(
                previous,
                max_size,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => previous = current,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        let inner = self.shared.inner.lock();
        inner
            .by_key
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|entry| entry.object.is_some())
            .count()
    }
}

impl<K, T> Inner<K, T>
where
    K: Clone + Eq + Hash,
{
    // Completes the deferred removal of the placeholder entry left by the
    // last `get`, if it is still pending.
    fn finish_erasing_cached(&mut self) {
        let Some(key) = self.cache.take() else { return };
        let entries = self.by_key.get_mut(&key).expect("cache refers to a live key");
        let placeholder = entries.pop_back().expect("by_key values are non-empty");
        debug_assert!(placeholder.object.is_none(), "cache points at the placeholder");
        self.by_freshness.remove(&placeholder.freshness);
        if entries.is_empty() {
            self.by_key.remove(&key);
        }
    }

    // Removes and returns the globally oldest object. Caller drops it after
    // releasing the lock.
    fn evict_oldest(&mut self) -> T {
        let (freshness, key) = self.by_freshness.pop_first().expect("eviction on a non-empty pool");
        let entries = self.by_key.get_mut(&key).expect("freshness entries refer to live keys");
        let entry = entries.pop_front().expect("by_key values are non-empty");
        debug_assert_eq!(entry.freshness, freshness, "per-key order matches global order");
        if entries.is_empty() {
            self.by_key.remove(&key);
        }
        entry.object.expect("placeholders are erased before eviction")
    }
}

/// A handle to a pooled object that returns it to its
/// [`KeyedRecyclingPool`] under its key on drop.
#[derive(Debug)]
pub struct KeyedRecycled<K, T>
where
    K: Clone + Eq + Hash,
{
    key: Option<K>,
    object: Option<T>,
    pool: KeyedRecyclingPool<K, T>,
}

impl<K, T> KeyedRecycled<K, T>
where
    K: Clone + Eq + Hash,
{
    /// Detaches the object from the pool; it will not be recycled.
    #[must_use]
    pub fn into_inner(mut self) -> T {
        self.object.take().expect("object present until into_inner or drop")
    }
}

impl<K, T> Deref for KeyedRecycled<K, T>
where
    K: Clone + Eq + Hash,
{
    type Target = T;

    fn deref(&self) -> &T {
        self.object.as_ref().expect("object present until into_inner or drop")
    }
}

impl<K, T> DerefMut for KeyedRecycled<K, T>
where
    K: Clone + Eq + Hash,
{
    fn deref_mut(&mut self) -> &mut T {
        self.object.as_mut().expect("object present until into_inner or drop")
    }
}

impl<K, T> Drop for KeyedRecycled<K, T>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        if let (Some(key), Some(object)) = (self.key.take(), self.object.take()) {
            self.pool.raw_put(&key, object);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(KeyedRecyclingPool<String, Vec<u8>>: Send, Sync, Clone);

    #[test]
    fn objects_come_back_only_for_their_key() {
        let pool = KeyedRecyclingPool::new(4);
        pool.raw_put(&"a", 1);
        pool.raw_put(&"b", 2);
        assert_eq!(pool.raw_get(&"b", || 0, |_| {}), 2);
        assert_eq!(pool.raw_get(&"a", || 0, |_| {}), 1);
        assert_eq!(pool.raw_get(&"a", || 0, |_| {}), 0);
    }

    #[test]
    fn newest_entry_for_a_key_is_preferred() {
        let pool = KeyedRecyclingPool::new(4);
        pool.raw_put(&"k", 1);
        pool.raw_put(&"k", 2);
        assert_eq!(pool.raw_get(&"k", || 0, |_| {}), 2);
        assert_eq!(pool.raw_get(&"k", || 0, |_| {}), 1);
    }

    #[test]
    fn over_capacity_evicts_globally_oldest() {
        struct Tracked {
            id: usize,
            drops: Arc<AtomicUsize>,
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.drops.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let pool = KeyedRecyclingPool::new(2);
        for id in 0..3 {
            pool.raw_put(
                &id,
                Tracked {
                    id,
                    drops: Arc::clone(&drops),
                },
            );
        }
        // Capacity 2 with 3 distinct keys: the first object was destroyed.
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(pool.raw_get(&1, || unreachable!(), |_| {}).id, 1);
        assert_eq!(pool.raw_get(&2, || unreachable!(), |_| {}).id, 2);
        let miss = pool.raw_get(
            &0,
            || Tracked {
                id: 99,
                drops: Arc::clone(&drops),
            },
            |_| {},
        );
        assert_eq!(miss.id, 99);
    }

    #[test]
    fn same_key_round_trip_reuses_one_object() {
        let pool = KeyedRecyclingPool::new(2);
        let factory_calls = AtomicUsize::new(0);
        let refurbisher_calls = AtomicUsize::new(0);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let handle = pool.get(
                "codec",
                || {
                    factory_calls.fetch_add(1, Ordering::SeqCst);
                    Box::new(42_u64)
                },
                |object| {
                    refurbisher_calls.fetch_add(1, Ordering::SeqCst);
                    **object = 0;
                },
            );
            seen.push(std::ptr::from_ref::<u64>(&**handle) as usize);
            drop(handle);
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(refurbisher_calls.load(Ordering::SeqCst), 2);
        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]), "one object recycled throughout");
    }

    #[test]
    fn cache_miss_put_with_other_key_still_erases_placeholder() {
        let pool = KeyedRecyclingPool::new(4);
        pool.raw_put(&"a", 1);
        let taken = pool.raw_get(&"a", || 0, |_| {});
        assert_eq!(taken, 1);
        // Put under a different key while the placeholder for "a" pends.
        pool.raw_put(&"b", 2);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.raw_get(&"a", || 0, |_| {}), 0);
        assert_eq!(pool.raw_get(&"b", || 0, |_| {}), 2);
    }

    #[test]
    fn evicted_destructor_runs_outside_the_lock() {
        struct Reentrant {
            pool: Option<KeyedRecyclingPool<u32, Reentrant>>,
        }
        impl Drop for Reentrant {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    pool.raw_put(&99, Reentrant { pool: None });
                }
            }
        }

        let pool = KeyedRecyclingPool::new(1);
        pool.raw_put(&1, Reentrant { pool: Some(pool.clone()) });
        // Evicts the first object, whose destructor re-enters the pool.
        pool.raw_put(&2, Reentrant { pool: None });
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn ensure_max_size_grows_capacity() {
        let pool = KeyedRecyclingPool::new(1);
        pool.ensure_max_size(3);
        for id in 0..3 {
            pool.raw_put(&id, id);
        }
        assert_eq!(pool.idle_count(), 3);
        pool.ensure_max_size(2); // never shrinks
        assert_eq!(pool.idle_count(), 3);
    }
}
