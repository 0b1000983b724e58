// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Contract tests for the recycling pools, exercised through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rill_pool::{KeyedRecyclingPool, RecyclingPool};

#[test]
fn lifo_freshness() {
    let pool = RecyclingPool::new(2);
    pool.raw_put('a');
    pool.raw_put('b');
    assert_eq!(pool.raw_get(|| '?', |_| {}), 'b');
    assert_eq!(pool.raw_get(|| '?', |_| {}), 'a');
}

#[test]
fn keyed_eviction_destroys_the_oldest() {
    struct Tracked {
        id: usize,
        destroyed: Arc<AtomicUsize>,
    }
    impl Drop for Tracked {
        fn drop(&mut self) {
            // Records which objects have been destroyed as a bitmask.
            self.destroyed.fetch_or(1 << self.id, Ordering::SeqCst);
        }
    }

    let destroyed = Arc::new(AtomicUsize::new(0));
    let capacity = 3;
    let pool = KeyedRecyclingPool::new(capacity);
    for id in 0..=capacity {
        pool.raw_put(
            &id,
            Tracked {
                id,
                destroyed: Arc::clone(&destroyed),
            },
        );
    }
    assert_eq!(destroyed.load(Ordering::SeqCst), 1, "exactly object 0 was destroyed");
}

#[test]
fn repeated_same_key_round_trips_reuse_one_object() {
    // One factory call and one refurbisher call per reuse, with a stable
    // object identity across the round trips.
    let pool: KeyedRecyclingPool<&str, Box<[u8; 32]>> = KeyedRecyclingPool::new(2);
    let factory_calls = AtomicUsize::new(0);
    let refurbisher_calls = AtomicUsize::new(0);
    let mut identities = Vec::new();

    for _ in 0..3 {
        let handle = pool.get(
            "snappy:default",
            || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                Box::new([0_u8; 32])
            },
            |state| {
                refurbisher_calls.fetch_add(1, Ordering::SeqCst);
                state.fill(0);
            },
        );
        identities.push(handle.as_ptr() as usize);
    }

    assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    assert_eq!(refurbisher_calls.load(Ordering::SeqCst), 2);
    assert!(identities.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn eviction_completes_before_the_destructor_runs() {
    // The destructor of an evicted object re-enters the pool. If the pool
    // still held its lock while destroying the eviction victim, this would
    // deadlock.
    struct Reentrant {
        pool: Option<RecyclingPool<Reentrant>>,
    }
    impl Drop for Reentrant {
        fn drop(&mut self) {
            if let Some(pool) = self.pool.take() {
                pool.raw_put(Reentrant { pool: None });
            }
        }
    }

    let pool = RecyclingPool::new(1);
    pool.raw_put(Reentrant { pool: Some(pool.clone()) });
    pool.raw_put(Reentrant { pool: None });
}

#[test]
fn concurrent_keyed_access_is_safe() {
    let pool: KeyedRecyclingPool<usize, Vec<u8>> = KeyedRecyclingPool::new(8);
    let pool = Arc::new(pool);
    let threads: Vec<_> = (0..4_usize)
        .map(|key| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                for round in 0..200 {
                    let mut state = pool.get(key, || Vec::with_capacity(256), Vec::clear);
                    state.push(round as u8);
                    assert_eq!(state.len(), 1);
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
}
