// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;
use std::thread;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{KeyedRecyclingPool, RecyclingPool};

/// The capacity used by the global pools: the maximum of 16 and the number of
/// available threads.
pub(crate) fn default_max_size() -> usize {
    let parallelism = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    parallelism.max(16)
}

// One process-wide pool per pool type, created lazily. The registry lock is
// held only for the map lookup, never while using a pool.
fn registry() -> &'static Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
    static REGISTRY: OnceCell<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> = OnceCell::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn global_instance<P>(create: impl FnOnce() -> P, clone: impl FnOnce(&P) -> P) -> P
where
    P: Send + Sync + 'static,
{
    let mut map = registry().lock();
    let entry = map
        .entry(TypeId::of::<P>())
        .or_insert_with(|| Box::new(create()));
    clone(entry.downcast_ref::<P>().expect("registry entries match their TypeId"))
}

impl<T> RecyclingPool<T>
where
    T: Send + 'static,
{
    /// The process-wide pool for this object type.
    ///
    /// Created on first use. When called multiple times with different
    /// `max_size` values, the largest takes effect.
    #[must_use]
    pub fn global(max_size: usize) -> Self {
        let pool = global_instance(|| Self::new(max_size), Self::clone);
        pool.ensure_max_size(max_size);
        pool
    }
}

impl<K, T> KeyedRecyclingPool<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Send + 'static,
{
    /// The process-wide pool for this key and object type.
    ///
    /// Created on first use. When called multiple times with different
    /// `max_size` values, the largest takes effect.
    #[must_use]
    pub fn global(max_size: usize) -> Self {
        let pool = global_instance(|| Self::new(max_size), Self::clone);
        pool.ensure_max_size(max_size);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_pools_are_shared_per_type() {
        struct Marker(u8);

        let first = RecyclingPool::<Marker>::global(4);
        first.raw_put(Marker(1));
        let second = RecyclingPool::<Marker>::global(4);
        let recycled = second.raw_get(|| Marker(0), |_| {});
        assert_eq!(recycled.0, 1);
    }

    #[test]
    fn global_pools_differ_per_type() {
        struct A;
        struct B;

        let a = RecyclingPool::<A>::global(4);
        a.raw_put(A);
        let b = RecyclingPool::<B>::global(4);
        let fresh = b.raw_get(|| B, |_| {});
        drop(fresh);
        // The A pool still holds its object; B started empty.
        let a_again = RecyclingPool::<A>::global(4);
        let mut factory_ran = false;
        let _object = a_again.raw_get(
            || {
                factory_ran = true;
                A
            },
            |_| {},
        );
        assert!(!factory_ran);
    }

    #[test]
    fn largest_requested_capacity_wins() {
        struct Marker2;

        let _small = RecyclingPool::<Marker2>::global(2);
        let grown = RecyclingPool::<Marker2>::global(64);
        for _ in 0..32 {
            grown.raw_put(Marker2);
        }
        // With capacity 2 most of these puts would have evicted; the grown
        // capacity keeps them all.
        let mut misses = 0;
        for _ in 0..32 {
            let _object = grown.raw_get(
                || {
                    misses += 1;
                    Marker2
                },
                |_| {},
            );
        }
        assert_eq!(misses, 0);
    }
}
