// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::default_max_size;

/// A pool of idle objects recycled instead of recreated.
///
/// Useful when constructing an object is more expensive than resetting an
/// existing one to a clean state, which is the case for compression codec
/// state. [`get()`][Self::get] pops the freshest idle object (LIFO, for cache
/// locality) or runs the caller's factory on a miss; the returned
/// [`Recycled`] handle puts the object back when dropped. When the pool is
/// full, a put evicts the oldest object.
///
/// A `RecyclingPool` is a shared handle: clones refer to the same pool.
///
/// ```
/// use rill_pool::RecyclingPool;
///
/// let pool = RecyclingPool::new(2);
/// {
///     let buffer = pool.get(|| Vec::<u8>::with_capacity(1024), |b| b.clear());
///     assert!(buffer.capacity() >= 1024);
/// } // returned to the pool here
/// let again = pool.get(|| Vec::with_capacity(1024), |b| b.clear());
/// assert!(again.capacity() >= 1024); // recycled, not reallocated
/// ```
#[derive(Debug)]
pub struct RecyclingPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for RecyclingPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[derive(Debug)]
struct Shared<T> {
    // Read without the lock; grown only while holding it.
    max_size: AtomicUsize,
    ring: Mutex<Ring<T>>,
}

// All idle objects, ordered by freshness. `end` is the slot a put writes
// next; the freshest object sits just below it.
#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    end: usize,
    size: usize,
}

impl<T> RecyclingPool<T> {
    /// The default pool capacity.
    pub const DEFAULT_MAX_SIZE: usize = 16;

    /// Creates a pool keeping at most `max_size` idle objects.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(max_size, || None);
        Self {
            shared: Arc::new(Shared {
                max_size: AtomicUsize::new(max_size),
                ring: Mutex::new(Ring { slots, end: 0, size: 0 }),
            }),
        }
    }

    /// The capacity used by [`global()`][Self::global]: the maximum of 16 and
    /// the available parallelism.
    #[must_use]
    pub fn default_global_max_size() -> usize {
        default_max_size()
    }

    /// Returns an idle object, or creates one with `factory` on a miss.
    ///
    /// On a hit, `refurbisher` resets the recycled object before it is
    /// returned; it never runs on a freshly created object. Both callbacks run
    /// outside the pool lock. The handle returns the object to the pool when
    /// dropped; use [`Recycled::into_inner()`] for objects not worth keeping.
    pub fn get(&self, factory: impl FnOnce() -> T, refurbisher: impl FnOnce(&mut T)) -> Recycled<T> {
        Recycled {
            object: Some(self.raw_get(factory, refurbisher)),
            pool: self.clone(),
        }
    }

    /// Like [`get()`][Self::get], but the object is not tied to the pool; put
    /// it back with [`raw_put()`][Self::raw_put] if it stays reusable.
    pub fn raw_get(&self, factory: impl FnOnce() -> T, refurbisher: impl FnOnce(&mut T)) -> T {
        let recycled = {
            let mut ring = self.shared.ring.lock();
            if ring.size > 0 {
                let max_size = self.shared.max_size.load(Ordering::Relaxed);
                ring.end = if ring.end == 0 { max_size - 1 } else { ring.end - 1 };
                ring.size -= 1;
                let end = ring.end;
                ring.slots[end].take()
            } else {
                None
            }
        };
        match recycled {
            Some(mut object) => {
                refurbisher(&mut object);
                object
            }
            None => factory(),
        }
    }

    /// Puts an idle object into the pool, evicting the oldest if full.
    pub fn raw_put(&self, object: T) {
        let evicted;
        {
            let mut ring = self.shared.ring.lock();
            if ring.slots.is_empty() {
                return;
            }
            let max_size = self.shared.max_size.load(Ordering::Relaxed);
            let end = ring.end;
            evicted = ring.slots[end].replace(object);
            ring.end = if ring.end + 1 == max_size { 0 } else { ring.end + 1 };
            if ring.size < max_size {
                ring.size += 1;
            }
        }
        // The evicted object's destructor runs here, after the lock is
        // released: it may re-enter the allocator or this very pool.
        drop(evicted);
    }

    /// Grows the pool capacity to at least `max_size`. Never shrinks.
    pub fn ensure_max_size(&self, max_size: usize) {
        if self.shared.max_size.load(Ordering::Relaxed) >= max_size {
            return;
        }
        let mut ring = self.shared.ring.lock();
        let old_size = self.shared.max_size.load(Ordering::Relaxed);
        if old_size >= max_size {
            return;
        }
        // Repack the ring so the existing objects keep their freshness order
        // at the front of the new buffer.
        let mut new_slots: Vec<Option<T>> = Vec::new();
        new_slots.resize_with(max_size, || None);
        let mut old_index = ring.end;
        let mut new_index = ring.size;
        let new_end = ring.size;
        while new_index > 0 {
            old_index = if old_index == 0 { old_size - 1 } else { old_index - 1 };
            new_index -= 1;
            new_slots[new_index] = ring.slots[old_index].take();
        }
        ring.slots = new_slots;
        ring.end = new_end;
        self.shared.max_size.store(max_size, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.shared.ring.lock().size
    }
}

/// A handle to a pooled object that returns it to its [`RecyclingPool`] on
/// drop.
#[derive(Debug)]
pub struct Recycled<T> {
    object: Option<T>,
    pool: RecyclingPool<T>,
}

impl<T> Recycled<T> {
    /// Detaches the object from the pool; it will not be recycled.
    #[must_use]
    pub fn into_inner(mut self) -> T {
        self.object.take().expect("object present until into_inner or drop")
    }
}

impl<T> Deref for Recycled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.object.as_ref().expect("object present until into_inner or drop")
    }
}

impl<T> DerefMut for Recycled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.object.as_mut().expect("object present until into_inner or drop")
    }
}

impl<T> Drop for Recycled<T> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.pool.raw_put(object);
        }
    }
}
