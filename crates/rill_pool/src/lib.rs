// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recycling pools of reusable objects.
//!
//! Compression codec state is expensive to construct and cheap to reset, so
//! the codec layers keep idle state objects in a pool and recycle them across
//! streams instead of paying the allocator on every open. Two variants exist:
//!
//! * [`RecyclingPool`] - an unkeyed ring. [`get`][RecyclingPool::get] pops the
//!   freshest idle object (LIFO, to maximise cache locality); a put into a
//!   full pool evicts the oldest.
//! * [`KeyedRecyclingPool`] - objects are reusable only under an equal key
//!   (codec parameters, dictionary identity). Eviction removes the globally
//!   oldest object across keys, and a one-slot cache makes the common
//!   get-then-put-with-the-same-key round trip cheap.
//!
//! Both are shared handles guarded by a single short-section mutex. The
//! caller's factory and refurbisher, and the destructors of evicted objects,
//! always run outside the lock - an evicted destructor is allowed to re-enter
//! the pool.
//!
//! Process-wide instances are available through `global()`, created lazily
//! per pool type; repeated calls merge their capacity requests by keeping the
//! largest.

mod global;
mod keyed;
mod recycling;

pub(crate) use global::default_max_size;
pub use keyed::{KeyedRecycled, KeyedRecyclingPool};
pub use recycling::{Recycled, RecyclingPool};
