// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// An owned, explicitly sized byte region used as staging space by buffered
/// readers, writers, and codec state machines.
///
/// The region never grows on its own: callers request capacity with
/// [`ensure_capacity()`][Self::ensure_capacity] outside their hot paths and
/// then address the region as a slice. Growth rounds up to a power of two so
/// repeated small increases do not thrash the allocator.
#[derive(Debug, Default)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    /// Creates an empty buffer with no capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer with at least `capacity` addressable bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Self::new();
        buffer.ensure_capacity(capacity);
        buffer
    }

    /// The number of addressable bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Grows the region to at least `min_capacity` addressable bytes.
    ///
    /// Existing contents are preserved; new bytes are zeroed. No-op when the
    /// region is already large enough.
    pub fn ensure_capacity(&mut self, min_capacity: usize) {
        if min_capacity <= self.data.len() {
            return;
        }
        let new_capacity = min_capacity.checked_next_power_of_two().unwrap_or(min_capacity);
        self.data.resize(new_capacity, 0);
    }

    /// The whole region as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The whole region as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let buffer = Buffer::new();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn grows_to_power_of_two() {
        let mut buffer = Buffer::new();
        buffer.ensure_capacity(1000);
        assert_eq!(buffer.capacity(), 1024);
    }

    #[test]
    fn growth_preserves_contents() {
        let mut buffer = Buffer::with_capacity(4);
        buffer.as_mut_slice()[..4].copy_from_slice(b"abcd");
        buffer.ensure_capacity(100);
        assert_eq!(&buffer.as_slice()[..4], b"abcd");
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut buffer = Buffer::with_capacity(64);
        let capacity = buffer.capacity();
        buffer.ensure_capacity(10);
        assert_eq!(buffer.capacity(), capacity);
    }
}
