// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

/// Bytes owned by something other than the chain, kept alive while any block
/// references them.
///
/// The implementor's `Drop` acts as the disposer: it runs when the last block
/// referencing the region is dropped. Implemented for free by anything that is
/// `AsRef<[u8]> + Send + Sync`.
pub trait ExternalBytes: Send + Sync {
    /// The referenced byte region. Must return the same region for the
    /// lifetime of the value.
    fn as_bytes(&self) -> &[u8];
}

impl<T> ExternalBytes for T
where
    T: AsRef<[u8]> + Send + Sync,
{
    fn as_bytes(&self) -> &[u8] {
        self.as_ref()
    }
}

/// Bytes small enough to live in the block itself, avoiding an allocation.
pub(crate) const INLINE_CAPACITY: usize = 24;

#[derive(Clone)]
pub(crate) enum BlockOwner {
    /// Short data stored in place.
    Inline { data: [u8; INLINE_CAPACITY], len: u8 },
    /// A heap region shared by reference counting. Extended in place while
    /// uniquely owned; frozen once shared.
    Owned(Arc<Vec<u8>>),
    /// A foreign region with its disposer.
    External(Arc<dyn ExternalBytes>),
}

/// One segment of a [`Chain`][crate::Chain].
///
/// A block is a view `[start, end)` into its owner's bytes, so cloning and
/// slicing never copy heap or external data. Cloning an inline block copies
/// its few bytes.
#[derive(Clone)]
pub struct Block {
    owner: BlockOwner,
    start: usize,
    end: usize,
}

impl Block {
    /// Creates a block owning `data`.
    ///
    /// Short data is stored inline; anything longer takes ownership of the
    /// vector without copying.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        if data.len() <= INLINE_CAPACITY {
            return Self::inline(&data);
        }
        let end = data.len();
        Self {
            owner: BlockOwner::Owned(Arc::new(data)),
            start: 0,
            end,
        }
    }

    /// Creates a block with a copy of `data`.
    #[must_use]
    pub fn copied_from_slice(data: &[u8]) -> Self {
        if data.len() <= INLINE_CAPACITY {
            return Self::inline(data);
        }
        Self::from_vec(data.to_vec())
    }

    /// Creates a block referencing a foreign byte region.
    ///
    /// The region is not copied. `owner` is dropped (disposing the region)
    /// when the last block referencing it is dropped.
    #[must_use]
    pub fn external(owner: impl ExternalBytes + 'static) -> Self {
        let owner: Arc<dyn ExternalBytes> = Arc::new(owner);
        let end = owner.as_bytes().len();
        Self {
            owner: BlockOwner::External(owner),
            start: 0,
            end,
        }
    }

    fn inline(data: &[u8]) -> Self {
        debug_assert!(data.len() <= INLINE_CAPACITY);
        let mut inline_data = [0_u8; INLINE_CAPACITY];
        inline_data[..data.len()].copy_from_slice(data);
        Self {
            owner: BlockOwner::Inline {
                data: inline_data,
                len: data.len() as u8,
            },
            start: 0,
            end: data.len(),
        }
    }

    /// Creates an empty owned block with room for `capacity` bytes, used by
    /// the chain as an extendable tail.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            owner: BlockOwner::Owned(Arc::new(Vec::with_capacity(capacity))),
            start: 0,
            end: 0,
        }
    }

    /// The number of bytes in the block's view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the block's view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The viewed bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.owner {
            BlockOwner::Inline { data, len } => &data[self.start..self.end.min(usize::from(*len))],
            BlockOwner::Owned(data) => &data[self.start..self.end],
            BlockOwner::External(owner) => &owner.as_bytes()[self.start..self.end],
        }
    }

    /// Narrows the view by dropping `n` bytes from the front.
    pub(crate) fn remove_prefix(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.start += n;
    }

    /// Narrows the view by dropping `n` bytes from the back.
    pub(crate) fn remove_suffix(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.end -= n;
    }

    /// Whether the block can be extended in place: an owned region whose view
    /// reaches the end of the bytes written so far and which no other chain
    /// shares.
    pub(crate) fn is_extendable(&self) -> bool {
        match &self.owner {
            BlockOwner::Inline { len, .. } => self.start == 0 && self.end == usize::from(*len),
            BlockOwner::Owned(data) => self.end == data.len() && Arc::strong_count(data) == 1,
            BlockOwner::External(_) => false,
        }
    }

    /// Room left for in-place extension without reallocating beyond
    /// `max_block_size`.
    pub(crate) fn spare_capacity(&self, max_block_size: usize) -> usize {
        match &self.owner {
            BlockOwner::Inline { .. } => INLINE_CAPACITY - self.end,
            BlockOwner::Owned(data) => max_block_size.saturating_sub(data.len()),
            BlockOwner::External(_) => 0,
        }
    }

    /// Appends `bytes` in place. Caller must have checked
    /// [`is_extendable()`][Self::is_extendable] and the spare capacity.
    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        match &mut self.owner {
            BlockOwner::Inline { data, len } => {
                data[self.end..self.end + bytes.len()].copy_from_slice(bytes);
                self.end += bytes.len();
                *len = self.end as u8;
            }
            BlockOwner::Owned(data) => {
                let data = Arc::get_mut(data).expect("extend_from_slice on a shared block");
                data.extend_from_slice(bytes);
                self.end = data.len();
            }
            BlockOwner::External(_) => unreachable!("external blocks are never extendable"),
        }
    }

    /// Converts an inline block into an owned block with at least `capacity`
    /// bytes of room, so that a writable span can point into stable heap
    /// memory.
    pub(crate) fn promote_to_owned(&mut self, capacity: usize) {
        if let BlockOwner::Inline { data, len } = &self.owner {
            let mut vec = Vec::with_capacity(capacity.max(usize::from(*len)));
            vec.extend_from_slice(&data[..usize::from(*len)]);
            self.start = 0;
            self.end = vec.len();
            self.owner = BlockOwner::Owned(Arc::new(vec));
        }
    }

    /// The owned vector backing this block. Panics on non-heap blocks;
    /// callers guard with [`is_extendable()`][Self::is_extendable].
    pub(crate) fn owned_vec(&self) -> &Vec<u8> {
        match &self.owner {
            BlockOwner::Owned(data) => data,
            _ => panic!("owned_vec on a non-owned block"),
        }
    }

    /// The owned vector backing this block. Panics unless the block is an
    /// uniquely owned heap block; callers guard with
    /// [`is_extendable()`][Self::is_extendable].
    pub(crate) fn owned_vec_mut(&mut self) -> &mut Vec<u8> {
        match &mut self.owner {
            BlockOwner::Owned(data) => Arc::get_mut(data).expect("owned_vec_mut on a shared block"),
            _ => panic!("owned_vec_mut on a non-owned block"),
        }
    }

    pub(crate) fn set_end(&mut self, end: usize) {
        self.end = end;
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.owner {
            BlockOwner::Inline { .. } => "inline",
            BlockOwner::Owned(_) => "owned",
            BlockOwner::External(_) => "external",
        };
        f.debug_struct("Block")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Block: Send, Sync);

    #[test]
    fn short_data_stays_inline() {
        let block = Block::copied_from_slice(b"short");
        assert!(matches!(block.owner, BlockOwner::Inline { .. }));
        assert_eq!(block.as_slice(), b"short");
    }

    #[test]
    fn long_data_goes_to_heap() {
        let data = vec![7_u8; INLINE_CAPACITY + 1];
        let block = Block::from_vec(data.clone());
        assert!(matches!(block.owner, BlockOwner::Owned(_)));
        assert_eq!(block.as_slice(), data.as_slice());
    }

    #[test]
    fn shared_block_is_not_extendable() {
        let block = Block::from_vec(vec![1_u8; 100]);
        assert!(block.is_extendable());
        let clone = block.clone();
        assert!(!block.is_extendable());
        drop(clone);
        assert!(block.is_extendable());
    }

    #[test]
    fn trimming_narrows_the_view() {
        let mut block = Block::from_vec((0..100).collect());
        block.remove_prefix(10);
        block.remove_suffix(20);
        assert_eq!(block.len(), 70);
        assert_eq!(block.as_slice()[0], 10);
        assert_eq!(*block.as_slice().last().unwrap(), 79);
    }

    #[test]
    fn external_disposer_runs_on_last_drop() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Region(Vec<u8>);

        impl AsRef<[u8]> for Region {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Drop for Region {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let block = Block::external(Region(vec![1, 2, 3]));
        let clone = block.clone();
        drop(block);
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);
        drop(clone);
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
    }
}
