// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use crate::block::{Block, INLINE_CAPACITY};

// Inline block storage for chains of few segments, which is the common case
// when a writer stages into one tail block.
const INLINE_BLOCKS: usize = 4;

/// Controls the block-size schedule of a [`Chain`].
#[derive(Clone, Copy, Debug)]
pub struct ChainOptions {
    min_block_size: usize,
    max_block_size: usize,
}

impl ChainOptions {
    /// The smallest capacity allocated for a new block. Default 16.
    #[must_use]
    pub fn with_min_block_size(mut self, min_block_size: usize) -> Self {
        self.min_block_size = min_block_size.max(1);
        self
    }

    /// The largest block a chain will create on its own. Default 64 KiB.
    /// Larger data arrives only through zero-copy block transfer.
    #[must_use]
    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size.max(self.min_block_size);
        self
    }

    #[must_use]
    pub(crate) fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    #[must_use]
    pub(crate) fn max_block_size(&self) -> usize {
        self.max_block_size
    }
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            min_block_size: 16,
            max_block_size: 64 * 1024,
        }
    }
}

/// A segmented byte sequence.
///
/// A `Chain` is an ordered sequence of [`Block`]s: inline short data, shared
/// heap regions, or external regions with a disposer. The logical bytes are
/// the concatenation of the blocks; block boundaries are visible through
/// [`blocks()`][Self::blocks] but carry no meaning.
///
/// Chains are the carrier used when a stream layer yields ownership of
/// possibly-large data without copying: cloning a chain clones block
/// references, and [`append_chain()`][Self::append_chain] /
/// [`prepend_chain()`][Self::prepend_chain] transfer blocks wholesale.
///
/// ```
/// use rill_chain::Chain;
///
/// let mut chain = Chain::new();
/// chain.append(b"hello ");
/// chain.append(b"world");
///
/// let snapshot = chain.clone(); // cheap, by reference
/// chain.remove_prefix(6);
/// assert_eq!(chain, *b"world");
/// assert_eq!(snapshot, *b"hello world");
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    blocks: SmallVec<[Block; INLINE_BLOCKS]>,
    len: usize,
    options: ChainOptions,
}

impl Chain {
    /// Creates an empty chain with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty chain with the given block-size schedule.
    #[must_use]
    pub fn with_options(options: ChainOptions) -> Self {
        Self {
            blocks: SmallVec::new(),
            len: 0,
            options,
        }
    }

    /// The number of logical bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chain has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes all bytes, releasing block references.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }

    /// Appends a copy of `bytes`.
    ///
    /// Short data packs into the extendable tail block; long data is chunked
    /// along the block-size schedule.
    pub fn append(&mut self, mut bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        if let Some(tail) = self.blocks.last_mut() {
            if tail.is_extendable() {
                let take = tail.spare_capacity(self.options.max_block_size()).min(bytes.len());
                if take > 0 {
                    tail.extend_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                }
            }
        }
        while !bytes.is_empty() {
            let take = bytes.len().min(self.options.max_block_size());
            if take <= INLINE_CAPACITY {
                self.blocks.push(Block::copied_from_slice(&bytes[..take]));
            } else {
                let capacity = self.grown_block_capacity(take);
                let mut block = Block::with_capacity(capacity);
                block.extend_from_slice(&bytes[..take]);
                self.blocks.push(block);
            }
            bytes = &bytes[take..];
        }
    }

    /// Prepends a copy of `bytes`.
    pub fn prepend(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        // Chunked in reverse so the insertions land in logical order.
        let mut chunks: SmallVec<[&[u8]; 4]> = SmallVec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let take = rest.len().min(self.options.max_block_size());
            chunks.push(&rest[..take]);
            rest = &rest[take..];
        }
        for chunk in chunks.into_iter().rev() {
            self.blocks.insert(0, Block::copied_from_slice(chunk));
        }
    }

    /// Appends another chain's blocks without copying their bytes.
    pub fn append_chain(&mut self, src: Chain) {
        self.len += src.len;
        self.blocks.extend(src.blocks);
    }

    /// Prepends another chain's blocks without copying their bytes.
    pub fn prepend_chain(&mut self, src: Chain) {
        self.len += src.len;
        self.blocks.insert_many(0, src.blocks);
    }

    /// Appends a block without copying its bytes.
    pub fn append_block(&mut self, block: Block) {
        if block.is_empty() {
            return;
        }
        self.len += block.len();
        self.blocks.push(block);
    }

    /// Prepends a block without copying its bytes.
    pub fn prepend_block(&mut self, block: Block) {
        if block.is_empty() {
            return;
        }
        self.len += block.len();
        self.blocks.insert(0, block);
    }

    /// Reserves a writable span of at least `min` and at most `max` bytes at
    /// the end of the chain.
    ///
    /// The span prefers `recommended` bytes, adjusted along the block-size
    /// schedule. The bytes become part of the chain only when the caller
    /// announces how many it used via [`AppendBuffer::commit()`]; dropping the
    /// span without committing discards it.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn append_buffer(&mut self, min: usize, recommended: usize, max: usize) -> AppendBuffer<'_> {
        assert!(min <= max, "append_buffer with min {min} > max {max}");
        let recommended = recommended.clamp(min, max);
        let reuse = self.blocks.last().map_or(false, Block::is_extendable);
        let want = self.grown_block_capacity(recommended).clamp(min.max(1), max.max(1));
        if !reuse {
            self.blocks.push(Block::with_capacity(want));
        }
        let tail = self.blocks.last_mut().expect("a tail block was just ensured");
        tail.promote_to_owned(want + tail.len());
        let vec = tail.owned_vec_mut();
        let base = vec.len();
        let span = want.max(min).min(max);
        vec.resize(base + span, 0);
        AppendBuffer {
            chain: self,
            base,
            capacity: span,
            committed: false,
        }
    }

    fn tail_block(&self) -> &Block {
        self.blocks.last().expect("a span is outstanding on the tail block")
    }

    fn tail_block_mut(&mut self) -> &mut Block {
        self.blocks.last_mut().expect("a span is outstanding on the tail block")
    }

    /// Drops the first `n` logical bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n > len()`.
    pub fn remove_prefix(&mut self, n: usize) {
        assert!(n <= self.len, "remove_prefix of {n} bytes from a chain of {} bytes", self.len);
        self.len -= n;
        let mut remaining = n;
        while remaining > 0 {
            let first_len = self.blocks[0].len();
            if first_len <= remaining {
                remaining -= first_len;
                self.blocks.remove(0);
            } else {
                self.blocks[0].remove_prefix(remaining);
                break;
            }
        }
    }

    /// Drops the last `n` logical bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n > len()`.
    pub fn remove_suffix(&mut self, n: usize) {
        assert!(n <= self.len, "remove_suffix of {n} bytes from a chain of {} bytes", self.len);
        self.len -= n;
        let mut remaining = n;
        while remaining > 0 {
            let last_len = self.blocks.last().expect("blocks remain while bytes remain").len();
            if last_len <= remaining {
                remaining -= last_len;
                self.blocks.pop();
            } else {
                self.blocks.last_mut().expect("just checked").remove_suffix(remaining);
                break;
            }
        }
    }

    /// Copies the logical bytes to the front of `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than [`len()`][Self::len].
    pub fn copy_to(&self, dst: &mut [u8]) {
        assert!(dst.len() >= self.len, "destination of {} bytes for a chain of {} bytes", dst.len(), self.len);
        let mut at = 0;
        for block in &self.blocks {
            let bytes = block.as_slice();
            dst[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        }
    }

    /// The logical bytes as one contiguous vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0; self.len];
        self.copy_to(&mut out);
        out
    }

    /// Iterates over the blocks' byte slices in logical order.
    pub fn blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks.iter().map(Block::as_slice)
    }

    /// The number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The bytes of block `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= block_count()`.
    #[must_use]
    pub fn block(&self, index: usize) -> &[u8] {
        self.blocks[index].as_slice()
    }

    // Block capacity for new allocations: grows with the chain so that long
    // sequences settle into large blocks, clamped to the schedule.
    fn grown_block_capacity(&self, required: usize) -> usize {
        let schedule = self
            .len
            .clamp(self.options.min_block_size(), self.options.max_block_size());
        schedule.max(required.min(self.options.max_block_size()))
    }
}

/// A writable span reserved at the end of a [`Chain`] by
/// [`Chain::append_buffer()`].
///
/// Dereferences to the span's bytes. Call [`commit()`][Self::commit] with the
/// number of bytes actually used; dropping without committing discards the
/// whole span.
pub struct AppendBuffer<'a> {
    chain: &'a mut Chain,
    base: usize,
    capacity: usize,
    committed: bool,
}

impl AppendBuffer<'_> {
    /// The span length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Makes the first `used` bytes of the span part of the chain and
    /// discards the rest.
    ///
    /// # Panics
    ///
    /// Panics if `used > capacity()`.
    pub fn commit(mut self, used: usize) {
        assert!(used <= self.capacity, "committed {used} bytes into a span of {} bytes", self.capacity);
        self.truncate_to(used);
        self.chain.len += used;
        self.committed = true;
    }

    fn truncate_to(&mut self, used: usize) {
        let end = self.base + used;
        let block = self.chain.tail_block_mut();
        block.owned_vec_mut().truncate(end);
        block.set_end(end);
        if block.is_empty() {
            // Keep the no-empty-blocks invariant when nothing was ever
            // committed into a freshly reserved block.
            self.chain.blocks.pop();
        }
    }
}

impl Deref for AppendBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.chain.tail_block().owned_vec()[self.base..self.base + self.capacity]
    }
}

impl DerefMut for AppendBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let range = self.base..self.base + self.capacity;
        &mut self.chain.tail_block_mut().owned_vec_mut()[range]
    }
}

impl Drop for AppendBuffer<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.truncate_to(0);
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("len", &self.len)
            .field("blocks", &self.blocks)
            .finish()
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        // Blockwise comparison; boundaries on the two sides need not align.
        let mut ours = self.blocks().filter(|b| !b.is_empty());
        let mut theirs = other.blocks().filter(|b| !b.is_empty());
        let (mut a, mut b): (&[u8], &[u8]) = (&[], &[]);
        loop {
            if a.is_empty() {
                a = match ours.next() {
                    Some(block) => block,
                    None => return b.is_empty() && theirs.next().is_none(),
                };
            }
            if b.is_empty() {
                b = match theirs.next() {
                    Some(block) => block,
                    None => return false,
                };
            }
            let n = a.len().min(b.len());
            if a[..n] != b[..n] {
                return false;
            }
            a = &a[n..];
            b = &b[n..];
        }
    }
}

impl Eq for Chain {}

impl PartialEq<[u8]> for Chain {
    fn eq(&self, other: &[u8]) -> bool {
        if self.len != other.len() {
            return false;
        }
        let mut at = 0;
        for block in self.blocks() {
            if block != &other[at..at + block.len()] {
                return false;
            }
            at += block.len();
        }
        true
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Chain {
    fn eq(&self, other: &[u8; N]) -> bool {
        *self == other[..]
    }
}

impl From<&[u8]> for Chain {
    fn from(bytes: &[u8]) -> Self {
        let mut chain = Self::new();
        chain.append(bytes);
        chain
    }
}

impl From<Vec<u8>> for Chain {
    fn from(bytes: Vec<u8>) -> Self {
        let mut chain = Self::new();
        chain.append_block(Block::from_vec(bytes));
        chain
    }
}

impl bytes::Buf for Chain {
    fn remaining(&self) -> usize {
        self.len
    }

    fn chunk(&self) -> &[u8] {
        self.blocks.first().map_or(&[], Block::as_slice)
    }

    fn advance(&mut self, cnt: usize) {
        self.remove_prefix(cnt);
    }
}
