// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};
use rill_chain::Chain;

use crate::reader::clamp_to_usize;
use crate::{Reader, Scratch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowMode {
    // The window is one block of the chain.
    Block,
    // The window is spliced scratch covering several blocks.
    Scratch,
}

/// A reader over a [`Chain`].
///
/// The window is normally the current block, so reading within a block is
/// zero-copy. A pull that must cross a block boundary splices the needed
/// bytes into [`Scratch`] and presents that as the window; the caller sees
/// the single contiguous view the reader contract promises either way.
///
/// Cloning the chain is cheap, so a `ChainReader` owns its chain and
/// [`new_reader()`][Reader::new_reader] hands out independent readers.
/// [`read_to_chain()`][Reader::read_to_chain] shares blocks instead of
/// copying.
#[derive(Debug)]
pub struct ChainReader {
    state: ObjectState,
    chain: Chain,
    mode: WindowMode,
    // Current block and the stream position of its first byte (Block mode).
    block_index: usize,
    block_start_pos: Position,
    cursor: usize,
    scratch: Scratch,
    // Stream position of scratch byte 0 (Scratch mode).
    scratch_start_pos: Position,
    // First block not yet consumed into scratch, and its start position.
    resume_block: usize,
    resume_pos: Position,
}

impl ChainReader {
    /// Creates a reader over `chain`, positioned at 0.
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self {
            state: ObjectState::new(),
            chain,
            mode: WindowMode::Block,
            block_index: 0,
            block_start_pos: 0,
            cursor: 0,
            scratch: Scratch::new(),
            scratch_start_pos: 0,
            resume_block: 0,
            resume_pos: 0,
        }
    }

    /// The underlying chain.
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    // Leaves a fully consumed window behind, landing in Block mode with the
    // cursor at the start of the first unconsumed block (or at the end).
    fn advance_past_window(&mut self) {
        debug_assert_eq!(self.available(), 0);
        match self.mode {
            WindowMode::Block => {
                if self.block_index < self.chain.block_count() {
                    self.block_start_pos += self.chain.block(self.block_index).len() as Position;
                    self.block_index += 1;
                    self.cursor = 0;
                }
            }
            WindowMode::Scratch => {
                self.mode = WindowMode::Block;
                self.block_index = self.resume_block;
                self.block_start_pos = self.resume_pos;
                self.cursor = 0;
                self.scratch.clear();
            }
        }
    }

    // Splices the unread remainder of the window plus as many following
    // blocks as `min` needs into scratch.
    fn splice_into_scratch(&mut self, min: usize) -> bool {
        match self.mode {
            WindowMode::Block => {
                self.scratch_start_pos = self.block_start_pos + self.cursor as Position;
                let Self { chain, scratch, .. } = self;
                if self.block_index < chain.block_count() {
                    scratch.begin(&chain.block(self.block_index)[self.cursor..]);
                    self.resume_pos =
                        self.block_start_pos + chain.block(self.block_index).len() as Position;
                    self.resume_block = self.block_index + 1;
                } else {
                    scratch.begin(&[]);
                    self.resume_pos = self.block_start_pos;
                    self.resume_block = self.block_index;
                }
                self.mode = WindowMode::Scratch;
                self.cursor = 0;
            }
            WindowMode::Scratch => {
                self.scratch.carry_unread(self.cursor);
                self.scratch_start_pos += self.cursor as Position;
                self.cursor = 0;
            }
        }
        let Self { chain, scratch, .. } = self;
        while scratch.len() < min && self.resume_block < chain.block_count() {
            let block = chain.block(self.resume_block);
            scratch.extend(block);
            self.resume_pos += block.len() as Position;
            self.resume_block += 1;
        }
        self.scratch.len() >= min
    }
}

impl Object for ChainReader {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at byte {}", self.pos()))
    }
}

impl Reader for ChainReader {
    fn window(&self) -> &[u8] {
        match self.mode {
            WindowMode::Block if self.block_index < self.chain.block_count() => {
                self.chain.block(self.block_index)
            }
            WindowMode::Block => &[],
            WindowMode::Scratch => self.scratch.filled(),
        }
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.window().len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        match self.mode {
            WindowMode::Block => self.block_start_pos + self.window().len() as Position,
            WindowMode::Scratch => self.scratch_start_pos + self.scratch.len() as Position,
        }
    }

    fn pull_slow(&mut self, min: usize, _recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        let min = min.max(1);
        if self.available() == 0 {
            self.advance_past_window();
            if self.block_index >= self.chain.block_count() {
                return false;
            }
            if self.chain.block(self.block_index).len() >= min {
                return true;
            }
        }
        self.splice_into_scratch(min)
    }

    fn supports_rewind(&self) -> bool {
        true
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn supports_size(&self) -> bool {
        true
    }

    fn supports_new_reader(&self) -> bool {
        true
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        let target = clamp_to_usize(new_pos.min(self.chain.len() as Position));
        self.mode = WindowMode::Block;
        self.scratch.clear();
        let mut start = 0_usize;
        let mut index = 0_usize;
        while index < self.chain.block_count() && start + self.chain.block(index).len() <= target {
            start += self.chain.block(index).len();
            index += 1;
        }
        self.block_index = index;
        self.block_start_pos = start as Position;
        self.cursor = target - start;
        new_pos <= self.chain.len() as Position
    }

    fn size(&mut self) -> Option<Position> {
        Some(self.chain.len() as Position)
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        let mut reader = ChainReader::new(self.chain.clone());
        let _ = reader.seek(initial_pos);
        Some(Box::new(reader))
    }

    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        if !self.ok() {
            return 0;
        }
        // Shares the covered blocks instead of copying them.
        let pos = clamp_to_usize(self.pos());
        let take = len.min(self.chain.len() - pos);
        let mut piece = self.chain.clone();
        piece.remove_suffix(self.chain.len() - pos - take);
        piece.remove_prefix(pos);
        dst.append_chain(piece);
        let reached = self.seek(self.pos() + take as Position);
        debug_assert!(reached);
        take
    }
}

#[cfg(test)]
mod tests {
    use rill_chain::Block;

    use super::*;

    fn bursty_chain(bursts: &[&[u8]]) -> Chain {
        let mut chain = Chain::new();
        for burst in bursts {
            chain.append_block(Block::from_vec(burst.to_vec()));
        }
        chain
    }

    #[test]
    fn pull_within_a_block_is_direct() {
        let mut reader = ChainReader::new(bursty_chain(&[b"abcdef"]));
        assert!(reader.pull(4, 6));
        assert_eq!(&reader.window()[reader.cursor()..][..4], b"abcd");
    }

    #[test]
    fn pull_across_blocks_splices_a_contiguous_window() {
        let mut reader = ChainReader::new(bursty_chain(&[b"abc", b"def", b"ghi"]));
        assert!(reader.pull(7, 7));
        let window = &reader.window()[reader.cursor()..];
        assert!(window.len() >= 7);
        assert_eq!(&window[..7], b"abcdefg");
        assert_eq!(reader.limit_pos(), 9);
    }

    #[test]
    fn reading_continues_past_the_splice() {
        let mut reader = ChainReader::new(bursty_chain(&[b"abc", b"def", b"ghi", b"jkl"]));
        let mut out = [0_u8; 7];
        assert_eq!(reader.read(&mut out), 7);
        assert_eq!(&out, b"abcdefg");
        let mut rest = Vec::new();
        assert_eq!(reader.read_to_vec(5, &mut rest), 5);
        assert_eq!(rest, b"hijkl");
        assert!(reader.verify_end());
    }

    #[test]
    fn seek_lands_on_exact_bytes() {
        let mut reader = ChainReader::new(bursty_chain(&[b"0123", b"4567", b"89"]));
        assert!(reader.seek(6));
        assert_eq!(reader.read_byte(), Some(b'6'));
        assert!(reader.seek(1), "rewind across blocks");
        assert_eq!(reader.read_byte(), Some(b'1'));
        assert!(!reader.seek(100));
        assert_eq!(reader.pos(), 10);
    }

    #[test]
    fn read_to_chain_shares_blocks() {
        let mut src = Chain::new();
        src.append_block(Block::from_vec(vec![b'x'; 1000]));
        src.append_block(Block::from_vec(vec![b'y'; 1000]));
        let mut reader = ChainReader::new(src);
        assert!(reader.seek(500));
        let mut dst = Chain::new();
        assert_eq!(reader.read_to_chain(1000, &mut dst), 1000);
        assert_eq!(dst.len(), 1000);
        let bytes = dst.to_vec();
        assert!(bytes[..500].iter().all(|&b| b == b'x'));
        assert!(bytes[500..].iter().all(|&b| b == b'y'));
        assert_eq!(reader.pos(), 1500);
    }

    #[test]
    fn empty_chain_is_immediate_end() {
        let mut reader = ChainReader::new(Chain::new());
        assert!(!reader.pull(1, 1));
        assert!(reader.ok());
        assert!(reader.verify_end());
    }

    #[test]
    fn sub_readers_do_not_disturb_the_parent() {
        let mut reader = ChainReader::new(bursty_chain(&[b"abc", b"def"]));
        assert_eq!(reader.read_byte(), Some(b'a'));
        {
            let mut sub = reader.new_reader(3).unwrap();
            assert_eq!(sub.read_byte(), Some(b'd'));
        }
        assert_eq!(reader.read_byte(), Some(b'b'));
    }
}
