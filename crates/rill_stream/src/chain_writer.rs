// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Buffer, Object, ObjectState, Position, Status};
use rill_chain::Chain;

use crate::{ChainReader, FlushType, Reader, Writer};

/// A writer appending to a [`Chain`].
///
/// Bytes stage in a buffer window and move into the chain when the window
/// fills, on flush, and on close. Whole chains pass through
/// [`write_chain()`][Writer::write_chain] as zero-copy block transfers.
///
/// `read_mode()` hands out a [`ChainReader`] over a cheap snapshot of the
/// written content, so it stays valid however the writer continues.
#[derive(Debug, Default)]
pub struct ChainWriter {
    state: ObjectState,
    dest: Chain,
    buf: Buffer,
    cursor: usize,
}

impl ChainWriter {
    const MIN_STAGING: usize = 256;
    const MAX_STAGING: usize = 64 * 1024;

    /// Creates a writer appending to an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer appending to an existing chain.
    #[must_use]
    pub fn with_chain(dest: Chain) -> Self {
        Self {
            state: ObjectState::new(),
            dest,
            buf: Buffer::new(),
            cursor: 0,
        }
    }

    /// The number of logical bytes written so far.
    #[must_use]
    pub fn written_len(&self) -> usize {
        self.dest.len() + self.cursor
    }

    /// A reader over the bytes written so far, positioned at `initial_pos`.
    ///
    /// The reader holds a snapshot: blocks are shared, not copied, and later
    /// writes do not affect it.
    #[must_use]
    pub fn read_mode(&mut self, initial_pos: Position) -> ChainReader {
        self.flush_staged();
        let mut reader = ChainReader::new(self.dest.clone());
        let _ = reader.seek(initial_pos);
        reader
    }

    /// Closes the writer and returns the accumulated chain.
    #[must_use]
    pub fn into_chain(mut self) -> Chain {
        self.close();
        std::mem::take(&mut self.dest)
    }

    fn flush_staged(&mut self) {
        if self.cursor > 0 {
            let staged = &self.buf.as_slice()[..self.cursor];
            self.dest.append(staged);
            self.cursor = 0;
        }
    }
}

impl Object for ChainWriter {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn done(&mut self) {
        self.flush_staged();
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at byte {}", self.dest.len() + self.cursor))
    }
}

impl Writer for ChainWriter {
    fn window_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut_slice()
    }

    fn window_len(&self) -> usize {
        self.buf.capacity()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.window_len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        (self.dest.len() + self.buf.capacity()) as Position
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.flush_staged();
        let want = min
            .max(recommended.min(Self::MAX_STAGING))
            .max(Self::MIN_STAGING);
        self.buf.ensure_capacity(want);
        true
    }

    fn supports_read_mode(&self) -> bool {
        true
    }

    fn size(&mut self) -> Option<Position> {
        Some((self.dest.len() + self.cursor) as Position)
    }

    fn flush(&mut self, _flush_type: FlushType) -> bool {
        if !self.ok() {
            return false;
        }
        self.flush_staged();
        true
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        if !self.ok() {
            return false;
        }
        // Blocks transfer to the destination without copying.
        self.flush_staged();
        self.dest.append_chain(src.clone());
        true
    }
}

impl Drop for ChainWriter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::Reader;

    use super::*;

    #[test]
    fn writes_accumulate_into_the_chain() {
        let mut writer = ChainWriter::new();
        assert!(writer.write(b"hello "));
        assert!(writer.write(b"chain"));
        assert_eq!(writer.pos(), 11);
        assert_eq!(writer.into_chain(), *b"hello chain");
    }

    #[test]
    fn chain_writes_share_blocks() {
        let mut payload = Chain::new();
        payload.append(&vec![b'p'; 10_000]);

        let mut writer = ChainWriter::new();
        writer.write(b"head:");
        assert!(writer.write_chain(&payload));
        let result = writer.into_chain();
        assert_eq!(result.len(), 10_005);
    }

    #[test]
    fn read_mode_sees_written_bytes() {
        let mut writer = ChainWriter::new();
        writer.write(b"0123456789");
        let mut reader = writer.read_mode(0);
        let mut out = Vec::new();
        assert_eq!(reader.read_to_vec(10, &mut out), 10);
        assert_eq!(out, b"0123456789");
        assert!(reader.verify_end());
    }

    #[test]
    fn read_mode_snapshot_survives_later_writes() {
        let mut writer = ChainWriter::new();
        writer.write(b"stable");
        let mut reader = writer.read_mode(0);
        writer.write(b"-more");
        let mut out = Vec::new();
        assert_eq!(reader.read_to_vec(16, &mut out), 6);
        assert_eq!(out, b"stable");
        assert_eq!(writer.into_chain(), *b"stable-more");
    }

    #[test]
    fn flush_moves_staged_bytes() {
        let mut writer = ChainWriter::new();
        writer.write(b"staged");
        assert!(writer.flush(FlushType::FromObject));
        assert_eq!(writer.size(), Some(6));
    }
}
