// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Buffer, Object, ObjectState, Position, Status};
use rill_chain::Chain;

use crate::FlushType;

/// A push interface that grows the logical sequence from its end.
///
/// Each [`write()`][Self::write] places its bytes *before* everything written
/// earlier, so writing `"world"` then `"hello "` produces `"hello world"`.
/// Length-prefixed framing layers use this to emit a payload first and its
/// header afterwards without knowing the length in advance.
///
/// The cursor runs downwards: [`cursor()`][Self::cursor] is the index of the
/// first occupied byte of the window, free space is `[0, cursor)`, and
/// `pos()` is the total number of logical bytes written.
pub trait BackwardWriter: Object + Send {
    /// The window of bytes, occupied from [`cursor()`][Self::cursor] to its
    /// end.
    fn window_mut(&mut self) -> &mut [u8];

    /// The window length. Equals `window_mut().len()` but needs no mutable
    /// borrow.
    fn window_len(&self) -> usize;

    /// The index of the first occupied byte; free space is `[0, cursor)`.
    fn cursor(&self) -> usize;

    /// Moves the cursor down to `cursor`.
    fn set_cursor(&mut self, cursor: usize);

    /// The number of logical bytes already moved out of the window.
    fn start_pos(&self) -> Position;

    /// Makes room so that at least `min` free bytes precede the cursor,
    /// called by [`push()`][Self::push] only when the window cannot satisfy
    /// `min`. Returns `false` on failure.
    fn push_slow(&mut self, min: usize, recommended: usize) -> bool;

    /// Propagates written data with the given strength.
    fn flush(&mut self, flush_type: FlushType) -> bool {
        let _ = flush_type;
        self.ok()
    }

    /// The number of free bytes below the cursor.
    fn available(&self) -> usize {
        self.cursor()
    }

    /// The total number of logical bytes written.
    fn pos(&self) -> Position {
        self.start_pos() + (self.window_len() - self.cursor()) as Position
    }

    /// Ensures at least `min` free bytes precede the cursor.
    fn push(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.available() >= min || self.push_slow(min, recommended)
    }

    /// Writes all of `src` before everything written earlier. Returns
    /// `false` on failure.
    fn write(&mut self, src: &[u8]) -> bool {
        if !self.ok() {
            return false;
        }
        // Filled back to front so that partial window fills keep src's own
        // byte order intact.
        let mut end = src.len();
        while end > 0 {
            if self.available() == 0 && !self.push(1, end) {
                return false;
            }
            let n = self.available().min(end);
            let cursor = self.cursor();
            self.window_mut()[cursor - n..cursor].copy_from_slice(&src[end - n..end]);
            self.set_cursor(cursor - n);
            end -= n;
        }
        true
    }

    /// Writes all of `src` before everything written earlier, block by
    /// block in reverse order.
    fn write_chain(&mut self, src: &Chain) -> bool {
        for index in (0..src.block_count()).rev() {
            if !self.write(src.block(index)) {
                return false;
            }
        }
        true
    }
}

/// A [`BackwardWriter`] that prepends to a [`Chain`].
///
/// ```
/// use rill_stream::{BackwardWriter, ChainBackwardWriter};
///
/// let mut writer = ChainBackwardWriter::new();
/// writer.write(b"world");
/// writer.write(b"hello ");
/// assert_eq!(writer.into_chain(), *b"hello world");
/// ```
#[derive(Debug, Default)]
pub struct ChainBackwardWriter {
    state: ObjectState,
    dest: Chain,
    buf: Buffer,
    cursor: usize,
}

impl ChainBackwardWriter {
    const MIN_STAGING: usize = 256;

    /// Creates a writer prepending to an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer prepending to an existing chain.
    #[must_use]
    pub fn with_chain(dest: Chain) -> Self {
        Self {
            state: ObjectState::new(),
            dest,
            buf: Buffer::new(),
            cursor: 0,
        }
    }

    /// Closes the writer and returns the accumulated chain.
    #[must_use]
    pub fn into_chain(mut self) -> Chain {
        self.close();
        std::mem::take(&mut self.dest)
    }

    // Moves the staged bytes to the front of the chain.
    fn flush_staged(&mut self) {
        let staged = &self.buf.as_slice()[self.cursor..];
        if !staged.is_empty() {
            self.dest.prepend(staged);
        }
        self.cursor = self.buf.capacity();
    }
}

impl Object for ChainBackwardWriter {
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
        let pos = self.start_pos() + (self.window_len() - self.cursor) as Position;
        status.annotate(format!("at byte {pos}"))
    }
}

impl BackwardWriter for ChainBackwardWriter {
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

    fn start_pos(&self) -> Position {
        self.dest.len() as Position
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.flush_staged();
        let want = min.max(recommended.min(64 * 1024)).max(Self::MIN_STAGING);
        self.buf.ensure_capacity(want);
        self.cursor = self.buf.capacity();
        true
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
        // Blocks transfer to the chain without copying.
        self.flush_staged();
        self.dest.prepend_chain(src.clone());
        true
    }
}

impl Drop for ChainBackwardWriter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_grow_from_the_end() {
        let mut writer = ChainBackwardWriter::new();
        assert!(writer.write(b"tail"));
        assert!(writer.write(b"middle-"));
        assert!(writer.write(b"head-"));
        assert_eq!(writer.pos(), 16);
        assert_eq!(writer.into_chain(), *b"head-middle-tail");
    }

    #[test]
    fn large_writes_cross_staging_boundaries() {
        let mut writer = ChainBackwardWriter::new();
        let tail = vec![b'z'; 10_000];
        assert!(writer.write(&tail));
        assert!(writer.write(b"front"));
        let chain = writer.into_chain();
        assert_eq!(chain.len(), 10_005);
        let bytes = chain.to_vec();
        assert_eq!(&bytes[..5], b"front");
        assert!(bytes[5..].iter().all(|&b| b == b'z'));
    }

    #[test]
    fn chain_write_is_a_prepend() {
        let mut writer = ChainBackwardWriter::new();
        writer.write(b"-end");
        let mut payload = Chain::new();
        payload.append(b"payload");
        assert!(writer.write_chain(&payload));
        assert_eq!(writer.into_chain(), *b"payload-end");
    }

    #[test]
    fn length_prefix_framing_pattern() {
        // A frame written payload-first, then prefixed with its length, the
        // way tail-framing codecs use a backward writer.
        let payload = b"record contents";
        let mut writer = ChainBackwardWriter::new();
        writer.write(payload);
        let len = u32::try_from(payload.len()).unwrap();
        writer.write(&len.to_le_bytes());

        let framed = writer.into_chain().to_vec();
        assert_eq!(&framed[..4], &len.to_le_bytes());
        assert_eq!(&framed[4..], payload);
    }
}
