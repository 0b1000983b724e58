// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, Position, Status};
use rill_chain::Chain;

use crate::reader::clamp_to_usize;
use crate::FlushType;

const ZEROS: [u8; 4096] = [0; 4096];

/// A cursor-based push interface over a byte stream.
///
/// The mirror image of [`Reader`][crate::Reader]: the window
/// ([`window_mut()`][Self::window_mut], indexed by
/// [`cursor()`][Self::cursor]) is writable space, a successful
/// [`push(min, _)`][Self::push] guarantees `available() >= min`, and
/// `pos() = limit_pos() - available()` is the number of logical bytes written
/// so far. Failures are sticky through [`Object`].
///
/// Implementations provide the window accessors,
/// [`push_slow()`][Self::push_slow], and the capability hooks of the backing
/// medium; the write operations are derived.
pub trait Writer: Object + Send {
    /// The current `[start, limit)` window of writable bytes.
    fn window_mut(&mut self) -> &mut [u8];

    /// The window length. Equals `window_mut().len()` but needs no mutable
    /// borrow.
    fn window_len(&self) -> usize;

    /// The index of the next byte of the window to fill.
    fn cursor(&self) -> usize;

    /// Moves the cursor to `cursor`, which must be at most
    /// [`window_len()`][Self::window_len].
    fn set_cursor(&mut self, cursor: usize);

    /// The absolute stream position of the window's end.
    fn limit_pos(&self) -> Position;

    /// Makes room so that at least `min` bytes are available, called by
    /// [`push()`][Self::push] only when the window cannot satisfy `min`.
    ///
    /// `recommended` sizes the new window when the implementation has a
    /// choice. Returns `false` on failure.
    fn push_slow(&mut self, min: usize, recommended: usize) -> bool;

    /// Whether [`seek()`][Self::seek] and rewriting already-written bytes are
    /// supported.
    fn supports_random_access(&self) -> bool {
        false
    }

    /// Whether [`truncate()`][Self::truncate] is supported.
    fn supports_truncate(&self) -> bool {
        false
    }

    /// Whether the writer can expose a reader over its written content; see
    /// the concrete writer's `read_mode()`.
    fn supports_read_mode(&self) -> bool {
        false
    }

    /// Moves the write position to `new_pos` within the already-written
    /// region.
    fn seek(&mut self, new_pos: Position) -> bool {
        let _ = new_pos;
        self.fail(Status::failed_precondition("writer does not support seeking"))
    }

    /// Discards everything past the first `len` logical bytes.
    fn truncate(&mut self, len: Position) -> bool {
        let _ = len;
        self.fail(Status::failed_precondition("writer does not support truncation"))
    }

    /// The total number of logical bytes written, when tracked.
    fn size(&mut self) -> Option<Position> {
        None
    }

    /// Propagates written data with the given strength.
    ///
    /// The default succeeds for healthy writers that buffer nothing.
    fn flush(&mut self, flush_type: FlushType) -> bool {
        let _ = flush_type;
        self.ok()
    }

    /// The number of writable bytes in the window.
    fn available(&self) -> usize {
        self.window_len() - self.cursor()
    }

    /// The absolute stream position of the cursor.
    fn pos(&self) -> Position {
        self.limit_pos() - self.available() as Position
    }

    /// Ensures at least `min` writable bytes are available.
    fn push(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.available() >= min || self.push_slow(min, recommended)
    }

    /// Writes all of `src`. Returns `false` on failure.
    fn write(&mut self, src: &[u8]) -> bool {
        if !self.ok() {
            return false;
        }
        let mut at = 0;
        while at < src.len() {
            if self.available() == 0 && !self.push(1, src.len() - at) {
                return false;
            }
            let cursor = self.cursor();
            let n = self.available().min(src.len() - at);
            self.window_mut()[cursor..cursor + n].copy_from_slice(&src[at..at + n]);
            self.set_cursor(cursor + n);
            at += n;
        }
        true
    }

    /// Writes all of `src`, block by block.
    ///
    /// Chain-backed writers override this to share blocks instead of copying.
    fn write_chain(&mut self, src: &Chain) -> bool {
        for block in src.blocks() {
            if !self.write(block) {
                return false;
            }
        }
        true
    }

    /// Writes `len` zero bytes.
    fn write_zeros(&mut self, len: Position) -> bool {
        let mut remaining = len;
        while remaining > 0 {
            let n = clamp_to_usize(remaining).min(ZEROS.len());
            if !self.write(&ZEROS[..n]) {
                return false;
            }
            remaining -= n as Position;
        }
        true
    }
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn window_mut(&mut self) -> &mut [u8] {
        (**self).window_mut()
    }

    fn window_len(&self) -> usize {
        (**self).window_len()
    }

    fn cursor(&self) -> usize {
        (**self).cursor()
    }

    fn set_cursor(&mut self, cursor: usize) {
        (**self).set_cursor(cursor);
    }

    fn limit_pos(&self) -> Position {
        (**self).limit_pos()
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        (**self).push_slow(min, recommended)
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        (**self).supports_truncate()
    }

    fn supports_read_mode(&self) -> bool {
        (**self).supports_read_mode()
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        (**self).seek(new_pos)
    }

    fn truncate(&mut self, len: Position) -> bool {
        (**self).truncate(len)
    }

    fn size(&mut self) -> Option<Position> {
        (**self).size()
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        (**self).flush(flush_type)
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        (**self).write_chain(src)
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn window_mut(&mut self) -> &mut [u8] {
        (**self).window_mut()
    }

    fn window_len(&self) -> usize {
        (**self).window_len()
    }

    fn cursor(&self) -> usize {
        (**self).cursor()
    }

    fn set_cursor(&mut self, cursor: usize) {
        (**self).set_cursor(cursor);
    }

    fn limit_pos(&self) -> Position {
        (**self).limit_pos()
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        (**self).push_slow(min, recommended)
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        (**self).supports_truncate()
    }

    fn supports_read_mode(&self) -> bool {
        (**self).supports_read_mode()
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        (**self).seek(new_pos)
    }

    fn truncate(&mut self, len: Position) -> bool {
        (**self).truncate(len)
    }

    fn size(&mut self) -> Option<Position> {
        (**self).size()
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        (**self).flush(flush_type)
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        (**self).write_chain(src)
    }
}
