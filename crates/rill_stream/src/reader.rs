// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, Position, Status};
use rill_chain::Chain;

use crate::{BackwardWriter, Writer};

/// A cursor-based pull interface over a byte stream.
///
/// # The cursor window
///
/// Every reader exposes a contiguous window of bytes it has already obtained:
/// [`window()`][Self::window] is the `[start, limit)` slice,
/// [`cursor()`][Self::cursor] is an index into it marking the next byte to
/// deliver, and [`limit_pos()`][Self::limit_pos] is the absolute stream
/// position of the window's end. Derived quantities:
/// `available() = window().len() - cursor()` and
/// `pos() = limit_pos() - available()`.
///
/// The caller moves the cursor; the reader refills the window when the caller
/// asks for more than is available. A successful [`pull(min, _)`][Self::pull]
/// guarantees `available() >= min`. Addressing the window by index rather
/// than by pointer keeps the state valid across moves of the reader.
///
/// # Failure and end of data
///
/// A pull that cannot be satisfied because the data ends is a soft end:
/// `pull` returns `false` while [`ok()`][Object::ok] stays `true`. Any other
/// shortfall records a sticky status on the reader ([`Object::fail`]), after
/// which every operation keeps failing with that first status.
///
/// # Implementing
///
/// Implementations provide the window accessors,
/// [`pull_slow()`][Self::pull_slow], and whichever capability hooks the
/// backing medium supports; everything else is derived. Overriding a derived
/// operation is allowed where the backing store can do better, e.g. a
/// chain-backed reader serves [`read_to_chain()`][Self::read_to_chain] by
/// sharing blocks instead of copying.
pub trait Reader: Object + Send {
    /// The current `[start, limit)` window.
    fn window(&self) -> &[u8];

    /// The index of the next byte of [`window()`][Self::window] to deliver.
    fn cursor(&self) -> usize;

    /// Moves the cursor to `cursor`, which must be at most `window().len()`.
    ///
    /// Moving backwards within the window is allowed and re-delivers bytes.
    fn set_cursor(&mut self, cursor: usize);

    /// The absolute stream position of the window's end.
    fn limit_pos(&self) -> Position;

    /// Refills the window so that at least `min` bytes are available, called
    /// by [`pull()`][Self::pull] only when the window cannot satisfy `min`.
    ///
    /// `recommended` sizes the refill when the implementation has a choice.
    /// Returns `false` on end of data (with `ok()` still `true`) or on
    /// failure.
    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool;

    /// Whether [`seek()`][Self::seek] can move backwards.
    fn supports_rewind(&self) -> bool {
        false
    }

    /// Whether [`seek()`][Self::seek] is cheap in both directions.
    fn supports_random_access(&self) -> bool {
        false
    }

    /// Whether [`size()`][Self::size] is supported.
    fn supports_size(&self) -> bool {
        false
    }

    /// Whether [`new_reader()`][Self::new_reader] is supported.
    fn supports_new_reader(&self) -> bool {
        false
    }

    /// Repositioning outside the current window, called by
    /// [`seek()`][Self::seek].
    ///
    /// The default supports forward movement only, by reading and discarding;
    /// it returns `false` if the data ends first. Backward movement fails
    /// with [`failed_precondition`][Status::failed_precondition] unless the
    /// implementation overrides this.
    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        if new_pos < self.pos() {
            return self.fail(Status::failed_precondition("stream does not support rewinding"));
        }
        skip_forward(self, new_pos)
    }

    /// The total stream size in bytes, when the backing medium knows it.
    fn size(&mut self) -> Option<Position> {
        None
    }

    /// Creates an independent reader over the same stream, positioned at
    /// `initial_pos`, when the backing medium supports independent cursors.
    ///
    /// The returned reader borrows from `self` only by lifetime; whether it
    /// may be driven from another thread is part of the backing medium's
    /// [`new_source`][crate::Source::new_source] contract.
    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        let _ = initial_pos;
        None
    }

    /// Advises that the caller intends to read all remaining data, which
    /// permits the backing medium to map or coalesce it.
    fn set_read_all_hint(&mut self, hint: bool) {
        let _ = hint;
    }

    /// The number of bytes available in the window.
    fn available(&self) -> usize {
        self.window().len() - self.cursor()
    }

    /// The absolute stream position of the cursor.
    fn pos(&self) -> Position {
        self.limit_pos() - self.available() as Position
    }

    /// Ensures at least `min` bytes are available, refilling if needed.
    ///
    /// Returns `false` when the data ends first (soft end, `ok()` stays
    /// `true`) or when the reader has failed.
    fn pull(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.available() >= min || self.pull_slow(min, recommended)
    }

    /// Reads exactly `dst.len()` bytes into `dst`, returning the count
    /// actually read.
    ///
    /// A short count means the data ended (check [`ok()`][Object::ok] to
    /// distinguish end of data from failure).
    fn read(&mut self, dst: &mut [u8]) -> usize {
        if !self.ok() {
            return 0;
        }
        let mut copied = 0;
        while copied < dst.len() {
            if self.available() == 0 && !self.pull(1, dst.len() - copied) {
                break;
            }
            let cursor = self.cursor();
            let n = self.available().min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&self.window()[cursor..cursor + n]);
            self.set_cursor(cursor + n);
            copied += n;
        }
        copied
    }

    /// Reads the next byte.
    fn read_byte(&mut self) -> Option<u8> {
        if !self.ok() {
            return None;
        }
        if self.available() == 0 && !self.pull(1, 1) {
            return None;
        }
        let cursor = self.cursor();
        let byte = self.window()[cursor];
        self.set_cursor(cursor + 1);
        Some(byte)
    }

    /// Reads exactly `len` bytes, appending them to `dst`. Returns the count
    /// actually read; a short count means the data ended.
    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        if !self.ok() {
            return 0;
        }
        let mut copied = 0;
        while copied < len {
            if self.available() == 0 && !self.pull(1, len - copied) {
                break;
            }
            let cursor = self.cursor();
            let n = self.available().min(len - copied);
            dst.append(&self.window()[cursor..cursor + n]);
            self.set_cursor(cursor + n);
            copied += n;
        }
        copied
    }

    /// Reads everything up to the end of data, appending it to `dst`.
    ///
    /// Returns `false` on failure; reaching the end is success. Announces the
    /// intent via [`set_read_all_hint()`][Self::set_read_all_hint] first so
    /// the backing medium may coalesce the remainder.
    fn read_all_to_chain(&mut self, dst: &mut Chain) -> bool {
        if !self.ok() {
            return false;
        }
        self.set_read_all_hint(true);
        while self.pull(1, 64 * 1024) {
            let cursor = self.cursor();
            let available = self.available();
            dst.append(&self.window()[cursor..cursor + available]);
            self.set_cursor(cursor + available);
        }
        self.ok()
    }

    /// Reads exactly `len` bytes, appending them to `dst`. Returns the count
    /// actually read; a short count means the data ended.
    fn read_to_vec(&mut self, len: usize, dst: &mut Vec<u8>) -> usize {
        let base = dst.len();
        dst.resize(base + len, 0);
        let copied = self.read(&mut dst[base..]);
        dst.truncate(base + copied);
        copied
    }

    /// Transfers exactly `len` bytes to `dst` with the least copying the two
    /// window structures allow.
    ///
    /// Returns `false` when the data ends first or either side fails.
    fn copy_to(&mut self, len: Position, dst: &mut dyn Writer) -> bool {
        if !self.ok() {
            return false;
        }
        let mut remaining = len;
        while remaining > 0 {
            if self.available() == 0 && !self.pull(1, clamp_to_usize(remaining)) {
                return false;
            }
            let cursor = self.cursor();
            let n = self.available().min(clamp_to_usize(remaining));
            if !dst.write(&self.window()[cursor..cursor + n]) {
                return false;
            }
            self.set_cursor(cursor + n);
            remaining -= n as Position;
        }
        true
    }

    /// Transfers exactly `len` bytes to `dst`, which receives them as one
    /// prepend so the logical order is preserved.
    ///
    /// Returns `false` when the data ends first or either side fails.
    fn copy_to_backward(&mut self, len: usize, dst: &mut dyn BackwardWriter) -> bool {
        let mut staged = Chain::new();
        if self.read_to_chain(len, &mut staged) < len {
            return false;
        }
        dst.write_chain(&staged)
    }

    /// Discards exactly `len` bytes. Returns `false` when the data ends
    /// first.
    fn skip(&mut self, len: Position) -> bool {
        match self.pos().checked_add(len) {
            Some(new_pos) => self.seek(new_pos),
            None => self.fail_overflow(),
        }
    }

    /// Moves the cursor to absolute position `new_pos`.
    ///
    /// Positions inside the current window are a cursor move; anything else
    /// goes through [`seek_slow()`][Self::seek_slow]. Returns `false` when
    /// `new_pos` is past the end of data (the cursor stops at the end) or on
    /// failure.
    fn seek(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        let start_pos = self.limit_pos() - self.window().len() as Position;
        if new_pos >= start_pos && new_pos <= self.limit_pos() {
            self.set_cursor((new_pos - start_pos) as usize);
            return true;
        }
        self.seek_slow(new_pos)
    }

    /// Verifies that no data remains, recording
    /// [`failed_precondition`][Status::failed_precondition] if it does.
    ///
    /// Used at teardown for integrity checks.
    fn verify_end(&mut self) -> bool {
        if !self.ok() {
            return false;
        }
        if self.pull(1, 1) {
            return self.fail(Status::failed_precondition("end of data expected"));
        }
        // The pull may have failed rather than reached a clean end.
        self.ok()
    }
}

/// Moves `reader` forward to `new_pos` by reading and discarding.
///
/// Returns `false` if the data ends first, leaving the cursor at the end.
pub(crate) fn skip_forward<R: Reader + ?Sized>(reader: &mut R, new_pos: Position) -> bool {
    loop {
        let remaining = new_pos - reader.pos();
        let in_window = reader.available().min(clamp_to_usize(remaining));
        reader.set_cursor(reader.cursor() + in_window);
        if reader.pos() == new_pos {
            return true;
        }
        let hint = clamp_to_usize(new_pos - reader.pos());
        if !reader.pull(1, hint) {
            return false;
        }
    }
}

pub(crate) fn clamp_to_usize(len: Position) -> usize {
    usize::try_from(len).unwrap_or(usize::MAX)
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn window(&self) -> &[u8] {
        (**self).window()
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

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        (**self).pull_slow(min, recommended)
    }

    fn supports_rewind(&self) -> bool {
        (**self).supports_rewind()
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn supports_size(&self) -> bool {
        (**self).supports_size()
    }

    fn supports_new_reader(&self) -> bool {
        (**self).supports_new_reader()
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        (**self).seek_slow(new_pos)
    }

    fn size(&mut self) -> Option<Position> {
        (**self).size()
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        (**self).new_reader(initial_pos)
    }

    fn set_read_all_hint(&mut self, hint: bool) {
        (**self).set_read_all_hint(hint);
    }

    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        (**self).read_to_chain(len, dst)
    }

    fn verify_end(&mut self) -> bool {
        (**self).verify_end()
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn window(&self) -> &[u8] {
        (**self).window()
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

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        (**self).pull_slow(min, recommended)
    }

    fn supports_rewind(&self) -> bool {
        (**self).supports_rewind()
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    fn supports_size(&self) -> bool {
        (**self).supports_size()
    }

    fn supports_new_reader(&self) -> bool {
        (**self).supports_new_reader()
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        (**self).seek_slow(new_pos)
    }

    fn size(&mut self) -> Option<Position> {
        (**self).size()
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        (**self).new_reader(initial_pos)
    }

    fn set_read_all_hint(&mut self, hint: bool) {
        (**self).set_read_all_hint(hint);
    }

    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        (**self).read_to_chain(len, dst)
    }

    fn verify_end(&mut self) -> bool {
        (**self).verify_end()
    }
}
