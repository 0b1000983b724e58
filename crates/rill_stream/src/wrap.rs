// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};
use rill_chain::Chain;

use crate::{FlushType, Reader, Writer};

/// A reader that forwards every operation to another reader.
///
/// Primarily a type adapter: it turns any `R: Reader` into a concrete nominal
/// type without changing behavior, including capability queries. Useful when
/// an API wants to expose an inner reader under its own name.
#[derive(Debug)]
pub struct WrapReader<R: Reader> {
    inner: R,
}

impl<R: Reader> WrapReader<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped reader.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwraps the reader.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Reader> Object for WrapReader<R> {
    fn state(&self) -> &ObjectState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        self.inner.state_mut()
    }

    fn done(&mut self) {
        self.inner.done();
    }

    fn annotate_status(&self, status: Status) -> Status {
        self.inner.annotate_status(status)
    }
}

impl<R: Reader> Reader for WrapReader<R> {
    fn window(&self) -> &[u8] {
        self.inner.window()
    }

    fn cursor(&self) -> usize {
        self.inner.cursor()
    }

    fn set_cursor(&mut self, cursor: usize) {
        self.inner.set_cursor(cursor);
    }

    fn limit_pos(&self) -> Position {
        self.inner.limit_pos()
    }

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        self.inner.pull_slow(min, recommended)
    }

    fn supports_rewind(&self) -> bool {
        self.inner.supports_rewind()
    }

    fn supports_random_access(&self) -> bool {
        self.inner.supports_random_access()
    }

    fn supports_size(&self) -> bool {
        self.inner.supports_size()
    }

    fn supports_new_reader(&self) -> bool {
        self.inner.supports_new_reader()
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        self.inner.seek_slow(new_pos)
    }

    fn size(&mut self) -> Option<Position> {
        self.inner.size()
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        self.inner.new_reader(initial_pos)
    }

    fn set_read_all_hint(&mut self, hint: bool) {
        self.inner.set_read_all_hint(hint);
    }

    fn read_to_chain(&mut self, len: usize, dst: &mut Chain) -> usize {
        self.inner.read_to_chain(len, dst)
    }

    fn verify_end(&mut self) -> bool {
        self.inner.verify_end()
    }
}

/// A writer that forwards every operation to another writer.
///
/// The writing counterpart of [`WrapReader`].
#[derive(Debug)]
pub struct WrapWriter<W: Writer> {
    inner: W,
}

impl<W: Writer> WrapWriter<W> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// The wrapped writer.
    #[must_use]
    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Unwraps the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Writer> Object for WrapWriter<W> {
    fn state(&self) -> &ObjectState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        self.inner.state_mut()
    }

    fn done(&mut self) {
        self.inner.done();
    }

    fn annotate_status(&self, status: Status) -> Status {
        self.inner.annotate_status(status)
    }
}

impl<W: Writer> Writer for WrapWriter<W> {
    fn window_mut(&mut self) -> &mut [u8] {
        self.inner.window_mut()
    }

    fn window_len(&self) -> usize {
        self.inner.window_len()
    }

    fn cursor(&self) -> usize {
        self.inner.cursor()
    }

    fn set_cursor(&mut self, cursor: usize) {
        self.inner.set_cursor(cursor);
    }

    fn limit_pos(&self) -> Position {
        self.inner.limit_pos()
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        self.inner.push_slow(min, recommended)
    }

    fn supports_random_access(&self) -> bool {
        self.inner.supports_random_access()
    }

    fn supports_truncate(&self) -> bool {
        self.inner.supports_truncate()
    }

    fn supports_read_mode(&self) -> bool {
        self.inner.supports_read_mode()
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        self.inner.seek(new_pos)
    }

    fn truncate(&mut self, len: Position) -> bool {
        self.inner.truncate(len)
    }

    fn size(&mut self) -> Option<Position> {
        self.inner.size()
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        self.inner.flush(flush_type)
    }

    fn write_chain(&mut self, src: &Chain) -> bool {
        self.inner.write_chain(src)
    }
}

#[cfg(test)]
mod tests {
    use crate::SliceReader;

    use super::*;

    #[test]
    fn forwards_reads_and_capabilities() {
        let inner = SliceReader::new(b"forwarded");
        let mut wrapped = WrapReader::new(inner);
        assert!(wrapped.supports_random_access());
        assert!(wrapped.supports_size());
        let mut out = [0_u8; 9];
        assert_eq!(wrapped.read(&mut out), 9);
        assert_eq!(&out, b"forwarded");
        assert!(wrapped.seek(3));
        assert_eq!(wrapped.pos(), 3);
    }
}
