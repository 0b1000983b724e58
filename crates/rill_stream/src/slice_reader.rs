// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};

use crate::Reader;

/// A reader over a borrowed byte slice.
///
/// The whole slice is the window, so every operation is a cursor move:
/// rewinding, random access, size, and independent sub-readers are all
/// supported and cheap. This is also the reader returned by the in-memory
/// writers' `read_mode()`.
#[derive(Debug)]
pub struct SliceReader<'a> {
    state: ObjectState,
    data: &'a [u8],
    cursor: usize,
}

impl<'a> SliceReader<'a> {
    /// Creates a reader over `data`, positioned at 0.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::positioned(data, 0)
    }

    pub(crate) fn positioned(data: &'a [u8], pos: usize) -> Self {
        Self {
            state: ObjectState::new(),
            data,
            cursor: pos.min(data.len()),
        }
    }
}

impl Object for SliceReader<'_> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at byte {}", self.cursor))
    }
}

impl Reader for SliceReader<'_> {
    fn window(&self) -> &[u8] {
        self.data
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.data.len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        self.data.len() as Position
    }

    fn pull_slow(&mut self, _min: usize, _recommended: usize) -> bool {
        // The whole slice is always visible; an unsatisfied pull is the end.
        false
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
        // Every in-range position is inside the window, so this is only
        // reached for positions past the end.
        debug_assert!(new_pos > self.limit_pos());
        self.cursor = self.data.len();
        false
    }

    fn size(&mut self) -> Option<Position> {
        Some(self.data.len() as Position)
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        let pos = usize::try_from(initial_pos).unwrap_or(self.data.len());
        Some(Box::new(SliceReader::positioned(self.data, pos)))
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SliceReader<'static>: Send, Sync);

    #[test]
    fn reads_and_seeks() {
        let mut reader = SliceReader::new(b"0123456789");
        let mut out = [0_u8; 4];
        assert_eq!(reader.read(&mut out), 4);
        assert_eq!(&out, b"0123");
        assert!(reader.seek(8));
        assert_eq!(reader.read(&mut out), 2);
        assert_eq!(&out[..2], b"89");
        assert!(reader.seek(0), "rewind to the start");
        assert_eq!(reader.pos(), 0);
    }

    #[test]
    fn seek_past_end_is_soft() {
        let mut reader = SliceReader::new(b"abc");
        assert!(!reader.seek(10));
        assert!(reader.ok());
        assert_eq!(reader.pos(), 3);
    }

    #[test]
    fn sub_readers_are_independent() {
        let reader = SliceReader::new(b"0123456789");
        let mut first = reader.new_reader(2).unwrap();
        let mut second = reader.new_reader(6).unwrap();
        assert_eq!(first.read_byte(), Some(b'2'));
        assert_eq!(second.read_byte(), Some(b'6'));
        assert_eq!(first.read_byte(), Some(b'3'));
    }
}
