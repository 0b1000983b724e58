// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};

use crate::{SliceReader, Writer};

/// A writer into a borrowed, fixed-size byte slice.
///
/// The slice is the whole window; running out of space is a
/// [`resource_exhausted`][Status::resource_exhausted] failure. Supports
/// random access within the written region, truncation, and read mode.
#[derive(Debug)]
pub struct SliceWriter<'a> {
    state: ObjectState,
    dest: &'a mut [u8],
    cursor: usize,
    written: usize,
}

impl<'a> SliceWriter<'a> {
    /// Creates a writer filling `dest` from the start.
    #[must_use]
    pub fn new(dest: &'a mut [u8]) -> Self {
        Self {
            state: ObjectState::new(),
            dest,
            cursor: 0,
            written: 0,
        }
    }

    /// The bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.dest[..self.written]
    }

    /// The number of bytes written so far.
    #[must_use]
    pub fn written_len(&self) -> usize {
        self.written
    }

    /// A reader over the bytes written so far, positioned at `initial_pos`.
    ///
    /// Writing requires `&mut self`, so the borrow checker enforces the read
    /// mode contract: the reader cannot outlive the next mutation of the
    /// writer.
    #[must_use]
    pub fn read_mode(&self, initial_pos: Position) -> SliceReader<'_> {
        let pos = usize::try_from(initial_pos).unwrap_or(self.written).min(self.written);
        SliceReader::positioned(self.written(), pos)
    }
}

impl Object for SliceWriter<'_> {
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

impl Writer for SliceWriter<'_> {
    fn window_mut(&mut self) -> &mut [u8] {
        &mut *self.dest
    }

    fn window_len(&self) -> usize {
        self.dest.len()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.dest.len());
        self.cursor = cursor;
        self.written = self.written.max(cursor);
    }

    fn limit_pos(&self) -> Position {
        self.dest.len() as Position
    }

    fn push_slow(&mut self, _min: usize, _recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        self.fail(Status::resource_exhausted("destination is full"))
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn supports_read_mode(&self) -> bool {
        true
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        match usize::try_from(new_pos) {
            Ok(pos) if pos <= self.written => {
                self.cursor = pos;
                true
            }
            _ => {
                self.cursor = self.written;
                false
            }
        }
    }

    fn truncate(&mut self, len: Position) -> bool {
        if !self.ok() {
            return false;
        }
        match usize::try_from(len) {
            Ok(len) if len <= self.written => {
                self.written = len;
                self.cursor = len;
                true
            }
            _ => self.fail(Status::failed_precondition("truncation past the written region")),
        }
    }

    fn size(&mut self) -> Option<Position> {
        Some(self.written as Position)
    }
}
