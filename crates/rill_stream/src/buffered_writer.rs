// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Buffer, Object, ObjectState, Position, Status};

use crate::{BufferOptions, FlushType, Sink, Writer};

/// Adapts a block-mode [`Sink`] into the cursor contract.
///
/// Bytes accumulate in a [`Buffer`] and move to the sink when the buffer
/// fills, on [`flush()`][Writer::flush], and on close. Like the reading side,
/// observed transfer lengths tune the buffer size between the configured
/// minimum and maximum.
pub struct BufferedWriter<S: Sink> {
    state: ObjectState,
    sink: S,
    buf: Buffer,
    cursor: usize,
    // Stream position of the first byte currently buffered.
    flushed_pos: Position,
    tuned_size: usize,
    options: BufferOptions,
}

impl<S: Sink> BufferedWriter<S> {
    /// Creates a writer over `sink`, which is assumed to be positioned at
    /// stream position 0.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, BufferOptions::default())
    }

    /// Creates a writer over `sink` with explicit buffer sizing.
    #[must_use]
    pub fn with_options(sink: S, options: BufferOptions) -> Self {
        Self {
            state: ObjectState::new(),
            sink,
            buf: Buffer::new(),
            cursor: 0,
            flushed_pos: 0,
            tuned_size: options.min_buffer_size(),
            options,
        }
    }

    /// The underlying sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    // Hands the buffered bytes to the sink. Leaves the buffer empty.
    fn flush_buffered(&mut self) -> bool {
        let mut at = 0;
        while at < self.cursor {
            match self.sink.write(&self.buf.as_slice()[at..self.cursor]) {
                Ok(0) => {
                    return self.fail(Status::internal("sink accepted no bytes"));
                }
                Ok(n) => at += n,
                Err(status) => return self.fail(status),
            }
        }
        self.flushed_pos += self.cursor as Position;
        self.cursor = 0;
        true
    }
}

impl<S: Sink> Object for BufferedWriter<S> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn done(&mut self) {
        if self.ok() {
            if self.flush_buffered() {
                if let Err(status) = self.sink.flush(FlushType::FromProcess) {
                    self.fail(status);
                }
            }
        }
    }

    fn annotate_status(&self, status: Status) -> Status {
        let pos = self.flushed_pos + self.cursor as Position;
        status.annotate(format!("at byte {pos}"))
    }
}

impl<S: Sink> Writer for BufferedWriter<S> {
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
        self.flushed_pos + self.buf.capacity() as Position
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.flush_buffered() {
            return false;
        }
        if self.tuned_size < self.options.max_buffer_size() {
            let grown = (self.tuned_size * 2).min(self.options.max_buffer_size());
            tracing::trace!(from = self.tuned_size, to = grown, "retuning write buffer");
            self.tuned_size = grown;
        }
        let want = min
            .max(self.tuned_size)
            .max(recommended.min(self.options.max_buffer_size()));
        self.buf.ensure_capacity(want);
        true
    }

    fn supports_random_access(&self) -> bool {
        self.sink.supports_seek()
    }

    fn supports_truncate(&self) -> bool {
        self.sink.supports_truncate()
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.sink.supports_seek() {
            return self.fail(Status::failed_precondition("writer does not support seeking"));
        }
        if !self.flush_buffered() {
            return false;
        }
        if let Err(status) = self.sink.seek(new_pos) {
            return self.fail(status);
        }
        self.flushed_pos = new_pos;
        true
    }

    fn truncate(&mut self, len: Position) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.sink.supports_truncate() {
            return self.fail(Status::failed_precondition("writer does not support truncation"));
        }
        if !self.flush_buffered() {
            return false;
        }
        if let Err(status) = self.sink.truncate(len) {
            return self.fail(status);
        }
        self.flushed_pos = self.flushed_pos.min(len);
        true
    }

    fn size(&mut self) -> Option<Position> {
        if !self.ok() || !self.sink.supports_size() {
            return None;
        }
        match self.sink.size() {
            Ok(size) => Some(size.max(self.flushed_pos + self.cursor as Position)),
            Err(status) => {
                self.fail(status);
                None
            }
        }
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.ok() {
            return false;
        }
        if flush_type == FlushType::FromObject {
            // Buffered data may stay in memory; there are no caches to shed.
            return true;
        }
        if !self.flush_buffered() {
            return false;
        }
        match self.sink.flush(flush_type) {
            Ok(()) => true,
            Err(status) => self.fail(status),
        }
    }
}

impl<S: Sink> Drop for BufferedWriter<S> {
    fn drop(&mut self) {
        self.close();
    }
}
