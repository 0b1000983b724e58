// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Buffer, Object, ObjectState, Position, Status};

use crate::reader::{clamp_to_usize, skip_forward};
use crate::{BufferOptions, Reader, Source};

/// Adapts a block-mode [`Source`] into the cursor contract.
///
/// Maintains a [`Buffer`] sized between the configured minimum and maximum;
/// the observed transfer lengths tune the size of subsequent refills, so
/// sequential scans settle on large reads while sparse access stays cheap.
///
/// A refill advances [`limit_pos()`][Reader::limit_pos] by exactly the bytes
/// obtained from the source. When the source reports a partial read the
/// remainder is left to the next pull.
pub struct BufferedReader<S: Source> {
    state: ObjectState,
    src: S,
    buf: Buffer,
    window_len: usize,
    cursor: usize,
    limit_pos: Position,
    tuned_size: usize,
    read_all_hint: bool,
    options: BufferOptions,
}

impl<S: Source> BufferedReader<S> {
    /// Creates a reader over `src`, which is assumed to be positioned at
    /// stream position 0.
    #[must_use]
    pub fn new(src: S) -> Self {
        Self::with_options(src, BufferOptions::default())
    }

    /// Creates a reader over `src` with explicit buffer sizing.
    #[must_use]
    pub fn with_options(src: S, options: BufferOptions) -> Self {
        Self::positioned(src, 0, options)
    }

    pub(crate) fn positioned(src: S, pos: Position, options: BufferOptions) -> Self {
        Self {
            state: ObjectState::new(),
            src,
            buf: Buffer::new(),
            window_len: 0,
            cursor: 0,
            limit_pos: pos,
            tuned_size: options.min_buffer_size(),
            read_all_hint: false,
            options,
        }
    }

    /// The underlying source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.src
    }

    // Discards the window. The next pull starts reading at `pos`.
    fn reset_window(&mut self, pos: Position) {
        self.cursor = 0;
        self.window_len = 0;
        self.limit_pos = pos;
    }

    // Grows the refill size while the source keeps saturating our requests.
    fn retune(&mut self, requested: usize, obtained: usize) {
        if obtained == requested && self.tuned_size < self.options.max_buffer_size() {
            let grown = (self.tuned_size * 2).min(self.options.max_buffer_size());
            tracing::trace!(from = self.tuned_size, to = grown, "retuning read-ahead");
            self.tuned_size = grown;
        }
    }
}

impl<S: Source> Object for BufferedReader<S> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn annotate_status(&self, status: Status) -> Status {
        let pos = self.limit_pos - (self.window_len - self.cursor) as Position;
        status.annotate(format!("at byte {pos}"))
    }
}

impl<S: Source> Reader for BufferedReader<S> {
    fn window(&self) -> &[u8] {
        &self.buf.as_slice()[..self.window_len]
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.window_len);
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        self.limit_pos
    }

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        // Carry the unread remainder to the front of the buffer.
        let remainder = self.window_len - self.cursor;
        if remainder > 0 && self.cursor > 0 {
            let range = self.cursor..self.window_len;
            self.buf.as_mut_slice().copy_within(range, 0);
        }
        self.cursor = 0;
        self.window_len = remainder;

        let mut request = min
            .max(self.tuned_size)
            .max(recommended.min(self.options.max_buffer_size()));
        if self.read_all_hint && self.src.supports_size() {
            if let Ok(size) = self.src.size() {
                request = request.max(clamp_to_usize(size.saturating_sub(self.limit_pos)));
            }
        }
        self.buf.ensure_capacity(remainder + request);

        while self.window_len - self.cursor < min {
            let dst_range = self.window_len..self.buf.capacity();
            let requested = dst_range.len();
            let obtained = match self.src.read(&mut self.buf.as_mut_slice()[dst_range]) {
                Ok(0) => return false,
                Ok(n) => n,
                Err(status) => return self.fail(status),
            };
            self.window_len += n_checked(obtained, requested);
            self.limit_pos = match self.limit_pos.checked_add(obtained as Position) {
                Some(pos) => pos,
                None => return self.fail_overflow(),
            };
            self.retune(requested, obtained);
        }
        true
    }

    fn supports_rewind(&self) -> bool {
        self.src.supports_seek()
    }

    fn supports_random_access(&self) -> bool {
        self.src.supports_seek() && self.src.supports_size()
    }

    fn supports_size(&self) -> bool {
        self.src.supports_size()
    }

    fn supports_new_reader(&self) -> bool {
        self.src.supports_new_source()
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.src.supports_seek() {
            if new_pos < self.pos() {
                return self.fail(Status::failed_precondition("stream does not support rewinding"));
            }
            return skip_forward(self, new_pos);
        }
        let mut target = new_pos;
        if self.src.supports_size() {
            match self.src.size() {
                // Seeking past the end stops at the end and reports it.
                Ok(size) => target = target.min(size),
                Err(status) => return self.fail(status),
            }
        }
        if let Err(status) = self.src.seek(target) {
            return self.fail(status);
        }
        self.reset_window(target);
        target == new_pos
    }

    fn size(&mut self) -> Option<Position> {
        if !self.ok() || !self.src.supports_size() {
            return None;
        }
        match self.src.size() {
            Ok(size) => Some(size),
            Err(status) => {
                self.fail(status);
                None
            }
        }
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        if !self.ok() || !self.src.supports_new_source() {
            return None;
        }
        let src = self.src.new_source(initial_pos).ok()?;
        Some(Box::new(BufferedReader::positioned(src, initial_pos, self.options)))
    }

    fn set_read_all_hint(&mut self, hint: bool) {
        self.read_all_hint = hint;
        self.src.hint_read_all(hint);
    }
}

// A source that reports more bytes than the destination holds is broken
// badly enough that continuing would corrupt the window accounting.
fn n_checked(obtained: usize, requested: usize) -> usize {
    assert!(obtained <= requested, "source reported reading {obtained} bytes into {requested}");
    obtained
}

#[cfg(test)]
mod tests {
    use rill_base::StatusCode;

    use super::*;

    // A seekable in-memory source that serves reads in bursts of at most
    // `burst` bytes.
    struct BurstSource {
        data: Vec<u8>,
        pos: u64,
        burst: usize,
    }

    impl BurstSource {
        fn new(data: impl Into<Vec<u8>>, burst: usize) -> Self {
            Self {
                data: data.into(),
                pos: 0,
                burst,
            }
        }
    }

    impl Source for BurstSource {
        fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
            let at = usize::try_from(self.pos).unwrap().min(self.data.len());
            let n = dst.len().min(self.burst).min(self.data.len() - at);
            dst[..n].copy_from_slice(&self.data[at..at + n]);
            self.pos += n as u64;
            Ok(n)
        }

        fn supports_seek(&self) -> bool {
            true
        }

        fn seek(&mut self, pos: Position) -> Result<(), Status> {
            self.pos = pos;
            Ok(())
        }

        fn supports_size(&self) -> bool {
            true
        }

        fn size(&self) -> Result<Position, Status> {
            Ok(self.data.len() as Position)
        }
    }

    #[test]
    fn cursor_window_invariants_hold_across_pulls() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"0123456789"[..], 3));
        assert_eq!(reader.pos(), 0);
        assert!(reader.pull(7, 10));
        assert!(reader.available() >= 7);
        assert!(reader.cursor() <= reader.window().len());
        assert_eq!(reader.limit_pos() - reader.available() as u64, reader.pos());
        assert_eq!(&reader.window()[..7], b"0123456");
    }

    #[test]
    fn read_consumes_in_order() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"hello world"[..], 4));
        let mut first = [0_u8; 5];
        assert_eq!(reader.read(&mut first), 5);
        assert_eq!(&first, b"hello");
        let mut rest = [0_u8; 6];
        assert_eq!(reader.read(&mut rest), 6);
        assert_eq!(&rest, b" world");
        assert_eq!(reader.read(&mut [0_u8; 1]), 0);
        assert!(reader.ok(), "end of data is not a failure");
    }

    #[test]
    fn partial_reads_leave_remainder_to_next_pull() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"abcdef"[..], 2));
        assert!(reader.pull(1, 6));
        // One burst of two bytes arrived; the rest waits.
        assert_eq!(reader.available(), 2);
        assert_eq!(reader.limit_pos(), 2);
        assert!(reader.pull(5, 6));
        assert!(reader.available() >= 5);
    }

    #[test]
    fn seek_back_and_reread() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).map(|b: u16| b as u8).collect();
        let mut reader = BufferedReader::new(BurstSource::new(data.clone(), 512));
        let mut out = vec![0_u8; 7000];
        assert_eq!(reader.read(&mut out), 7000);
        assert!(reader.seek(1024));
        assert_eq!(reader.pos(), 1024);
        let mut again = vec![0_u8; 512];
        assert_eq!(reader.read(&mut again), 512);
        assert_eq!(again.as_slice(), &data[1024..1536]);
    }

    #[test]
    fn seek_past_end_stops_at_end() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"tiny"[..], 8));
        assert!(!reader.seek(100));
        assert!(reader.ok());
        assert_eq!(reader.pos(), 4);
    }

    #[test]
    fn source_failure_is_sticky_and_annotated() {
        struct FailingSource;
        impl Source for FailingSource {
            fn read(&mut self, _dst: &mut [u8]) -> Result<usize, Status> {
                Err(Status::new(StatusCode::Io, "disk on fire"))
            }
        }

        let mut reader = BufferedReader::new(FailingSource);
        assert!(!reader.pull(1, 1));
        assert!(!reader.ok());
        let status = reader.status().unwrap().clone();
        assert_eq!(status.code(), StatusCode::Io);
        assert!(status.to_string().contains("at byte 0"));
        // Sticky: later pulls keep failing without touching the source.
        assert!(!reader.pull(1, 1));
        assert_eq!(reader.status().unwrap(), &status);
    }

    #[test]
    fn monotone_positions_between_seeks() {
        let mut reader = BufferedReader::new(BurstSource::new(vec![1_u8; 4096], 100));
        let mut last = reader.pos();
        let mut byte = [0_u8; 1];
        while reader.read(&mut byte) == 1 {
            assert!(reader.pos() >= last);
            last = reader.pos();
        }
        assert_eq!(last, 4096);
    }

    #[test]
    fn verify_end_detects_leftover_data() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"abc"[..], 8));
        let mut out = [0_u8; 2];
        reader.read(&mut out);
        assert!(!reader.verify_end());
        assert_eq!(reader.status().unwrap().code(), StatusCode::FailedPrecondition);
    }

    #[test]
    fn verify_end_accepts_exhausted_reader() {
        let mut reader = BufferedReader::new(BurstSource::new(&b"abc"[..], 8));
        let mut out = [0_u8; 3];
        reader.read(&mut out);
        assert!(reader.verify_end());
        assert!(reader.ok());
    }

    #[test]
    fn new_reader_reads_independently() {
        struct SharedSource {
            data: std::sync::Arc<Vec<u8>>,
            pos: u64,
        }
        impl Source for SharedSource {
            fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
                let at = usize::try_from(self.pos).unwrap().min(self.data.len());
                let n = dst.len().min(self.data.len() - at);
                dst[..n].copy_from_slice(&self.data[at..at + n]);
                self.pos += n as u64;
                Ok(n)
            }
            fn supports_new_source(&self) -> bool {
                true
            }
            fn new_source(&self, pos: Position) -> Result<Box<dyn Source>, Status> {
                Ok(Box::new(SharedSource {
                    data: std::sync::Arc::clone(&self.data),
                    pos,
                }))
            }
        }

        let reader = BufferedReader::new(SharedSource {
            data: std::sync::Arc::new(b"0123456789".to_vec()),
            pos: 0,
        });
        let mut sub = reader.new_reader(5).expect("source supports independent cursors");
        assert_eq!(sub.pos(), 5);
        let mut out = [0_u8; 5];
        assert_eq!(sub.read(&mut out), 5);
        assert_eq!(&out, b"56789");
    }
}
