// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};

use crate::reader::clamp_to_usize;
use crate::Reader;

/// A non-owning projection that caps the visible length of a reader.
///
/// The wrapped reader appears to end at `max_pos`, while positions keep the
/// inner coordinate system. With
/// [`set_exact_length()`][Self::set_exact_length] an inner stream that ends
/// before the cap is a failure instead of a short read, which containers use
/// to detect truncated sections.
///
/// Capability queries delegate to the inner reader.
pub struct LimitingReader<R: Reader> {
    state: ObjectState,
    inner: R,
    max_pos: Position,
    exact: bool,
}

impl<R: Reader> LimitingReader<R> {
    /// Caps `inner` at absolute position `max_pos`.
    #[must_use]
    pub fn new(inner: R, max_pos: Position) -> Self {
        Self {
            state: ObjectState::new(),
            inner,
            max_pos,
            exact: false,
        }
    }

    /// Caps `inner` at `len` bytes past its current position.
    ///
    /// Fails the new reader immediately if that overflows the position range.
    #[must_use]
    pub fn with_length(inner: R, len: Position) -> Self {
        let pos = inner.pos();
        let mut reader = Self::new(inner, pos.saturating_add(len));
        if pos.checked_add(len).is_none() {
            reader.fail_overflow();
        }
        reader
    }

    /// Makes an inner end-of-data before the cap an
    /// [`invalid_argument`][Status::invalid_argument] failure.
    pub fn set_exact_length(&mut self, exact: bool) {
        self.exact = exact;
    }

    /// The absolute position where this projection ends.
    #[must_use]
    pub fn max_pos(&self) -> Position {
        self.max_pos
    }

    /// Unwraps the inner reader, positioned where reading stopped.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }

    // Bytes of the inner window that lie past the cap and must stay hidden.
    fn overhang(&self) -> usize {
        clamp_to_usize(self.inner.limit_pos().saturating_sub(self.max_pos))
    }

    fn propagate_inner_failure(&mut self) -> bool {
        if let Some(status) = self.inner.status() {
            // The inner status already carries its own coordinates.
            self.fail_without_annotation(status.clone());
        }
        false
    }
}

impl<R: Reader> Object for LimitingReader<R> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

impl<R: Reader> Reader for LimitingReader<R> {
    fn window(&self) -> &[u8] {
        let inner = self.inner.window();
        &inner[..inner.len() - self.overhang()]
    }

    fn cursor(&self) -> usize {
        self.inner.cursor()
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.window().len());
        self.inner.set_cursor(cursor);
    }

    fn limit_pos(&self) -> Position {
        self.inner.limit_pos().min(self.max_pos)
    }

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        let remaining = self.max_pos.saturating_sub(self.pos());
        if remaining == 0 {
            return false;
        }
        let capped_min = min.min(clamp_to_usize(remaining));
        let capped_recommended = recommended.min(clamp_to_usize(remaining));
        if !self.inner.pull(capped_min, capped_recommended) {
            if !self.inner.ok() {
                return self.propagate_inner_failure();
            }
            if self.exact {
                return self.fail(Status::invalid_argument("stream ends before the declared length"));
            }
            return false;
        }
        self.available() >= min
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

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        let inner = self.inner.new_reader(initial_pos.min(self.max_pos))?;
        let mut limited = LimitingReader::new(inner, self.max_pos);
        limited.exact = self.exact;
        Some(Box::new(limited))
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        let target = new_pos.min(self.max_pos);
        let reached = self.inner.seek(target);
        if !self.inner.ok() {
            return self.propagate_inner_failure();
        }
        reached && target == new_pos
    }

    fn size(&mut self) -> Option<Position> {
        if !self.ok() {
            return None;
        }
        let inner_size = self.inner.size()?;
        if !self.inner.ok() {
            self.propagate_inner_failure();
            return None;
        }
        Some(inner_size.min(self.max_pos))
    }

    fn set_read_all_hint(&mut self, _hint: bool) {
        // The inner reader extends past the cap; reading it all is not
        // implied.
    }
}
