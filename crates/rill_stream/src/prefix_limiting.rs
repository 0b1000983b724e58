// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Object, ObjectState, Position, Status};

use crate::Reader;

/// A non-owning projection that hides a prefix of a reader.
///
/// Position 0 of this reader corresponds to `base_pos` of the inner reader,
/// which is fixed at construction from the inner reader's position at that
/// moment. Containers use this so a section decoder sees section-relative
/// offsets while the source keeps its own.
///
/// Capability queries delegate to the inner reader.
pub struct PrefixLimitingReader<R: Reader> {
    state: ObjectState,
    inner: R,
    base_pos: Position,
}

impl<R: Reader> PrefixLimitingReader<R> {
    /// Hides everything before the current position of `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        let base_pos = inner.pos();
        Self {
            state: ObjectState::new(),
            inner,
            base_pos,
        }
    }

    /// The inner position corresponding to position 0 of this reader.
    #[must_use]
    pub fn base_pos(&self) -> Position {
        self.base_pos
    }

    /// Unwraps the inner reader, positioned where reading stopped.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn propagate_inner_failure(&mut self) -> bool {
        if let Some(status) = self.inner.status() {
            // The inner status carries inner coordinates; this layer's own
            // annotation would state the wrong position.
            self.fail_without_annotation(status.clone());
        }
        false
    }

    // Bytes at the front of the inner window that precede base_pos and must
    // stay hidden. Non-zero only until the inner window moves past the base.
    fn hidden_prefix(&self) -> usize {
        let inner_window_len = self.inner.window().len() as Position;
        let inner_start_pos = self.inner.limit_pos() - inner_window_len;
        usize::try_from(self.base_pos.saturating_sub(inner_start_pos)).unwrap_or(usize::MAX)
    }
}

impl<R: Reader> Object for PrefixLimitingReader<R> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at byte {} without the hidden prefix", self.pos()))
    }
}

impl<R: Reader> Reader for PrefixLimitingReader<R> {
    fn window(&self) -> &[u8] {
        // The inner window may still span bytes before base_pos; they are
        // not part of this reader's coordinate space.
        &self.inner.window()[self.hidden_prefix()..]
    }

    fn cursor(&self) -> usize {
        // The inner cursor never precedes the base: it stood there at
        // construction and this wrapper only positions it at or after it.
        self.inner.cursor() - self.hidden_prefix()
    }

    fn set_cursor(&mut self, cursor: usize) {
        let prefix = self.hidden_prefix();
        self.inner.set_cursor(cursor + prefix);
    }

    fn limit_pos(&self) -> Position {
        self.inner.limit_pos().saturating_sub(self.base_pos)
    }

    fn pull_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.inner.pull(min, recommended) {
            if !self.inner.ok() {
                return self.propagate_inner_failure();
            }
            return false;
        }
        true
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
        let inner_pos = initial_pos.checked_add(self.base_pos)?;
        let inner = self.inner.new_reader(inner_pos)?;
        Some(Box::new(PrefixLimitingReader {
            state: ObjectState::new(),
            inner,
            base_pos: self.base_pos,
        }))
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        let Some(inner_pos) = new_pos.checked_add(self.base_pos) else {
            return self.fail_overflow();
        };
        let reached = self.inner.seek(inner_pos);
        if !self.inner.ok() {
            return self.propagate_inner_failure();
        }
        reached
    }

    fn size(&mut self) -> Option<Position> {
        if !self.ok() {
            return None;
        }
        let inner_size = self.inner.size()?;
        Some(inner_size.saturating_sub(self.base_pos))
    }

    fn set_read_all_hint(&mut self, hint: bool) {
        self.inner.set_read_all_hint(hint);
    }
}
