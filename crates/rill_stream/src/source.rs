// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Position, Status};

/// A raw byte producer adapted into the cursor contract by
/// [`BufferedReader`][crate::BufferedReader].
///
/// Implementations expose block-mode reads plus whatever optional
/// capabilities the backing medium has. Capability queries must be stable for
/// the lifetime of the source; operations on unsupported capabilities fail
/// with [`failed_precondition`][Status::failed_precondition].
pub trait Source: Send {
    /// Reads up to `dst.len()` bytes into the front of `dst`.
    ///
    /// Returns the number of bytes read; `Ok(0)` with a non-empty `dst` means
    /// end of data.
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status>;

    /// Whether [`seek()`][Self::seek] is supported.
    fn supports_seek(&self) -> bool {
        false
    }

    /// Repositions the source so the next [`read()`][Self::read] starts at
    /// `pos`. Seeking beyond the end is allowed and reads report end of data.
    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        let _ = pos;
        Err(Status::failed_precondition("source does not support seeking"))
    }

    /// Whether [`size()`][Self::size] is supported.
    fn supports_size(&self) -> bool {
        false
    }

    /// The total number of bytes in the source.
    fn size(&self) -> Result<Position, Status> {
        Err(Status::failed_precondition("source does not report its size"))
    }

    /// Whether [`new_source()`][Self::new_source] is supported.
    fn supports_new_source(&self) -> bool {
        false
    }

    /// Creates an independent source over the same data, positioned at `pos`.
    ///
    /// The returned source has its own cursor. Whether it may be used from
    /// another thread concurrently with this one is part of the
    /// implementation's contract; duplicated file handles and shared memory
    /// maps are safe, a single seekable pipe is not.
    fn new_source(&self, pos: Position) -> Result<Box<dyn Source>, Status> {
        let _ = pos;
        Err(Status::failed_precondition("source does not support independent cursors"))
    }

    /// Whether [`read_at()`][Self::read_at] is supported.
    fn supports_read_at(&self) -> bool {
        false
    }

    /// Reads up to `dst.len()` bytes at absolute position `pos` without
    /// moving the sequential cursor.
    fn read_at(&mut self, pos: Position, dst: &mut [u8]) -> Result<usize, Status> {
        let _ = (pos, dst);
        Err(Status::failed_precondition("source does not support positional reads"))
    }

    /// Advises the source that the caller intends to read everything.
    ///
    /// A source may coalesce or map its remainder in response. Advisory only.
    fn hint_read_all(&mut self, hint: bool) {
        let _ = hint;
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
        (**self).read(dst)
    }

    fn supports_seek(&self) -> bool {
        (**self).supports_seek()
    }

    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        (**self).seek(pos)
    }

    fn supports_size(&self) -> bool {
        (**self).supports_size()
    }

    fn size(&self) -> Result<Position, Status> {
        (**self).size()
    }

    fn supports_new_source(&self) -> bool {
        (**self).supports_new_source()
    }

    fn new_source(&self, pos: Position) -> Result<Box<dyn Source>, Status> {
        (**self).new_source(pos)
    }

    fn supports_read_at(&self) -> bool {
        (**self).supports_read_at()
    }

    fn read_at(&mut self, pos: Position, dst: &mut [u8]) -> Result<usize, Status> {
        (**self).read_at(pos, dst)
    }

    fn hint_read_all(&mut self, hint: bool) {
        (**self).hint_read_all(hint);
    }
}
