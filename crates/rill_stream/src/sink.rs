// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Position, Status};

/// How far a flush must propagate buffered data.
///
/// The variants are ordered from weakest to strongest; each implies the ones
/// before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlushType {
    /// Release caches held by the object itself; buffered data may stay in
    /// memory.
    FromObject,
    /// Hand buffered data to the layer below. No durability guarantees.
    FromProcess,
    /// Additionally request durability from the final sink if it supports it,
    /// e.g. `fsync`.
    FromMachine,
}

/// A raw byte consumer adapted into the cursor contract by
/// [`BufferedWriter`][crate::BufferedWriter].
///
/// Capability queries must be stable for the lifetime of the sink; operations
/// on unsupported capabilities fail with
/// [`failed_precondition`][Status::failed_precondition].
pub trait Sink: Send {
    /// Writes bytes from the front of `src`, returning how many were
    /// accepted. Accepting zero bytes from a non-empty `src` is an error the
    /// implementation must report instead.
    fn write(&mut self, src: &[u8]) -> Result<usize, Status>;

    /// Propagates buffered data with the given strength.
    fn flush(&mut self, flush_type: FlushType) -> Result<(), Status> {
        let _ = flush_type;
        Ok(())
    }

    /// Whether [`seek()`][Self::seek] is supported.
    fn supports_seek(&self) -> bool {
        false
    }

    /// Repositions the sink so the next [`write()`][Self::write] lands at
    /// `pos`.
    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        let _ = pos;
        Err(Status::failed_precondition("sink does not support seeking"))
    }

    /// Whether [`truncate()`][Self::truncate] is supported.
    fn supports_truncate(&self) -> bool {
        false
    }

    /// Discards everything past the first `len` bytes.
    fn truncate(&mut self, len: Position) -> Result<(), Status> {
        let _ = len;
        Err(Status::failed_precondition("sink does not support truncation"))
    }

    /// Whether [`size()`][Self::size] is supported.
    fn supports_size(&self) -> bool {
        false
    }

    /// The total number of bytes written to the sink so far.
    fn size(&self) -> Result<Position, Status> {
        Err(Status::failed_precondition("sink does not report its size"))
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, src: &[u8]) -> Result<usize, Status> {
        (**self).write(src)
    }

    fn flush(&mut self, flush_type: FlushType) -> Result<(), Status> {
        (**self).flush(flush_type)
    }

    fn supports_seek(&self) -> bool {
        (**self).supports_seek()
    }

    fn seek(&mut self, pos: Position) -> Result<(), Status> {
        (**self).seek(pos)
    }

    fn supports_truncate(&self) -> bool {
        (**self).supports_truncate()
    }

    fn truncate(&mut self, len: Position) -> Result<(), Status> {
        (**self).truncate(len)
    }

    fn supports_size(&self) -> bool {
        (**self).supports_size()
    }

    fn size(&self) -> Result<Position, Status> {
        (**self).size()
    }
}
