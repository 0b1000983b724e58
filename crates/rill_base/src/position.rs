// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// An absolute byte offset within a stream.
///
/// Positions are unsigned 64-bit regardless of platform word size; a stream
/// may be larger than addressable memory. Arithmetic that would exceed
/// [`u64::MAX`] is an explicit failure at the stream layer, never a silent
/// wrap.
pub type Position = u64;

/// Adds an in-memory length to a position, or `None` on overflow.
#[must_use]
pub fn position_add(pos: Position, len: usize) -> Option<Position> {
    pos.checked_add(len as Position)
}

/// Converts a position-sized length to an in-memory size, or `None` when it
/// exceeds what this platform can hold.
#[must_use]
pub fn to_in_memory_size(len: Position) -> Option<usize> {
    usize::try_from(len).ok()
}
