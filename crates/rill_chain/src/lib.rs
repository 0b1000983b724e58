// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Segmented byte sequences for zero-copy data transfer between stream layers.
//!
//! A [`Chain`] is a logical byte sequence stored as an ordered list of
//! [`Block`]s. Blocks come in three kinds:
//!
//! * inline - a few bytes stored in the block itself, so short chains never
//!   allocate;
//! * owned - a reference-counted heap region, shared freely between chains;
//! * external - a foreign region (for example a memory-mapped range) kept
//!   alive by the block and disposed when the last reference drops.
//!
//! Because blocks are shared by reference, cloning a chain, transferring
//! blocks between chains, and trimming from either end are all cheap. A chain
//! is what a stream layer hands over when it wants to yield ownership of
//! possibly-large data without copying it.
//!
//! Writers fill chains either through [`Chain::append`], which packs small
//! data into the extendable tail block, or through [`Chain::append_buffer`],
//! which reserves a writable span and lets the caller commit however many
//! bytes it produced. Consumers can walk [`Chain::blocks`] or use the
//! [`bytes::Buf`] implementation.

mod block;
mod chain;

pub use block::{Block, ExternalBytes};
pub use chain::{AppendBuffer, Chain, ChainOptions};
