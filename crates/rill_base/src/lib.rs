// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Foundation types for the rill stream stack.
//!
//! Every reader, writer, and codec in the stack shares three pieces of
//! infrastructure defined here:
//!
//! * [`Object`] / [`ObjectState`] - the open/failed/closed lifecycle with a
//!   sticky, annotatable [`Status`]. A deep pipeline of stream layers
//!   propagates failures by storing the lower layer's status and annotating it
//!   with its own coordinates, so the final message reads like a call stack of
//!   positions: `"truncated frame; at uncompressed byte 4096; reading data.log"`.
//! * [`Buffer`] - an owned byte region with explicit, power-of-two growth,
//!   used for staging by buffered adapters and codec state machines.
//! * [`Position`] - 64-bit absolute offsets with checked arithmetic.
//!
//! Nothing here performs I/O; the crate exists so the stream, chain, pool, and
//! codec crates agree on lifecycle and failure semantics.

mod buffer;
mod object;
mod position;
mod status;

pub use buffer::*;
pub use object::*;
pub use position::*;
pub use status::*;
