// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cursor-windowed readers and writers over byte sources and sinks.
//!
//! This crate is the middle of the rill stack: it defines the [`Reader`],
//! [`Writer`], and [`BackwardWriter`] contracts that every stream layer
//! speaks, and the concrete backends and adapters that make them composable.
//!
//! # The contract
//!
//! A reader or writer exposes a contiguous byte window addressed by a cursor
//! index, refilled (or drained) on demand via `pull` / `push`. Failures are
//! sticky per object and annotated with each layer's own coordinates as they
//! propagate up a stack; see [`rill_base`]. End of data is soft: it is
//! reported by a `false` return, not a failure.
//!
//! # What is here
//!
//! * Raw endpoint traits: [`Source`] and [`Sink`], the minimal block-mode
//!   interface a file, socket, or memory region implements.
//! * Buffering: [`BufferedReader`] and [`BufferedWriter`] adapt a
//!   source/sink into the cursor contract, retuning their buffer size from
//!   observed transfer lengths.
//! * Projections: [`WrapReader`]/[`WrapWriter`] (type adapters),
//!   [`LimitingReader`] (length cap, optionally exact),
//!   [`PrefixLimitingReader`] (offset coordinates).
//! * In-memory backends: [`SliceReader`], [`VecWriter`], [`SliceWriter`],
//!   [`ChainReader`], [`ChainWriter`], [`ChainBackwardWriter`].
//! * Files: [`FileReader`]/[`FileWriter`] over positional I/O, and
//!   [`MmapReader`] for zero-copy reads from a shared mapping.
//! * [`Scratch`], the splicing staging used by readers whose data arrives in
//!   non-contiguous bursts.
//!
//! # Example
//!
//! ```
//! use rill_base::Object;
//! use rill_stream::{Reader, VecWriter, Writer};
//!
//! let mut writer = VecWriter::new();
//! writer.write(b"one two three");
//!
//! let mut reader = writer.read_mode(4);
//! let mut out = Vec::new();
//! reader.read_to_vec(3, &mut out);
//! assert_eq!(out, b"two");
//! assert!(reader.ok());
//! ```

mod backward_writer;
mod buffered_reader;
mod buffered_writer;
mod chain_reader;
mod chain_writer;
mod file;
mod limiting;
mod mmap;
mod options;
mod reader;
mod scratch;
mod sink;
mod slice_reader;
mod slice_writer;
mod source;
mod vec_writer;
mod wrap;
mod writer;

pub use backward_writer::{BackwardWriter, ChainBackwardWriter};
pub use buffered_reader::BufferedReader;
pub use buffered_writer::BufferedWriter;
pub use chain_reader::ChainReader;
pub use chain_writer::ChainWriter;
pub use file::{FileReader, FileSink, FileSource, FileWriter};
pub use limiting::LimitingReader;
pub use mmap::MmapReader;
pub use options::BufferOptions;
pub use reader::Reader;
pub use scratch::Scratch;
pub use sink::{FlushType, Sink};
pub use slice_reader::SliceReader;
pub use slice_writer::SliceWriter;
pub use source::Source;
pub use vec_writer::VecWriter;
pub use wrap::{WrapReader, WrapWriter};
pub use writer::Writer;
