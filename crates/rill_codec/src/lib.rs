// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compression codecs over the rill cursor contract.
//!
//! [`CodecReader`] and [`CodecWriter`] integrate a streaming block codec with
//! the reader/writer tower: they speak the same cursor-window contract as
//! every other stream layer, report uncompressed positions, and stack on any
//! inner reader or writer (memory, chain, file, or another codec).
//!
//! Codec state is expensive to create, so both sides acquire their
//! decoder/encoder state from a process-wide
//! [recycling pool][rill_pool::KeyedRecyclingPool] keyed by codec and
//! parameters, reset on reuse, and return it on clean completion.
//!
//! Two codecs are provided: Brotli (a native streaming format) and Snappy (a
//! whole-block format carried in a length-framed envelope). Both satisfy the
//! identity `decode(encode(bytes)) == bytes`, and both diagnose truncated
//! input as [`invalid_argument`][rill_base::Status::invalid_argument] when
//! the reader closes.
//!
//! # Example
//!
//! ```
//! use rill_base::Object;
//! use rill_codec::{BrotliOptions, CodecReader, CodecWriter};
//! use rill_stream::{ChainWriter, Reader, Writer};
//!
//! let mut dst = ChainWriter::new();
//! {
//!     let mut writer = CodecWriter::brotli(&mut dst, BrotliOptions::default());
//!     writer.write(b"compress me");
//!     assert!(writer.close());
//! }
//!
//! let mut reader = CodecReader::brotli(dst.read_mode(0));
//! let mut out = Vec::new();
//! reader.read_to_vec(11, &mut out);
//! assert_eq!(out, b"compress me");
//! ```

mod brotli;
mod codec;
mod reader;
mod snappy;
mod writer;

pub use brotli::BrotliOptions;
pub use codec::{
    CodecKey, DecodeProgress, DecodeStep, EncodeOp, EncodeProgress, StreamDecoder, StreamEncoder,
};
pub use reader::CodecReader;
pub use writer::CodecWriter;
