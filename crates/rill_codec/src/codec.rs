// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::Status;

/// What a decoder needs next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStep {
    /// More compressed input is required to make progress.
    NeedsInput,
    /// More output space is required to make progress.
    NeedsOutput,
    /// The compressed stream ended cleanly.
    Done,
}

/// Result of one [`StreamDecoder::decompress`] call.
#[derive(Clone, Copy, Debug)]
pub struct DecodeProgress {
    /// Bytes consumed from the front of the input.
    pub consumed: usize,
    /// Bytes produced into the front of the output.
    pub produced: usize,
    /// What the decoder needs next.
    pub step: DecodeStep,
}

/// How hard an encoder must drain on a [`StreamEncoder::compress`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeOp {
    /// Compress at the encoder's own pace; it may keep data internal.
    Process,
    /// Emit everything consumed so far so a decoder can surface it.
    Flush,
    /// Terminate the compressed stream.
    Finish,
}

/// Result of one [`StreamEncoder::compress`] call.
#[derive(Clone, Copy, Debug)]
pub struct EncodeProgress {
    /// Bytes consumed from the front of the input.
    pub consumed: usize,
    /// Bytes produced into the front of the output.
    pub produced: usize,
    /// For [`EncodeOp::Flush`] and [`EncodeOp::Finish`]: whether everything
    /// the operation requires has been emitted. Meaningless for
    /// [`EncodeOp::Process`].
    pub done: bool,
}

/// A streaming block decompressor.
///
/// The contract mirrors the C-style `(in, in_left, out, out_left)` interface
/// of block compression libraries: each call consumes some input, produces
/// some output, and reports which side it is blocked on. Implementations are
/// pooled and must come back to their freshly-created state on
/// [`reset()`][Self::reset].
pub trait StreamDecoder: Send {
    /// Decompresses from `input` into `output`.
    ///
    /// An error means the compressed data is invalid; the decoder is
    /// unusable afterwards except for [`reset()`][Self::reset].
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<DecodeProgress, Status>;

    /// Returns the decoder to its initial state, ready for a new stream.
    fn reset(&mut self);
}

/// A streaming block compressor.
///
/// Pooled and reset like [`StreamDecoder`].
pub trait StreamEncoder: Send {
    /// Compresses from `input` into `output` with the given drain strength.
    fn compress(&mut self, input: &[u8], output: &mut [u8], op: EncodeOp) -> Result<EncodeProgress, Status>;

    /// Returns the encoder to its initial state, ready for a new stream.
    fn reset(&mut self);
}

/// Identifies reusable codec state in the recycling pool: states created for
/// the same codec with the same parameters are interchangeable after a reset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodecKey {
    codec: &'static str,
    params: u64,
}

impl CodecKey {
    /// Creates a key for `codec` with its packed parameters.
    #[must_use]
    pub fn new(codec: &'static str, params: u64) -> Self {
        Self { codec, params }
    }

    /// The codec name.
    #[must_use]
    pub fn codec(&self) -> &'static str {
        self.codec
    }
}

