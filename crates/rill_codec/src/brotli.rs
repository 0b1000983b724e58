// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use brotli::enc::encode::{
    BrotliEncoderCompressStream, BrotliEncoderCreateInstance, BrotliEncoderHasMoreOutput,
    BrotliEncoderIsFinished, BrotliEncoderOperation, BrotliEncoderParameter,
    BrotliEncoderSetParameter, BrotliEncoderStateStruct,
};
use brotli::enc::StandardAlloc;
use brotli::{BrotliDecompressStream, BrotliResult, BrotliState};
use rill_base::Status;
use rill_stream::{Reader, Writer};

use crate::codec::{
    CodecKey, DecodeProgress, DecodeStep, EncodeOp, EncodeProgress, StreamDecoder, StreamEncoder,
};
use crate::reader::DecoderFactory;
use crate::writer::EncoderFactory;
use crate::{CodecReader, CodecWriter};

const CODEC_NAME: &str = "brotli";

/// Brotli compression parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BrotliOptions {
    quality: u32,
    window_log: u32,
}

impl BrotliOptions {
    /// Compression quality, 0 (fastest) to 11 (densest). Default 6.
    #[must_use]
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality.min(11);
        self
    }

    /// Base-2 logarithm of the history window, 10 to 24. Default 22.
    #[must_use]
    pub fn with_window_log(mut self, window_log: u32) -> Self {
        self.window_log = window_log.clamp(10, 24);
        self
    }

    fn packed(self) -> u64 {
        u64::from(self.quality) << 8 | u64::from(self.window_log)
    }
}

impl Default for BrotliOptions {
    fn default() -> Self {
        Self {
            quality: 6,
            window_log: 22,
        }
    }
}

impl<R: Reader> CodecReader<R> {
    /// Creates a reader decompressing a Brotli stream read from `src`.
    #[must_use]
    pub fn brotli(src: R) -> Self {
        let factory: DecoderFactory = Arc::new(|| Box::new(BrotliDecoder::new()) as Box<dyn StreamDecoder>);
        Self::acquire(src, CodecKey::new(CODEC_NAME, 0), factory)
    }
}

impl<W: Writer> CodecWriter<W> {
    /// Creates a writer compressing into a Brotli stream written to `dst`.
    #[must_use]
    pub fn brotli(dst: W, options: BrotliOptions) -> Self {
        let factory: EncoderFactory = Box::new(move || Box::new(BrotliEncoder::new(options)) as Box<dyn StreamEncoder>);
        Self::acquire(dst, CodecKey::new(CODEC_NAME, options.packed()), factory)
    }
}

struct BrotliDecoder {
    state: BrotliState<StandardAlloc, StandardAlloc, StandardAlloc>,
}

impl BrotliDecoder {
    fn new() -> Self {
        Self {
            state: fresh_decoder_state(),
        }
    }
}

fn fresh_decoder_state() -> BrotliState<StandardAlloc, StandardAlloc, StandardAlloc> {
    BrotliState::new(
        StandardAlloc::default(),
        StandardAlloc::default(),
        StandardAlloc::default(),
    )
}

impl StreamDecoder for BrotliDecoder {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<DecodeProgress, Status> {
        let mut available_in = input.len();
        let mut input_offset = 0;
        let mut available_out = output.len();
        let mut output_offset = 0;
        let mut total_out = 0;
        let result = BrotliDecompressStream(
            &mut available_in,
            &mut input_offset,
            input,
            &mut available_out,
            &mut output_offset,
            output,
            &mut total_out,
            &mut self.state,
        );
        let step = match result {
            BrotliResult::ResultSuccess => DecodeStep::Done,
            BrotliResult::NeedsMoreInput => DecodeStep::NeedsInput,
            BrotliResult::NeedsMoreOutput => DecodeStep::NeedsOutput,
            BrotliResult::ResultFailure => {
                return Err(Status::invalid_argument("invalid Brotli stream"));
            }
        };
        Ok(DecodeProgress {
            consumed: input_offset,
            produced: output_offset,
            step,
        })
    }

    fn reset(&mut self) {
        self.state = fresh_decoder_state();
    }
}

struct BrotliEncoder {
    state: BrotliEncoderStateStruct<StandardAlloc>,
    options: BrotliOptions,
}

impl BrotliEncoder {
    fn new(options: BrotliOptions) -> Self {
        Self {
            state: fresh_encoder_state(options),
            options,
        }
    }
}

fn fresh_encoder_state(options: BrotliOptions) -> BrotliEncoderStateStruct<StandardAlloc> {
    let mut state = BrotliEncoderCreateInstance(StandardAlloc::default());
    BrotliEncoderSetParameter(
        &mut state,
        BrotliEncoderParameter::BROTLI_PARAM_QUALITY,
        options.quality,
    );
    BrotliEncoderSetParameter(
        &mut state,
        BrotliEncoderParameter::BROTLI_PARAM_LGWIN,
        options.window_log,
    );
    state
}

impl StreamEncoder for BrotliEncoder {
    fn compress(&mut self, input: &[u8], output: &mut [u8], op: EncodeOp) -> Result<EncodeProgress, Status> {
        let operation = match op {
            EncodeOp::Process => BrotliEncoderOperation::BROTLI_OPERATION_PROCESS,
            EncodeOp::Flush => BrotliEncoderOperation::BROTLI_OPERATION_FLUSH,
            EncodeOp::Finish => BrotliEncoderOperation::BROTLI_OPERATION_FINISH,
        };
        let mut available_in = input.len();
        let mut input_offset = 0;
        let mut available_out = output.len();
        let mut output_offset = 0;
        let mut total_out = Some(0);
        let result = BrotliEncoderCompressStream(
            &mut self.state,
            operation,
            &mut available_in,
            input,
            &mut input_offset,
            &mut available_out,
            output,
            &mut output_offset,
            &mut total_out,
            &mut |_a, _b, _c, _d| (),
        );
        if result == 0 {
            return Err(Status::internal("Brotli encoder rejected the stream state"));
        }
        let done = match op {
            EncodeOp::Process => false,
            EncodeOp::Flush => BrotliEncoderHasMoreOutput(&mut self.state) == 0,
            EncodeOp::Finish => BrotliEncoderIsFinished(&mut self.state) != 0,
        };
        Ok(EncodeProgress {
            consumed: input_offset,
            produced: output_offset,
            done,
        })
    }

    fn reset(&mut self) {
        self.state = fresh_encoder_state(self.options);
    }
}
