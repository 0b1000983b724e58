// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use rill_base::Status;
use rill_stream::{Reader, Writer};

use crate::codec::{
    CodecKey, DecodeProgress, DecodeStep, EncodeOp, EncodeProgress, StreamDecoder, StreamEncoder,
};
use crate::reader::DecoderFactory;
use crate::writer::EncoderFactory;
use crate::{CodecReader, CodecWriter};

const CODEC_NAME: &str = "snappy";

// Snappy is a whole-block format, so the stream is framed: each frame is a
// little-endian u32 length prefix followed by one raw-format compressed block
// of at most MAX_BLOCK uncompressed bytes, and the stream ends with a
// terminator prefix. The bound keeps decode-side buffering proportional to
// the block size whatever the stream claims.
const MAX_BLOCK: usize = 64 * 1024;
const TERMINATOR: u32 = u32::MAX;

// Compressed frames larger than this cannot come from a MAX_BLOCK input.
const MAX_FRAME: usize = MAX_BLOCK + MAX_BLOCK / 6 + 32;

impl<R: Reader> CodecReader<R> {
    /// Creates a reader decompressing a framed Snappy stream read from `src`.
    #[must_use]
    pub fn snappy(src: R) -> Self {
        let factory: DecoderFactory = Arc::new(|| Box::new(SnappyDecoder::new()) as Box<dyn StreamDecoder>);
        Self::acquire(src, CodecKey::new(CODEC_NAME, 0), factory)
    }
}

impl<W: Writer> CodecWriter<W> {
    /// Creates a writer compressing into a framed Snappy stream written to
    /// `dst`.
    #[must_use]
    pub fn snappy(dst: W) -> Self {
        let factory: EncoderFactory = Box::new(|| Box::new(SnappyEncoder::new()) as Box<dyn StreamEncoder>);
        Self::acquire(dst, CodecKey::new(CODEC_NAME, 0), factory)
    }
}

struct SnappyEncoder {
    raw: snap::raw::Encoder,
    // Uncompressed bytes not yet forming a full block.
    staged: Vec<u8>,
    // Framed compressed bytes not yet handed out.
    pending: Vec<u8>,
    pending_at: usize,
    finished: bool,
}

impl SnappyEncoder {
    fn new() -> Self {
        Self {
            raw: snap::raw::Encoder::new(),
            staged: Vec::new(),
            pending: Vec::new(),
            pending_at: 0,
            finished: false,
        }
    }

    fn emit_block(&mut self) -> Result<(), Status> {
        let compressed = self
            .raw
            .compress_vec(&self.staged)
            .map_err(|error| Status::internal(format!("Snappy compression failed: {error}")))?;
        let len = u32::try_from(compressed.len()).expect("bounded by the compressed size of one block");
        self.pending.extend_from_slice(&len.to_le_bytes());
        self.pending.extend_from_slice(&compressed);
        self.staged.clear();
        Ok(())
    }
}

impl StreamEncoder for SnappyEncoder {
    fn compress(&mut self, input: &[u8], output: &mut [u8], op: EncodeOp) -> Result<EncodeProgress, Status> {
        let mut consumed = 0;
        let mut produced = 0;
        loop {
            if self.pending_at < self.pending.len() {
                let n = (self.pending.len() - self.pending_at).min(output.len() - produced);
                output[produced..produced + n].copy_from_slice(&self.pending[self.pending_at..self.pending_at + n]);
                produced += n;
                self.pending_at += n;
                if self.pending_at == self.pending.len() {
                    self.pending.clear();
                    self.pending_at = 0;
                } else {
                    // Output is full with frames still pending.
                    return Ok(EncodeProgress { consumed, produced, done: false });
                }
            }
            if consumed < input.len() {
                let take = (input.len() - consumed).min(MAX_BLOCK - self.staged.len());
                self.staged.extend_from_slice(&input[consumed..consumed + take]);
                consumed += take;
                if self.staged.len() == MAX_BLOCK {
                    self.emit_block()?;
                }
                continue;
            }
            match op {
                EncodeOp::Process => {
                    return Ok(EncodeProgress { consumed, produced, done: false });
                }
                EncodeOp::Flush | EncodeOp::Finish => {
                    if !self.staged.is_empty() {
                        self.emit_block()?;
                        continue;
                    }
                    if op == EncodeOp::Finish && !self.finished {
                        self.pending.extend_from_slice(&TERMINATOR.to_le_bytes());
                        self.finished = true;
                        continue;
                    }
                    return Ok(EncodeProgress { consumed, produced, done: true });
                }
            }
        }
    }

    fn reset(&mut self) {
        self.staged.clear();
        self.pending.clear();
        self.pending_at = 0;
        self.finished = false;
    }
}

struct SnappyDecoder {
    raw: snap::raw::Decoder,
    header: [u8; 4],
    header_len: usize,
    // The compressed frame being accumulated and its declared length.
    frame: Vec<u8>,
    frame_target: Option<usize>,
    // Decompressed bytes not yet handed out.
    pending: Vec<u8>,
    pending_at: usize,
    finished: bool,
}

impl SnappyDecoder {
    fn new() -> Self {
        Self {
            raw: snap::raw::Decoder::new(),
            header: [0; 4],
            header_len: 0,
            frame: Vec::new(),
            frame_target: None,
            pending: Vec::new(),
            pending_at: 0,
            finished: false,
        }
    }
}

impl StreamDecoder for SnappyDecoder {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<DecodeProgress, Status> {
        let mut consumed = 0;
        let mut produced = 0;
        loop {
            if self.pending_at < self.pending.len() {
                let n = (self.pending.len() - self.pending_at).min(output.len() - produced);
                output[produced..produced + n].copy_from_slice(&self.pending[self.pending_at..self.pending_at + n]);
                produced += n;
                self.pending_at += n;
                if self.pending_at == self.pending.len() {
                    self.pending.clear();
                    self.pending_at = 0;
                } else {
                    return Ok(DecodeProgress { consumed, produced, step: DecodeStep::NeedsOutput });
                }
            }
            if self.finished {
                return Ok(DecodeProgress { consumed, produced, step: DecodeStep::Done });
            }
            match self.frame_target {
                None => {
                    let take = (4 - self.header_len).min(input.len() - consumed);
                    self.header[self.header_len..self.header_len + take]
                        .copy_from_slice(&input[consumed..consumed + take]);
                    self.header_len += take;
                    consumed += take;
                    if self.header_len < 4 {
                        return Ok(DecodeProgress { consumed, produced, step: DecodeStep::NeedsInput });
                    }
                    self.header_len = 0;
                    let declared = u32::from_le_bytes(self.header);
                    if declared == TERMINATOR {
                        self.finished = true;
                        continue;
                    }
                    let declared = declared as usize;
                    if declared == 0 || declared > MAX_FRAME {
                        return Err(Status::invalid_argument("invalid Snappy frame length"));
                    }
                    self.frame.clear();
                    self.frame_target = Some(declared);
                }
                Some(target) => {
                    let take = (target - self.frame.len()).min(input.len() - consumed);
                    self.frame.extend_from_slice(&input[consumed..consumed + take]);
                    consumed += take;
                    if self.frame.len() < target {
                        return Ok(DecodeProgress { consumed, produced, step: DecodeStep::NeedsInput });
                    }
                    let block = self
                        .raw
                        .decompress_vec(&self.frame)
                        .map_err(|error| Status::invalid_argument(format!("invalid Snappy frame: {error}")))?;
                    if block.len() > MAX_BLOCK {
                        return Err(Status::invalid_argument("Snappy frame exceeds the block limit"));
                    }
                    self.pending = block;
                    self.pending_at = 0;
                    self.frame.clear();
                    self.frame_target = None;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.header_len = 0;
        self.frame.clear();
        self.frame_target = None;
        self.pending.clear();
        self.pending_at = 0;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(payload: &[u8]) -> Vec<u8> {
        let mut encoder = SnappyEncoder::new();
        let mut out = vec![0_u8; MAX_FRAME * (payload.len() / MAX_BLOCK + 2)];
        let mut produced = 0;
        let mut consumed = 0;
        loop {
            let progress = encoder
                .compress(&payload[consumed..], &mut out[produced..], EncodeOp::Finish)
                .unwrap();
            consumed += progress.consumed;
            produced += progress.produced;
            if progress.done && consumed == payload.len() {
                break;
            }
        }
        out.truncate(produced);
        out
    }

    fn decode_all(compressed: &[u8]) -> (Vec<u8>, DecodeStep) {
        let mut decoder = SnappyDecoder::new();
        let mut out = Vec::new();
        let mut buf = [0_u8; 1024];
        let mut consumed = 0;
        loop {
            let progress = decoder.decompress(&compressed[consumed..], &mut buf).unwrap();
            consumed += progress.consumed;
            out.extend_from_slice(&buf[..progress.produced]);
            match progress.step {
                DecodeStep::Done => return (out, DecodeStep::Done),
                DecodeStep::NeedsOutput => {}
                DecodeStep::NeedsInput => {
                    if consumed == compressed.len() {
                        return (out, DecodeStep::NeedsInput);
                    }
                }
            }
        }
    }

    #[test]
    fn frame_round_trip() {
        let payload: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
        let compressed = encode_all(&payload);
        let (decoded, step) = decode_all(&compressed);
        assert_eq!(step, DecodeStep::Done);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn empty_stream_is_just_the_terminator() {
        let compressed = encode_all(b"");
        assert_eq!(compressed, TERMINATOR.to_le_bytes());
        let (decoded, step) = decode_all(&compressed);
        assert_eq!(step, DecodeStep::Done);
        assert!(decoded.is_empty());
    }

    #[test]
    fn missing_terminator_reads_as_needing_input() {
        let mut compressed = encode_all(b"payload");
        compressed.truncate(compressed.len() - 1);
        let (decoded, step) = decode_all(&compressed);
        assert_eq!(step, DecodeStep::NeedsInput);
        assert_eq!(decoded, b"payload");
    }

    #[test]
    fn corrupt_frame_is_invalid() {
        let mut compressed = encode_all(b"payload payload payload");
        // Corrupt the block's uncompressed-length varint, just past the
        // frame's length prefix.
        compressed[4] ^= 0xFF;
        let mut decoder = SnappyDecoder::new();
        let mut out = [0_u8; 1024];
        let error = decoder.decompress(&compressed, &mut out).unwrap_err();
        assert_eq!(error.code(), rill_base::StatusCode::InvalidArgument);
    }
}
