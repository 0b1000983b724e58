// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use rill_base::{Buffer, Object, ObjectState, Position, Status};
use rill_chain::Chain;
use rill_pool::{KeyedRecycled, KeyedRecyclingPool};
use rill_stream::{FlushType, Writer};

use crate::codec::{CodecKey, EncodeOp, StreamEncoder};

// Uncompressed bytes staged between encoder invocations.
const STAGING_SIZE: usize = 64 * 1024;
// Size of each compressed output span reserved in the staging chain.
const OUTPUT_SPAN_MIN: usize = 4 * 1024;
const OUTPUT_SPAN_MAX: usize = 64 * 1024;

pub(crate) type EncoderFactory = Box<dyn FnOnce() -> Box<dyn StreamEncoder> + Send>;

pub(crate) fn encoder_pool() -> KeyedRecyclingPool<CodecKey, Box<dyn StreamEncoder>> {
    let max_size = KeyedRecyclingPool::<CodecKey, Box<dyn StreamEncoder>>::default_global_max_size();
    KeyedRecyclingPool::global(max_size)
}

/// A writer that compresses its input and writes the result to an inner
/// writer.
///
/// Construct through a codec, e.g. [`CodecWriter::brotli`] or
/// [`CodecWriter::snappy`]. Pass `&mut inner` to keep ownership of the inner
/// writer, or move it in; the compressed stream is terminated when this
/// writer closes, after which the inner writer still holds buffered data
/// until it is flushed or closed itself.
///
/// Encoder state comes from the process-wide recycling pool keyed by codec
/// and parameters. Uncompressed input stages in a buffer window; on overflow,
/// flush, and close it runs through the encoder in block-aligned units, and
/// the compressed bytes stage in a [`Chain`] handed to the inner writer as
/// one block transfer.
///
/// Positions are uncompressed positions.
pub struct CodecWriter<W: Writer> {
    state: ObjectState,
    dst: W,
    // None once the stream has been finished.
    encoder: Option<KeyedRecycled<CodecKey, Box<dyn StreamEncoder>>>,
    buf: Buffer,
    cursor: usize,
    // Uncompressed bytes already handed to the encoder.
    flushed_pos: Position,
}

impl<W: Writer> CodecWriter<W> {
    pub(crate) fn acquire(dst: W, key: CodecKey, factory: EncoderFactory) -> Self {
        let encoder = encoder_pool().get(key.clone(), factory, |encoder| encoder.reset());
        tracing::debug!(codec = key.codec(), "opened codec writer");
        Self {
            state: ObjectState::new(),
            dst,
            encoder: Some(encoder),
            buf: Buffer::new(),
            cursor: 0,
            flushed_pos: 0,
        }
    }

    /// The inner writer receiving the compressed stream.
    #[must_use]
    pub fn dst(&self) -> &W {
        &self.dst
    }

    fn discard_encoder(&mut self) {
        if let Some(handle) = self.encoder.take() {
            drop(handle.into_inner());
        }
    }

    fn propagate_dst_failure(&mut self) -> bool {
        let status = self
            .dst
            .status()
            .cloned()
            .unwrap_or_else(|| Status::internal("destination failed without a status"));
        let status = status.annotate(format!("at uncompressed byte {}", self.flushed_pos + self.cursor as Position));
        self.discard_encoder();
        self.fail_without_annotation(status)
    }

    // Runs the staged input through the encoder and hands the compressed
    // bytes to the inner writer.
    fn compress_staged(&mut self, op: EncodeOp) -> bool {
        if self.encoder.is_none() {
            return self.fail(Status::failed_precondition("compressed stream already finished"));
        }
        let staged_len = self.cursor;
        let mut consumed_total = 0;
        let mut compressed = Chain::new();
        loop {
            let progress = {
                let Self { buf, encoder, .. } = self;
                let encoder = encoder.as_mut().expect("encoder present while looping");
                let input = &buf.as_slice()[consumed_total..staged_len];
                let mut span = compressed.append_buffer(OUTPUT_SPAN_MIN, staged_len / 2 + 64, OUTPUT_SPAN_MAX);
                match encoder.compress(input, &mut span, op) {
                    Ok(progress) => {
                        let produced = progress.produced;
                        span.commit(produced);
                        Ok(progress)
                    }
                    Err(status) => Err(status),
                }
            };
            let progress = match progress {
                Ok(progress) => progress,
                Err(status) => {
                    self.discard_encoder();
                    return self.fail(status);
                }
            };
            consumed_total += progress.consumed;
            let finished = match op {
                EncodeOp::Process => consumed_total == staged_len,
                EncodeOp::Flush | EncodeOp::Finish => consumed_total == staged_len && progress.done,
            };
            if finished {
                break;
            }
        }
        if !compressed.is_empty() && !self.dst.write_chain(&compressed) {
            return self.propagate_dst_failure();
        }
        self.flushed_pos += staged_len as Position;
        self.cursor = 0;
        true
    }
}

impl<W: Writer> Object for CodecWriter<W> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn done(&mut self) {
        if self.ok() && self.compress_staged(EncodeOp::Finish) {
            // A cleanly finished encoder is safe to recycle.
            self.encoder = None;
        } else {
            self.discard_encoder();
        }
    }

    fn annotate_status(&self, status: Status) -> Status {
        status.annotate(format!("at uncompressed byte {}", self.flushed_pos + self.cursor as Position))
    }
}

impl<W: Writer> Writer for CodecWriter<W> {
    fn window_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut_slice()
    }

    fn window_len(&self) -> usize {
        self.buf.capacity()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.window_len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        self.flushed_pos + self.buf.capacity() as Position
    }

    fn push_slow(&mut self, min: usize, recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        if !self.compress_staged(EncodeOp::Process) {
            return false;
        }
        let want = min.max(recommended.min(STAGING_SIZE)).max(STAGING_SIZE);
        self.buf.ensure_capacity(want);
        true
    }

    fn flush(&mut self, flush_type: FlushType) -> bool {
        if !self.ok() {
            return false;
        }
        // Every strength pushes staged data through the encoder so a reader
        // of the compressed stream can surface it.
        if !self.compress_staged(EncodeOp::Flush) {
            return false;
        }
        if !self.dst.flush(flush_type) {
            return self.propagate_dst_failure();
        }
        true
    }
}

impl<W: Writer> Drop for CodecWriter<W> {
    fn drop(&mut self) {
        self.close();
    }
}
