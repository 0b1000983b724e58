// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use rill_base::{Object, ObjectState, Position, Status};
use rill_pool::{KeyedRecycled, KeyedRecyclingPool};
use rill_stream::{Reader, Scratch};

use crate::codec::{CodecKey, DecodeStep, StreamDecoder};

// One output request from the decoder; the scratch grows past this as needed.
const OUTPUT_CHUNK: usize = 16 * 1024;

pub(crate) type DecoderFactory = Arc<dyn Fn() -> Box<dyn StreamDecoder> + Send + Sync>;

pub(crate) fn decoder_pool() -> KeyedRecyclingPool<CodecKey, Box<dyn StreamDecoder>> {
    let max_size = KeyedRecyclingPool::<CodecKey, Box<dyn StreamDecoder>>::default_global_max_size();
    KeyedRecyclingPool::global(max_size)
}

/// A reader that decompresses a stream read from an inner reader.
///
/// Construct through a codec, e.g. [`CodecReader::brotli`] or
/// [`CodecReader::snappy`]. Pass `&mut inner` to keep ownership of the inner
/// reader, or move it in.
///
/// Decoder state is acquired from the process-wide recycling pool keyed by
/// codec and parameters, and returned there when the stream ends cleanly or
/// the reader closes.
///
/// Positions are uncompressed positions. Backward seeking works when the
/// inner reader can rewind: the decoder is reinitialized, the source seeks
/// back to the initial compressed position, and data is discarded forward.
///
/// If the compressed stream ends mid-way, pulls return `false` with `ok()`
/// still true, and closing the reader records
/// [`invalid_argument`][Status::invalid_argument] mentioning the truncation,
/// matching the behavior of seek-detected truncation reporting
/// [`data_loss`][Status::data_loss].
pub struct CodecReader<R: Reader> {
    state: ObjectState,
    src: R,
    key: CodecKey,
    factory: DecoderFactory,
    // None once the decoder reported a clean end of stream.
    decoder: Option<KeyedRecycled<CodecKey, Box<dyn StreamDecoder>>>,
    // Decompressed bytes form the window here; the decoder produces bursts
    // and the scratch splices them into the contiguous view.
    scratch: Scratch,
    cursor: usize,
    limit_pos: Position,
    initial_compressed_pos: Position,
    truncated: bool,
}

impl<R: Reader> CodecReader<R> {
    pub(crate) fn acquire(src: R, key: CodecKey, factory: DecoderFactory) -> Self {
        let initial_compressed_pos = src.pos();
        let decoder = Self::acquire_decoder(&key, &factory);
        tracing::debug!(codec = key.codec(), pos = initial_compressed_pos, "opened codec reader");
        Self {
            state: ObjectState::new(),
            src,
            key,
            factory,
            decoder: Some(decoder),
            scratch: Scratch::new(),
            cursor: 0,
            limit_pos: 0,
            initial_compressed_pos,
            truncated: false,
        }
    }

    fn acquire_decoder(
        key: &CodecKey,
        factory: &DecoderFactory,
    ) -> KeyedRecycled<CodecKey, Box<dyn StreamDecoder>> {
        decoder_pool().get(key.clone(), || factory(), |decoder| decoder.reset())
    }

    /// The inner reader, positioned within the compressed stream.
    #[must_use]
    pub fn src(&self) -> &R {
        &self.src
    }

    // Returns the decoder state to the pool for reuse.
    fn release_decoder(&mut self) {
        self.decoder = None;
    }

    // Destroys the decoder state instead of recycling it; used when the
    // state may be poisoned by an error.
    fn discard_decoder(&mut self) {
        if let Some(handle) = self.decoder.take() {
            drop(handle.into_inner());
        }
    }

    fn annotate_over_src(&self, status: Status) -> Status {
        status.annotate(format!("at uncompressed byte {}", self.pos()))
    }

    fn propagate_src_failure(&mut self) -> bool {
        let status = self
            .src
            .status()
            .cloned()
            .unwrap_or_else(|| Status::internal("source failed without a status"));
        let status = self.annotate_over_src(status);
        self.discard_decoder();
        self.fail_without_annotation(status)
    }
}

impl<R: Reader> Object for CodecReader<R> {
    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn done(&mut self) {
        if self.truncated {
            let status = Status::invalid_argument("truncated compressed stream")
                .annotate(format!("at uncompressed byte {}", self.pos()));
            self.state.fail(status);
            self.discard_decoder();
        } else {
            self.release_decoder();
        }
    }

    fn annotate_status(&self, status: Status) -> Status {
        let status = if self.truncated {
            status.annotate("reading truncated compressed stream")
        } else {
            status
        };
        status.annotate(format!("at uncompressed byte {}", self.pos()))
    }
}

impl<R: Reader> Reader for CodecReader<R> {
    fn window(&self) -> &[u8] {
        self.scratch.filled()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.scratch.len());
        self.cursor = cursor;
    }

    fn limit_pos(&self) -> Position {
        self.limit_pos
    }

    fn pull_slow(&mut self, min: usize, _recommended: usize) -> bool {
        if !self.ok() {
            return false;
        }
        let min = min.max(1);
        self.scratch.carry_unread(self.cursor);
        self.cursor = 0;
        if self.decoder.is_none() {
            // Clean end of stream was already reached.
            return false;
        }
        self.truncated = false;
        loop {
            if self.scratch.len() >= min {
                return true;
            }
            let spare = (min - self.scratch.len()).max(OUTPUT_CHUNK);
            let progress = {
                let Self { src, scratch, decoder, .. } = self;
                let decoder = decoder.as_mut().expect("decoder present while looping");
                let input = &src.window()[src.cursor()..];
                decoder.decompress(input, scratch.spare(spare))
            };
            let progress = match progress {
                Ok(progress) => progress,
                Err(status) => {
                    self.discard_decoder();
                    return self.fail(status);
                }
            };
            let src_cursor = self.src.cursor();
            self.src.set_cursor(src_cursor + progress.consumed);
            self.scratch.commit(progress.produced);
            self.limit_pos = match self.limit_pos.checked_add(progress.produced as Position) {
                Some(limit_pos) => limit_pos,
                None => return self.fail_overflow(),
            };
            match progress.step {
                DecodeStep::Done => {
                    self.release_decoder();
                    return self.scratch.len() >= min;
                }
                DecodeStep::NeedsOutput => {}
                DecodeStep::NeedsInput => {
                    if progress.produced > 0 {
                        // Surface the produced output before demanding more
                        // input, so data written before a flush on the
                        // producer side becomes visible without waiting for
                        // what follows it.
                        continue;
                    }
                    if !self.src.pull(1, OUTPUT_CHUNK) {
                        if !self.src.ok() {
                            return self.propagate_src_failure();
                        }
                        self.truncated = true;
                        return false;
                    }
                }
            }
        }
    }

    fn supports_rewind(&self) -> bool {
        self.src.supports_rewind()
    }

    fn supports_new_reader(&self) -> bool {
        self.src.supports_new_reader()
    }

    fn seek_slow(&mut self, new_pos: Position) -> bool {
        if !self.ok() {
            return false;
        }
        if new_pos <= self.limit_pos {
            // Backward: reinitialize the decoder and replay from the start
            // of the compressed stream.
            if !self.src.supports_rewind() {
                return self.fail(Status::failed_precondition(
                    "compressed source does not support rewinding",
                ));
            }
            tracing::debug!(new_pos, "reinitializing decoder for backward seek");
            self.truncated = false;
            self.scratch.clear();
            self.cursor = 0;
            self.limit_pos = 0;
            match &mut self.decoder {
                Some(decoder) => decoder.reset(),
                None => self.decoder = Some(Self::acquire_decoder(&self.key, &self.factory)),
            }
            if !self.src.seek(self.initial_compressed_pos) {
                if !self.src.ok() {
                    return self.propagate_src_failure();
                }
                return self.fail(Status::data_loss("compressed stream got truncated"));
            }
            // The shortcut below is only valid because the window restarted
            // at position zero.
            debug_assert_eq!(self.limit_pos(), 0);
            if new_pos == 0 {
                return true;
            }
        }
        // Forward: decode and discard.
        loop {
            let remaining = usize::try_from(new_pos - self.pos()).unwrap_or(usize::MAX);
            let in_window = self.available().min(remaining);
            let cursor = self.cursor;
            self.set_cursor(cursor + in_window);
            if self.pos() == new_pos {
                return true;
            }
            if !self.pull(1, OUTPUT_CHUNK) {
                return false;
            }
        }
    }

    fn new_reader(&self, initial_pos: Position) -> Option<Box<dyn Reader + '_>> {
        if !self.ok() {
            return None;
        }
        let compressed = self.src.new_reader(self.initial_compressed_pos)?;
        let mut reader = CodecReader::acquire(compressed, self.key.clone(), Arc::clone(&self.factory));
        if !reader.seek(initial_pos) && !reader.ok() {
            return None;
        }
        Some(Box::new(reader))
    }
}

impl<R: Reader> Drop for CodecReader<R> {
    fn drop(&mut self) {
        self.close();
    }
}
