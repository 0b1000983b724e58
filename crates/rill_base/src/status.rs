// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// Classifies a [`Status`] for programmatic handling.
///
/// The code identifies the kind of failure; the human-readable detail lives in the
/// [`Status`] message and its context entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum StatusCode {
    /// Malformed input: a corrupt codec stream, a truncated frame, a bad dictionary.
    #[error("invalid argument")]
    InvalidArgument,

    /// Unexpected truncation of the underlying data, detected on seek or end verification.
    #[error("data loss")]
    DataLoss,

    /// A position or size exceeds the representable range.
    #[error("out of range")]
    OutOfRange,

    /// A declared size exceeds what can be held in memory.
    #[error("resource exhausted")]
    ResourceExhausted,

    /// A library dependency returned a state it never should have.
    #[error("internal")]
    Internal,

    /// API misuse, such as seeking a stream that does not support seeking.
    #[error("failed precondition")]
    FailedPrecondition,

    /// An operating system error from the underlying source or sink.
    #[error("I/O error")]
    Io,
}

/// A failure description that accumulates context as it travels up a stream stack.
///
/// A `Status` is created by the layer that first detects a failure and is then
/// annotated by each layer above it with that layer's own coordinates, e.g.
/// `"at uncompressed byte 4096"` or `"reading data.log"`. Annotation never
/// changes the [`StatusCode`], only the rendered message.
///
/// ```
/// use rill_base::{Status, StatusCode};
///
/// let status = Status::invalid_argument("truncated frame")
///     .annotate("at uncompressed byte 4096")
///     .annotate("reading data.log");
///
/// assert_eq!(status.code(), StatusCode::InvalidArgument);
/// assert_eq!(status.to_string(), "truncated frame; at uncompressed byte 4096; reading data.log");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    code: StatusCode,
    message: String,
    context: Vec<String>,
}

impl Status {
    /// Creates a status with the given code and message.
    #[must_use]
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Creates an [`StatusCode::InvalidArgument`] status.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    /// Creates a [`StatusCode::DataLoss`] status.
    #[must_use]
    pub fn data_loss(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DataLoss, message)
    }

    /// Creates an [`StatusCode::OutOfRange`] status.
    #[must_use]
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OutOfRange, message)
    }

    /// Creates a [`StatusCode::ResourceExhausted`] status.
    #[must_use]
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted, message)
    }

    /// Creates an [`StatusCode::Internal`] status.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    /// Creates a [`StatusCode::FailedPrecondition`] status.
    #[must_use]
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    /// Wraps an operating system error, preserving its message.
    #[must_use]
    pub fn io(error: &std::io::Error) -> Self {
        Self::new(StatusCode::Io, error.to_string())
    }

    /// The failure classification.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// The message as created, without context entries.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Appends a context entry describing where the failure surfaced.
    ///
    /// Entries render in the order they were added, which is the order in which
    /// the status traveled up through the layers.
    #[must_use]
    pub fn annotate(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// The context entries added so far, oldest first.
    #[must_use]
    pub fn context(&self) -> &[String] {
        &self.context
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for entry in &self.context {
            write!(f, "; {entry}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(error: std::io::Error) -> Self {
        Self::io(&error)
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Status: Send, Sync, std::error::Error);

    #[test]
    fn annotation_preserves_code() {
        let status = Status::data_loss("stream got truncated").annotate("at byte 10");
        assert_eq!(status.code(), StatusCode::DataLoss);
        assert_eq!(status.message(), "stream got truncated");
        assert_eq!(status.to_string(), "stream got truncated; at byte 10");
    }

    #[test]
    fn io_wrapping_keeps_text() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let status = Status::io(&io_error);
        assert_eq!(status.code(), StatusCode::Io);
        assert!(status.to_string().contains("no such file"));
    }

    #[test]
    fn context_accumulates_in_order() {
        let status = Status::invalid_argument("bad frame")
            .annotate("at uncompressed byte 7")
            .annotate("reading input.bin");
        assert_eq!(status.context(), ["at uncompressed byte 7", "reading input.bin"]);
    }
}
