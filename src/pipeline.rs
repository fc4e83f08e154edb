//! Pipeline plumbing: decode errors, the per-parse status object and the
//! byte-sink protocol connecting a byte source to a decoder.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use crate::decoder::Decoder;
use crate::handlers::HandlerPlan;

/// Enum describing the kind of a [`DecodeError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The stream ended in the middle of a field tag.
    EofInTag,

    /// A tag carried a field number of zero or beyond the 29-bit limit.
    BadFieldNumber,

    /// A field's wire type does not match its declared type, or the tag
    /// used one of the two unused wire-type encodings.
    TypeMismatch,

    /// The stream ended in the middle of a value.
    EofInValue,

    /// A length-delimited submessage ended in the middle of a value, or a
    /// nested value overran its enclosing message.
    TruncatedSubmessage,

    /// An end-group tag did not match the group being decoded.
    BadGroupNesting,

    /// The input nested submessages or groups deeper than the decoder's
    /// frame stack.
    MaxDepthExceeded,

    /// A handler aborted decoding.
    HandlerAbort,

    /// A varint ran longer than ten bytes or carried more than 64 bits.
    BadVarint,
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::EofInTag => write!(f, "end of stream inside a tag"),
            DecodeErrorKind::BadFieldNumber => write!(f, "invalid field number"),
            DecodeErrorKind::TypeMismatch => {
                write!(f, "wire type does not match declared field type")
            }
            DecodeErrorKind::EofInValue => write!(f, "end of stream inside a value"),
            DecodeErrorKind::TruncatedSubmessage => {
                write!(f, "submessage ended in the middle of a value")
            }
            DecodeErrorKind::BadGroupNesting => write!(f, "mismatched group tags"),
            DecodeErrorKind::MaxDepthExceeded => write!(f, "message nesting is too deep"),
            DecodeErrorKind::HandlerAbort => write!(f, "a handler aborted decoding"),
            DecodeErrorKind::BadVarint => write!(f, "invalid varint"),
        }
    }
}

/// Error decoding a wire-format stream.
///
/// Carries the error kind plus whatever context is known at the failure
/// point: the field number being decoded, the byte offset into the stream
/// and the submessage nesting depth.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    message: Option<String>,
    field: Option<u32>,
    offset: Option<u64>,
    depth: Option<usize>,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            message: None,
            field: None,
            offset: None,
            depth: None,
        }
    }

    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// The field number being decoded when the error occurred.
    pub fn field(&self) -> Option<u32> {
        self.field
    }

    /// Byte offset into the stream at which the error occurred.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Submessage nesting depth at which the error occurred.
    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    pub fn with_field(mut self, field: u32) -> DecodeError {
        self.field = Some(field);
        self
    }

    pub fn at_offset(mut self, offset: u64) -> DecodeError {
        self.offset = Some(offset);
        self
    }

    pub fn at_depth(mut self, depth: usize) -> DecodeError {
        self.depth = Some(depth);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> DecodeError {
        self.message = Some(message.into());
        self
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}", msg)?,
            None => write!(f, "{}", self.kind)?,
        }
        if let Some(field) = self.field {
            write!(f, " (field {})", field)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " at offset {}", offset)?;
        }
        if let Some(depth) = self.depth {
            write!(f, " at depth {}", depth)?;
        }
        Ok(())
    }
}

impl Error for DecodeError {}

/// Per-parse status carrier.
///
/// A status starts out OK. The decoder records the first fatal error in
/// it; end-of-message and end-of-string handlers receive it mutably and
/// may record a failure of their own, which terminates decoding.
#[derive(Clone, Debug, Default)]
pub struct Status {
    error: Option<DecodeError>,
}

impl Status {
    pub fn new() -> Status {
        Status::default()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&DecodeError> {
        self.error.as_ref()
    }

    /// Record an error. The first recorded error wins.
    pub fn set_error(&mut self, error: DecodeError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Record a handler-reported failure with a custom message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.set_error(DecodeError::new(DecodeErrorKind::HandlerAbort).with_message(message));
    }

    pub(crate) fn clear(&mut self) {
        self.error = None;
    }
}

/// The byte-sink protocol: accepts buffers, reports how much was consumed.
///
/// Buffers may be split at any byte offset; the sink carries partial state
/// across calls. `put` may consume less than offered (eg. when a string
/// handler refuses bytes); the caller re-offers the remainder later.
pub trait BytesSink {
    /// Push a buffer of bytes, returning how many were consumed.
    fn put(&mut self, buf: &[u8]) -> Result<usize, DecodeError>;

    /// Signal the end of the byte stream.
    fn end_of_stream(&mut self) -> Result<(), DecodeError>;
}

/// Couples a decoder to a consumer for the duration of one or more parses.
///
/// A pipeline owns the per-parse state (decoder frames, status); the
/// handler plan it runs is shared and immutable, so one plan may back many
/// pipelines running concurrently. [`reset`](Pipeline::reset) clears the
/// parse state so the pipeline can be reused for another stream.
pub struct Pipeline<C> {
    decoder: Decoder<C>,
}

impl<C: Clone> Pipeline<C> {
    /// Create a pipeline decoding into `closure` using `plan`.
    pub fn new(plan: Arc<HandlerPlan<C>>, closure: C) -> Pipeline<C> {
        Pipeline {
            decoder: Decoder::new(plan, closure),
        }
    }

    /// Discard all parse state and start over with a fresh root closure.
    pub fn reset(&mut self, closure: C) {
        self.decoder.reset(closure);
    }

    /// The status of the current parse. Holds the first error after a
    /// failure.
    pub fn status(&self) -> &Status {
        self.decoder.status()
    }
}

impl<C: Clone> BytesSink for Pipeline<C> {
    fn put(&mut self, buf: &[u8]) -> Result<usize, DecodeError> {
        self.decoder.put(buf)
    }

    fn end_of_stream(&mut self) -> Result<(), DecodeError> {
        self.decoder.end_of_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, DecodeErrorKind, Status};

    #[test]
    fn test_error_display() {
        let err = DecodeError::new(DecodeErrorKind::TypeMismatch)
            .with_field(5)
            .at_offset(12);
        assert_eq!(
            err.to_string(),
            "wire type does not match declared field type (field 5) at offset 12"
        );

        let err = DecodeError::new(DecodeErrorKind::MaxDepthExceeded).at_depth(64);
        assert_eq!(err.to_string(), "message nesting is too deep at depth 64");
    }

    #[test]
    fn test_status_keeps_first_error() {
        let mut status = Status::new();
        assert!(status.is_ok());

        status.fail("bad record");
        status.set_error(DecodeError::new(DecodeErrorKind::EofInValue));

        let err = status.error().unwrap();
        assert_eq!(err.kind(), DecodeErrorKind::HandlerAbort);
        assert_eq!(err.to_string(), "bad record");
    }
}
