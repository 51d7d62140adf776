//! Error taxonomy of the element stream decoder.
//!
//! Every structural variant carries the byte offset
//! at which the problem was detected,
//! counting from the first byte of the source.
use dicom_stream_core::{Tag, VR};
use snafu::{Backtrace, Snafu};
use std::fmt;

/// The kind of structural fault behind a
/// [`MalformedDelimiter`](FormatError::MalformedDelimiter) error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DelimiterFault {
    /// An item or sequence delimiter declared a non-zero length.
    NonZeroLength,
    /// The undefined length sentinel was found on an element
    /// whose value representation does not admit it.
    IllegalUndefinedLength(VR),
    /// A control tag appeared where it cannot be,
    /// or a non-item tag appeared inside a sequence.
    UnexpectedTag,
    /// Content was read past the declared end of its enclosing context.
    ContextOverrun {
        /// the byte offset where the context should have ended
        end: u64,
    },
    /// The basic offset table of an encapsulated pixel sequence
    /// is not a multiple of 4 bytes long.
    MisalignedOffsetTable,
}

impl fmt::Display for DelimiterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterFault::NonZeroLength => f.write_str("delimiter with non-zero length"),
            DelimiterFault::IllegalUndefinedLength(vr) => {
                write!(f, "undefined length not admitted for {}", vr)
            }
            DelimiterFault::UnexpectedTag => f.write_str("unexpected tag"),
            DelimiterFault::ContextOverrun { end } => {
                write!(f, "read past the end of the enclosing context at {}", end)
            }
            DelimiterFault::MisalignedOffsetTable => {
                f.write_str("offset table length is not a multiple of 4")
            }
        }
    }
}

/// An error found while decoding a DICOM element stream.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub))]
pub enum FormatError {
    /// The `DICM` magic code was not found after the preamble,
    /// or the preamble was not zeroed in strict mode.
    #[snafu(display("Missing DICM magic code at offset {}: found {:02X?}", offset, found))]
    MissingMagic {
        offset: u64,
        found: [u8; 4],
        backtrace: Backtrace,
    },
    /// An element declared a value representation code
    /// which is not known.
    #[snafu(display(
        "Unknown value representation {:02X?} in element {} at offset {}",
        code,
        tag,
        offset
    ))]
    UnknownVr {
        offset: u64,
        tag: Tag,
        code: [u8; 2],
        backtrace: Backtrace,
    },
    /// The source ended before the expected number of bytes could be read.
    #[snafu(display(
        "Truncated stream at offset {}: needed {} bytes, only {} available",
        offset,
        needed,
        available
    ))]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
        backtrace: Backtrace,
    },
    /// A sequence, item or delimiter did not fit its enclosing structure.
    #[snafu(display("Malformed delimiter {} at offset {}: {}", tag, offset, fault))]
    MalformedDelimiter {
        offset: u64,
        tag: Tag,
        fault: DelimiterFault,
        backtrace: Backtrace,
    },
    /// Sequences were nested deeper than the configured bound.
    #[snafu(display(
        "Sequence nesting deeper than {} levels at offset {}",
        max,
        offset
    ))]
    NestingTooDeep {
        offset: u64,
        max: usize,
        backtrace: Backtrace,
    },
    /// The byte source failed for a reason other than reaching its end.
    #[snafu(display("Could not read from source at offset {}", offset))]
    ReadSource {
        offset: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

impl FormatError {
    /// The byte offset in the stream where the error was detected.
    pub fn offset(&self) -> u64 {
        match self {
            FormatError::MissingMagic { offset, .. }
            | FormatError::UnknownVr { offset, .. }
            | FormatError::Truncated { offset, .. }
            | FormatError::MalformedDelimiter { offset, .. }
            | FormatError::NestingTooDeep { offset, .. }
            | FormatError::ReadSource { offset, .. } => *offset,
        }
    }
}

pub type Result<T, E = FormatError> = std::result::Result<T, E>;
