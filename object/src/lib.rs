#![allow(clippy::derive_partial_eq_without_eq)]
//! This crate assembles DICOM Part 10 element streams
//! into in-memory data sets.
//!
//! Loading a DICOM file can be done with the function [`open_file`].
//! For additional reading options, use [`OpenFileOptions`].
//! Streams which are already positioned at the first element
//! can be decoded with [`decode`] or [`decode_with_options`].
//!
//! # Examples
//!
//! ```no_run
//! use dicom_stream_object::open_file;
//! use dicom_stream_core::Tag;
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = open_file("0001.dcm")?;
//!
//! let patient_name = dataset.element(Tag(0x0010, 0x0010)).and_then(|e| e.to_bytes());
//! println!("{} elements at the root", dataset.len());
//! # Ok(())
//! # }
//! ```
//!
//! Either the whole data set is returned, or the first error found.
//! A partially decoded data set is never exposed.

pub mod file;
pub mod mem;

pub use crate::file::{from_reader, open_file, read_preamble, OpenFileOptions, ReadPreamble};
pub use crate::mem::{InMemDataSet, InMemElement};
pub use dicom_stream_core::{DataElement, DicomValue, Length, Tag, VR};
pub use dicom_stream_parser::{DataSetReaderOptions, FormatError};

use dicom_stream_parser::dataset::DataToken;
use dicom_stream_parser::source::ByteSource;
use snafu::{Backtrace, Snafu};

/// An error which may occur when reading a DICOM data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not decode element stream"))]
    Format {
        #[snafu(backtrace)]
        source: FormatError,
    },
    #[snafu(display("Unexpected token {}", token))]
    UnexpectedToken {
        token: Box<DataToken>,
        backtrace: Backtrace,
    },
    #[snafu(display("Premature data set end"))]
    PrematureEnd { backtrace: Backtrace },
}

impl Error {
    /// The byte offset of the stream error behind this error, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::Format { source } => Some(source.offset()),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Decode a whole data set from a byte source
/// positioned at the first element.
pub fn decode<S>(source: S) -> Result<InMemDataSet>
where
    S: ByteSource,
{
    InMemDataSet::decode(source)
}

/// Decode a whole data set from a byte source
/// positioned at the first element, with the given reader options.
pub fn decode_with_options<S>(source: S, options: DataSetReaderOptions) -> Result<InMemDataSet>
where
    S: ByteSource,
{
    InMemDataSet::decode_with_options(source, options)
}
