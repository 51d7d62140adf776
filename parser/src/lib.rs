#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! This crate walks a DICOM element stream in Explicit VR Little Endian,
//! at two layers of abstraction.
//!
//! - The [`stateful`] module contains the element stream decoder,
//!   which reads one element header or one value at a time
//!   while keeping track of the exact number of bytes consumed.
//! - The [`dataset`] module contains a token reader
//!   that resolves sequences, items and undefined lengths
//!   into a flat stream of [`DataToken`](dataset::DataToken)s.
//!
//! Both layers pull bytes from a [`ByteSource`](source::ByteSource),
//! and report every structural problem as a [`FormatError`](error::FormatError)
//! pointing at the byte offset where it was found.
//! The decoder never tries to resynchronize after an error.

pub mod dataset;
pub mod error;
pub mod source;
pub mod stateful;

pub use dataset::{DataSetReader, DataSetReaderOptions, DataToken};
pub use error::{DelimiterFault, FormatError};
pub use source::{ByteSource, StreamSource};
pub use stateful::decode::{StatefulDecode, StatefulDecoder};
