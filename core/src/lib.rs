#![crate_type = "lib"]
#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    unused_qualifications,
    unused_import_braces
)]

//! This is the core library of dicom-stream, containing the concepts
//! and data structures shared by the element stream decoder
//! and the in-memory data set.
//!
//! The current structure of this crate is as follows:
//!
//! - [`header`] comprises the DICOM attribute tag,
//!   the value representation, the value length
//!   and the element header types.
//! - [`policy`] holds the value representation length-policy table,
//!   which decides how each element's length field is encoded.
//! - [`value`] holds definitions for element values:
//!   opaque primitive bytes, item sequences and pixel fragment sequences.
//!
//! [`header`]: ./header/index.html
//! [`policy`]: ./policy/index.html
//! [`value`]: ./value/index.html

pub mod header;
pub mod policy;
pub mod prelude;
pub mod value;

pub use header::{DataElement, DataElementHeader, Length, Tag, VR};
pub use policy::{LengthForm, LengthPolicy};
pub use value::Value as DicomValue;

// re-export crates that are part of the public API
pub use smallvec;
