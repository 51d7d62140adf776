//! Prelude module.
//!
//! You may import all symbols within for convenient usage of this library.
//!
//! # Example
//!
//! ```ignore
//! use dicom_stream_core::prelude::*;
//! ```

pub use crate::header::{HasLength as _, Header as _};
pub use crate::{DataElement, DicomValue, Length, Tag, VR};
