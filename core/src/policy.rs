//! The value representation length-policy table.
//!
//! In explicit VR little endian, the value representation of an element
//! decides the width of its length field,
//! and whether it may declare an undefined length.
//! This module keeps that decision in one static table,
//! which the decoder queries once per element header.

use crate::header::VR;

/// The encoding form of an element's length field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LengthForm {
    /// A 2-byte length directly after the VR.
    Short,
    /// 2 reserved bytes after the VR, then a 4-byte length.
    Long,
}

impl LengthForm {
    /// The number of bytes between the VR and the value,
    /// reserved bytes included.
    #[inline]
    pub const fn field_size(self) -> u32 {
        match self {
            LengthForm::Short => 2,
            LengthForm::Long => 6,
        }
    }

    /// The full header size of an element encoded in this form:
    /// tag, VR and length field.
    #[inline]
    pub const fn header_size(self) -> u32 {
        4 + 2 + self.field_size()
    }
}

/// How the length of an element with a given VR is encoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LengthPolicy {
    /// the length field form
    pub form: LengthForm,
    /// whether the undefined length sentinel is admitted
    pub allows_undefined: bool,
}

impl LengthPolicy {
    const SHORT: LengthPolicy = LengthPolicy {
        form: LengthForm::Short,
        allows_undefined: false,
    };
    const LONG: LengthPolicy = LengthPolicy {
        form: LengthForm::Long,
        allows_undefined: false,
    };
    const LONG_UNDEFINED: LengthPolicy = LengthPolicy {
        form: LengthForm::Long,
        allows_undefined: true,
    };
}

impl VR {
    /// Retrieve the length policy of this value representation.
    pub const fn length_policy(self) -> LengthPolicy {
        use VR::*;
        match self {
            AE | AS | AT | CS | DA | DS | DT | FL | FD | IS | LO | LT | PN | SH | SL | SS | ST
            | TM | UI | UL | US => LengthPolicy::SHORT,
            OD | OF | OL | OV | SV | UC | UR | UT | UV => LengthPolicy::LONG,
            OB | OW | SQ | UN => LengthPolicy::LONG_UNDEFINED,
        }
    }
}

/// Look up a value representation by its two byte code,
/// along with its length policy.
///
/// Returns `None` if the code is not a known value representation.
///
/// ```
/// # use dicom_stream_core::policy::{lookup_vr, LengthForm};
/// # use dicom_stream_core::VR;
/// let (vr, policy) = lookup_vr(*b"OB").unwrap();
/// assert_eq!(vr, VR::OB);
/// assert_eq!(policy.form, LengthForm::Long);
/// assert!(policy.allows_undefined);
/// assert!(lookup_vr(*b"XX").is_none());
/// ```
#[inline]
pub fn lookup_vr(code: [u8; 2]) -> Option<(VR, LengthPolicy)> {
    VR::from_binary(code).map(|vr| (vr, vr.length_policy()))
}
