//! This module includes the representation of a DICOM data element's value.
//!
//! Values are never interpreted:
//! primitive values are kept as the exact payload bytes read from the stream,
//! while sequences and encapsulated pixel data
//! keep their structure as nested items and fragments.

use crate::header::{HasLength, Length};
use smallvec::SmallVec;

/// An aggregation of one or more elements in a value.
pub type C<T> = SmallVec<[T; 2]>;

/// Type alias for the in-memory pixel data fragment data.
pub type InMemFragment = Vec<u8>;

/// Representation of a full DICOM value, which may be either primitive or
/// another DICOM object.
///
/// `I` is the complex type for nested data set items, which should usually
/// implement [`HasLength`].
/// `P` is the encapsulated pixel data provider,
/// which should usually implement `AsRef<[u8]>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<I, P = InMemFragment> {
    /// Primitive value, as the opaque bytes of its payload.
    Primitive(Vec<u8>),
    /// A complex sequence of items.
    Sequence(DataSetSequence<I>),
    /// A sequence of encapsulated pixel data fragments.
    PixelSequence(PixelFragmentSequence<P>),
}

impl<I, P> Value<I, P> {
    /// Retrieve the primitive payload bytes,
    /// or `None` if the value is not primitive.
    pub fn primitive(&self) -> Option<&[u8]> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Retrieve the items of a data set sequence,
    /// or `None` if the value is not a sequence.
    pub fn items(&self) -> Option<&[I]> {
        match self {
            Value::Sequence(s) => Some(s.items()),
            _ => None,
        }
    }

    /// Retrieve the encapsulated pixel data fragment sequence,
    /// or `None` if the value is not a pixel sequence.
    pub fn fragments(&self) -> Option<&PixelFragmentSequence<P>> {
        match self {
            Value::PixelSequence(s) => Some(s),
            _ => None,
        }
    }
}

impl<I, P> HasLength for Value<I, P> {
    fn length(&self) -> Length {
        match self {
            Value::Primitive(v) => Length(v.len() as u32),
            Value::Sequence(s) => s.length(),
            Value::PixelSequence(s) => s.length(),
        }
    }
}

impl<I, P> From<Vec<u8>> for Value<I, P> {
    fn from(v: Vec<u8>) -> Self {
        Value::Primitive(v)
    }
}

/// A sequence of complex data set items of type `I`.
#[derive(Debug, Clone)]
pub struct DataSetSequence<I> {
    /// The item sequence.
    items: C<I>,
    /// The sequence length in bytes, as declared in the stream.
    ///
    /// The value may be [`UNDEFINED`](Length::UNDEFINED)
    /// if the sequence was closed by a delimiter.
    length: Length,
}

impl<I> DataSetSequence<I> {
    /// Construct a DICOM data sequence
    /// using a sequence of items and a length.
    ///
    /// **Note:** This function does not validate the `length`
    /// against the items.
    #[inline]
    pub fn new(items: impl Into<C<I>>, length: Length) -> Self {
        DataSetSequence {
            items: items.into(),
            length,
        }
    }

    /// Gets a reference to the items of a sequence.
    #[inline]
    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Get the value data's length
    /// as specified by the sequence's data element,
    /// in bytes.
    #[inline]
    pub fn length(&self) -> Length {
        self.length
    }
}

impl<I> HasLength for DataSetSequence<I> {
    #[inline]
    fn length(&self) -> Length {
        self.length
    }
}

impl<I, P> From<DataSetSequence<I>> for Value<I, P> {
    #[inline]
    fn from(value: DataSetSequence<I>) -> Self {
        Value::Sequence(value)
    }
}

impl<I> PartialEq<DataSetSequence<I>> for DataSetSequence<I>
where
    I: PartialEq,
{
    /// Two sequences are equal if their items are equal
    /// and their declared lengths are equally specified.
    #[inline]
    fn eq(&self, other: &DataSetSequence<I>) -> bool {
        self.length.inner_eq(other.length) && self.items() == other.items()
    }
}

/// A sequence of pixel data fragments.
///
/// Each fragment (of data type `P`) is
/// a sequence of bytes representing the encoded pixel data.
/// The first item of the encapsulated sequence is interpreted
/// as a basic offset table, which is kept separately.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFragmentSequence<P> {
    /// The value contents of the basic offset table.
    offset_table: C<u32>,
    /// The sequence of pixel data fragments.
    fragments: C<P>,
}

impl<P> PixelFragmentSequence<P> {
    /// Construct a DICOM pixel sequence sequence value
    /// from a basic offset table and a list of fragments.
    #[inline]
    pub fn new(offset_table: impl Into<C<u32>>, fragments: impl Into<C<P>>) -> Self {
        PixelFragmentSequence {
            offset_table: offset_table.into(),
            fragments: fragments.into(),
        }
    }

    /// Gets a reference to the pixel data fragments.
    ///
    /// This sequence does not include the offset table.
    #[inline]
    pub fn fragments(&self) -> &[P] {
        &self.fragments
    }

    /// Gets a reference to the encapsulated pixel data's offset table.
    #[inline]
    pub fn offset_table(&self) -> &[u32] {
        &self.offset_table
    }

    /// Get the value data's length, which is always undefined.
    #[inline]
    pub fn length(&self) -> Length {
        Length::UNDEFINED
    }
}

impl<I, P> From<PixelFragmentSequence<P>> for Value<I, P> {
    #[inline]
    fn from(value: PixelFragmentSequence<P>) -> Self {
        Value::PixelSequence(value)
    }
}

impl<P> HasLength for PixelFragmentSequence<P> {
    /// Encapsulated pixel data is always defined by
    /// a pixel data element with an undefined length.
    #[inline]
    fn length(&self) -> Length {
        Length::UNDEFINED
    }
}
