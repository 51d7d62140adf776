//! This module contains the implementation for an in-memory DICOM data set.
//!
//! An [`InMemDataSet`] keeps its elements in stream order,
//! along with an index from each tag to the first element carrying it.
//! Nested items of sequences are data sets themselves.
//!
//! Data sets are assembled from the tokens of a
//! [`DataSetReader`](dicom_stream_parser::DataSetReader)
//! using an explicit stack of open sequences and items.
use crate::{FormatSnafu, PrematureEndSnafu, Result, UnexpectedTokenSnafu};
use dicom_stream_core::header::{DataElementHeader, HasLength, Length, Tag};
use dicom_stream_core::value::{DataSetSequence, InMemFragment, PixelFragmentSequence, C};
use dicom_stream_core::DataElement;
use dicom_stream_parser::dataset::DataToken;
use dicom_stream_parser::source::ByteSource;
use dicom_stream_parser::{DataSetReader, DataSetReaderOptions, FormatError, StatefulDecoder};
use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

/// A full in-memory DICOM data element.
pub type InMemElement = DataElement<InMemDataSet, InMemFragment>;

/// A DICOM data set that is fully contained in memory.
///
/// Two data sets are equal if they hold equal elements in the same order,
/// and their declared lengths are equally specified.
#[derive(Debug, Clone)]
pub struct InMemDataSet {
    /// the element list, in stream order
    entries: Vec<InMemElement>,
    /// the position of the first element with each tag
    index: BTreeMap<Tag, usize>,
    /// the length of the data set as declared in the stream,
    /// usually undefined
    len: Length,
}

impl PartialEq for InMemDataSet {
    // the index is derived from the entries
    fn eq(&self, other: &Self) -> bool {
        self.len.inner_eq(other.len) && self.entries == other.entries
    }
}

impl HasLength for InMemDataSet {
    fn length(&self) -> Length {
        self.len
    }
}

impl Default for InMemDataSet {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl InMemDataSet {
    /// Create a new empty data set with an undefined length.
    pub fn new_empty() -> Self {
        Self::new_empty_with_len(Length::UNDEFINED)
    }

    fn new_empty_with_len(len: Length) -> Self {
        InMemDataSet {
            entries: Vec::new(),
            index: BTreeMap::new(),
            len,
        }
    }

    /// Decode a whole data set from a byte source
    /// positioned at the first element.
    pub fn decode<S>(source: S) -> Result<Self>
    where
        S: ByteSource,
    {
        Self::decode_with_options(source, Default::default())
    }

    /// Decode a whole data set from a byte source
    /// positioned at the first element, with the given reader options.
    pub fn decode_with_options<S>(source: S, options: DataSetReaderOptions) -> Result<Self>
    where
        S: ByteSource,
    {
        let reader = DataSetReader::new(StatefulDecoder::new(source), options);
        Self::read_dataset(reader)
    }

    /// Build a data set by consuming a data set token reader to exhaustion.
    ///
    /// Returns the first error found, if any.
    pub fn read_dataset<I>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = std::result::Result<DataToken, FormatError>>,
    {
        let mut assembler = Assembler::default();
        for token in tokens {
            assembler.push(token.context(FormatSnafu)?)?;
        }
        let dataset = assembler.finish()?;
        tracing::debug!("Assembled data set with {} root elements", dataset.len());
        Ok(dataset)
    }

    /// Retrieve the first element with the given tag, if present.
    pub fn element(&self, tag: Tag) -> Option<&InMemElement> {
        self.index.get(&tag).map(|&i| &self.entries[i])
    }

    /// Retrieve all elements in stream order.
    pub fn elements(&self) -> &[InMemElement] {
        &self.entries
    }

    /// Iterate over the elements in stream order.
    pub fn iter(&self) -> std::slice::Iter<'_, InMemElement> {
        self.entries.iter()
    }

    /// The number of elements at this level of the data set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the data set has no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The data set length, as declared in the stream.
    pub fn length(&self) -> Length {
        self.len
    }

    /// Move the elements out of the data set, in stream order.
    pub fn into_elements(self) -> Vec<InMemElement> {
        self.entries
    }

    fn push(&mut self, elem: InMemElement) {
        let position = self.entries.len();
        self.index.entry(elem.header().tag).or_insert(position);
        self.entries.push(elem);
    }
}

impl<'a> IntoIterator for &'a InMemDataSet {
    type Item = &'a InMemElement;
    type IntoIter = std::slice::Iter<'a, InMemElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for InMemDataSet {
    type Item = InMemElement;
    type IntoIter = std::vec::IntoIter<InMemElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A sequence, item or pixel sequence under construction.
#[derive(Debug)]
enum Frame {
    Sequence {
        header: DataElementHeader,
        items: C<InMemDataSet>,
    },
    Item(InMemDataSet),
    PixelSequence {
        header: DataElementHeader,
        offset_table: Option<C<u32>>,
        fragments: C<InMemFragment>,
    },
}

/// Builds a data set from a stream of tokens.
#[derive(Debug, Default)]
struct Assembler {
    root: InMemDataSet,
    stack: Vec<Frame>,
    /// header waiting for its value
    pending: Option<DataElementHeader>,
}

impl Assembler {
    /// Whether the innermost context holds elements
    /// rather than items.
    fn accepts_elements(&self) -> bool {
        matches!(self.stack.last(), None | Some(Frame::Item(_)))
    }

    /// The data set currently receiving elements,
    /// or `None` if a sequence is expecting items instead.
    fn target(&mut self) -> Option<&mut InMemDataSet> {
        match self.stack.last_mut() {
            None => Some(&mut self.root),
            Some(Frame::Item(dataset)) => Some(dataset),
            Some(_) => None,
        }
    }

    fn push(&mut self, token: DataToken) -> Result<()> {
        if self.pending.is_some() && !matches!(token, DataToken::PrimitiveValue(_)) {
            return UnexpectedTokenSnafu { token }.fail();
        }

        match token {
            DataToken::ElementHeader(header) if self.accepts_elements() => {
                self.pending = Some(header);
            }
            DataToken::PrimitiveValue(value) => {
                let header = match self.pending.take() {
                    Some(header) => header,
                    None => {
                        return UnexpectedTokenSnafu {
                            token: DataToken::PrimitiveValue(value),
                        }
                        .fail()
                    }
                };
                self.append(DataElement::new(header, value))?;
            }
            DataToken::SequenceStart { tag, vr, len } if self.accepts_elements() => {
                self.stack.push(Frame::Sequence {
                    header: DataElementHeader::new(tag, vr, len),
                    items: SmallVec::new(),
                });
            }
            DataToken::PixelSequenceStart(header) if self.accepts_elements() => {
                self.stack.push(Frame::PixelSequence {
                    header,
                    offset_table: None,
                    fragments: SmallVec::new(),
                });
            }
            DataToken::ItemStart { len } => match self.stack.last() {
                Some(Frame::Sequence { .. }) => {
                    self.stack
                        .push(Frame::Item(InMemDataSet::new_empty_with_len(len)));
                }
                // fragment items carry no structure of their own
                Some(Frame::PixelSequence { .. }) => {}
                _ => return UnexpectedTokenSnafu { token }.fail(),
            },
            DataToken::ItemEnd => match self.stack.pop() {
                Some(Frame::Item(item)) => match self.stack.last_mut() {
                    Some(Frame::Sequence { items, .. }) => items.push(item),
                    _ => return UnexpectedTokenSnafu { token }.fail(),
                },
                Some(Frame::PixelSequence {
                    header,
                    offset_table,
                    fragments,
                }) => {
                    // the first item is the offset table, even if empty
                    self.stack.push(Frame::PixelSequence {
                        header,
                        offset_table: Some(offset_table.unwrap_or_default()),
                        fragments,
                    });
                }
                _ => return UnexpectedTokenSnafu { token }.fail(),
            },
            DataToken::OffsetTable(table) => match self.stack.last_mut() {
                Some(Frame::PixelSequence { offset_table, .. }) if offset_table.is_none() => {
                    *offset_table = Some(table);
                }
                _ => {
                    return UnexpectedTokenSnafu {
                        token: DataToken::OffsetTable(table),
                    }
                    .fail()
                }
            },
            DataToken::ItemValue(value) => match self.stack.last_mut() {
                Some(Frame::PixelSequence { fragments, .. }) => fragments.push(value),
                _ => {
                    return UnexpectedTokenSnafu {
                        token: DataToken::ItemValue(value),
                    }
                    .fail()
                }
            },
            DataToken::SequenceEnd => {
                let elem = match self.stack.pop() {
                    Some(Frame::Sequence { header, items }) => {
                        DataElement::new(header, DataSetSequence::new(items, header.len))
                    }
                    Some(Frame::PixelSequence {
                        header,
                        offset_table,
                        fragments,
                    }) => DataElement::new(
                        header,
                        PixelFragmentSequence::new(offset_table.unwrap_or_default(), fragments),
                    ),
                    _ => return UnexpectedTokenSnafu { token }.fail(),
                };
                self.append(elem)?;
            }
            token => return UnexpectedTokenSnafu { token }.fail(),
        }
        Ok(())
    }

    fn append(&mut self, elem: InMemElement) -> Result<()> {
        let target = self.target().context(PrematureEndSnafu)?;
        target.push(elem);
        Ok(())
    }

    fn finish(self) -> Result<InMemDataSet> {
        if !self.stack.is_empty() || self.pending.is_some() {
            return PrematureEndSnafu.fail();
        }
        Ok(self.root)
    }
}
