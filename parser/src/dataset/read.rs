//! This module contains a mid-level abstraction for reading DICOM content
//! sequentially.
//!
//! The element stream decoder is used to obtain DICOM element headers and values.
//! At this level, headers and values are treated as tokens which can be used
//! to form a syntax tree of a full data set.
//! Nesting is resolved with an explicit stack of open sequences and items,
//! so the depth of the input never grows the call stack.
use crate::error::{
    DelimiterFault, MalformedDelimiterSnafu, NestingTooDeepSnafu, Result, TruncatedSnafu,
};
use crate::stateful::decode::StatefulDecode;
use dicom_stream_core::header::{DataElementHeader, Length, SequenceItemHeader, Tag, VR};
use snafu::ensure;
use std::cmp::Ordering;
use std::iter::Iterator;

use super::{DataToken, SeqTokenType};

/// The default bound on the number of nested sequences.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A reader-specific token representing a sequence or item start.
#[derive(Debug, Copy, Clone, PartialEq)]
struct SeqToken {
    /// Whether it is the start of a sequence or the start of an item.
    typ: SeqTokenType,
    /// The tag of the element which opened this context.
    tag: Tag,
    /// The length of the value, as indicated by the starting element,
    /// can be unknown.
    len: Length,
    /// The VR of the encapsulated pixel data element,
    /// if this token is part of one.
    pixel_data: Option<VR>,
    /// The number of bytes the parser has read until it reached the
    /// beginning of the sequence or item value data.
    base_offset: u64,
}

/// The set of options for the data set reader.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct DataSetReaderOptions {
    /// the maximum number of nested sequences admitted
    pub max_depth: usize,
}

impl Default for DataSetReaderOptions {
    fn default() -> Self {
        DataSetReaderOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DataSetReaderOptions {
    /// Replace the maximum sequence nesting depth of the options.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// A higher-level reader for retrieving structure in a DICOM data set from an
/// arbitrary data source.
///
/// The reader is fused after the first error.
#[derive(Debug)]
pub struct DataSetReader<S> {
    /// the stateful decoder
    parser: S,
    /// the options of this reader
    options: DataSetReaderOptions,
    /// whether the reader is expecting an item header next (or a sequence delimiter)
    in_sequence: bool,
    /// whether the reader is expecting the first item value of a pixel sequence next
    /// (offset table)
    offset_table_next: bool,
    /// whether a check for a sequence or item delimitation is pending
    delimiter_check_pending: bool,
    /// a stack of delimiters
    seq_delimiters: Vec<SeqToken>,
    /// fuse the iteration process if true
    hard_break: bool,
    /// last decoded header
    last_header: Option<DataElementHeader>,
}

impl<S> DataSetReader<S> {
    /// Create a new iterator with the given stateful decoder and options.
    pub fn new(decoder: S, options: DataSetReaderOptions) -> Self {
        DataSetReader {
            parser: decoder,
            options,
            seq_delimiters: Vec::new(),
            delimiter_check_pending: false,
            offset_table_next: false,
            in_sequence: false,
            hard_break: false,
            last_header: None,
        }
    }

    /// Unwrap the inner stateful decoder.
    pub fn into_inner(self) -> S {
        self.parser
    }
}

impl<S> DataSetReader<S>
where
    S: StatefulDecode,
{
    /// Retrieve the exact number of bytes read so far.
    pub fn position(&self) -> u64 {
        self.parser.position()
    }
}

impl<S> Iterator for DataSetReader<S>
where
    S: StatefulDecode,
{
    type Item = Result<DataToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hard_break {
            return None;
        }
        let out = self.next_token().transpose();
        if !matches!(out, Some(Ok(_))) {
            self.hard_break = true;
        }
        out
    }
}

impl<S> DataSetReader<S>
where
    S: StatefulDecode,
{
    fn next_token(&mut self) -> Result<Option<DataToken>> {
        // item or sequence delimitation logic for explicit lengths
        if self.delimiter_check_pending {
            if let Some(token) = self.update_seq_delimiters()? {
                return Ok(Some(token));
            }
        }

        if self.in_sequence {
            // at sequence level, expecting item header
            return self.read_item_header().map(Some);
        }

        if let Some(SeqToken {
            typ: SeqTokenType::Item,
            pixel_data: Some(_),
            len,
            ..
        }) = self.seq_delimiters.last()
        {
            // fragment lengths were checked to be defined on item start
            let len = len.0;
            // need to pop item delimiter on the next iteration
            self.delimiter_check_pending = true;

            if self.offset_table_next {
                self.offset_table_next = false;
                return self
                    .parser
                    .read_offset_table(len)
                    .map(|table| Some(DataToken::OffsetTable(table)));
            }
            return self
                .parser
                .read_value_bytes(len)
                .map(|value| Some(DataToken::ItemValue(value)));
        }

        if let Some(header) = self.last_header.take() {
            // a plain element header was read, so a value is expected
            let value = self.parser.read_value(&header)?;
            // sequences can end after this token
            self.delimiter_check_pending = true;
            return Ok(Some(DataToken::PrimitiveValue(value)));
        }

        // a data element header or item delimiter is expected
        let start = self.parser.position();
        let header = match self.parser.decode_header()? {
            Some(header) => header,
            None => return self.end_of_stream(start),
        };

        if header.tag.is_control() {
            return self.read_delimiter(header, start).map(Some);
        }

        if header.vr == VR::SQ || (header.vr == VR::UN && header.len.is_undefined()) {
            // undefined length UN elements are read as data set sequences
            self.check_depth(start)?;
            let DataElementHeader { tag, vr, len } = header;
            self.in_sequence = true;
            self.push_sequence_token(SeqTokenType::Sequence, tag, len, None);

            // sequences can end right after they start
            if len == Length(0) {
                self.delimiter_check_pending = true;
            }
            tracing::debug!("Entering sequence {} at {}", tag, start);
            return Ok(Some(DataToken::SequenceStart { tag, vr, len }));
        }

        if header.is_encapsulated() {
            // expect a basic offset table, then a sequence of fragments
            self.check_depth(start)?;
            self.in_sequence = true;
            self.offset_table_next = true;
            self.push_sequence_token(
                SeqTokenType::Sequence,
                header.tag,
                Length::UNDEFINED,
                Some(header.vr),
            );
            tracing::debug!("Entering pixel sequence {} at {}", header.tag, start);
            return Ok(Some(DataToken::PixelSequenceStart(header)));
        }

        // save it for the next step
        self.last_header = Some(header);
        Ok(Some(DataToken::ElementHeader(header)))
    }

    /// Read an item header at sequence level.
    fn read_item_header(&mut self) -> Result<DataToken> {
        let start = self.parser.position();
        let header = self.parser.decode_item_header()?;
        let Some(sequence) = self.seq_delimiters.last().copied() else {
            return MalformedDelimiterSnafu {
                offset: start,
                tag: Tag::ITEM,
                fault: DelimiterFault::UnexpectedTag,
            }
            .fail();
        };

        match header {
            SequenceItemHeader::Item { len } => {
                if let Some(vr) = sequence.pixel_data {
                    ensure!(
                        len.is_defined(),
                        MalformedDelimiterSnafu {
                            offset: start,
                            tag: Tag::ITEM,
                            fault: DelimiterFault::IllegalUndefinedLength(vr),
                        }
                    );
                } else {
                    tracing::debug!("Entering item at {}", start);
                    // items can be empty
                    if len == Length(0) {
                        self.delimiter_check_pending = true;
                    }
                }

                self.in_sequence = false;
                self.push_sequence_token(SeqTokenType::Item, Tag::ITEM, len, sequence.pixel_data);
                Ok(DataToken::ItemStart { len })
            }
            SequenceItemHeader::ItemDelimiter => MalformedDelimiterSnafu {
                offset: start,
                tag: Tag::ITEM_DELIMITER,
                fault: DelimiterFault::UnexpectedTag,
            }
            .fail(),
            SequenceItemHeader::SequenceDelimiter => {
                // only sequences of undefined length are closed by a delimiter
                ensure!(
                    sequence.len.is_undefined(),
                    MalformedDelimiterSnafu {
                        offset: start,
                        tag: Tag::SEQUENCE_DELIMITER,
                        fault: DelimiterFault::UnexpectedTag,
                    }
                );
                self.seq_delimiters.pop();
                self.in_sequence = false;
                self.offset_table_next = false;
                // items can end after a nested sequence ends
                self.delimiter_check_pending = true;
                tracing::debug!("Leaving sequence {} at {}", sequence.tag, start);
                Ok(DataToken::SequenceEnd)
            }
        }
    }

    /// Handle a control element found where a data element was expected.
    /// Only the delimiter of an open item of undefined length fits here.
    fn read_delimiter(&mut self, header: DataElementHeader, start: u64) -> Result<DataToken> {
        match self.seq_delimiters.last().copied() {
            Some(SeqToken {
                typ: SeqTokenType::Item,
                len,
                ..
            }) if header.tag == Tag::ITEM_DELIMITER && len.is_undefined() => {
                ensure!(
                    header.len.inner_eq(Length(0)),
                    MalformedDelimiterSnafu {
                        offset: start,
                        tag: header.tag,
                        fault: DelimiterFault::NonZeroLength,
                    }
                );
                self.in_sequence = true;
                // pop item delimiter
                self.seq_delimiters.pop();
                // sequences can end after this token
                self.delimiter_check_pending = true;
                tracing::debug!("Leaving item at {}", start);
                Ok(DataToken::ItemEnd)
            }
            _ => MalformedDelimiterSnafu {
                offset: start,
                tag: header.tag,
                fault: DelimiterFault::UnexpectedTag,
            }
            .fail(),
        }
    }

    /// The source ended at an element boundary.
    /// This is only a clean end if no sequence or item is still open.
    fn end_of_stream(&self, position: u64) -> Result<Option<DataToken>> {
        match self.seq_delimiters.last() {
            None => Ok(None),
            Some(open) => {
                let needed = open
                    .len
                    .get()
                    .map(|len| (open.base_offset + u64::from(len)).saturating_sub(position))
                    .unwrap_or(8);
                TruncatedSnafu {
                    offset: position,
                    needed,
                    available: 0_u64,
                }
                .fail()
            }
        }
    }

    fn check_depth(&self, start: u64) -> Result<()> {
        let depth = self
            .seq_delimiters
            .iter()
            .filter(|token| token.typ == SeqTokenType::Sequence)
            .count();
        ensure!(
            depth < self.options.max_depth,
            NestingTooDeepSnafu {
                offset: start,
                max: self.options.max_depth,
            }
        );
        Ok(())
    }

    fn update_seq_delimiters(&mut self) -> Result<Option<DataToken>> {
        if let Some(sd) = self.seq_delimiters.last().copied() {
            if let Some(len) = sd.len.get() {
                let end_of_sequence = sd.base_offset + u64::from(len);
                let bytes_read = self.parser.position();
                match end_of_sequence.cmp(&bytes_read) {
                    Ordering::Equal => {
                        // end of delimiter, as indicated by the element's length
                        let token = match sd.typ {
                            SeqTokenType::Sequence => {
                                self.in_sequence = false;
                                tracing::debug!("Leaving sequence {} at {}", sd.tag, bytes_read);
                                DataToken::SequenceEnd
                            }
                            SeqTokenType::Item => {
                                self.in_sequence = true;
                                if sd.pixel_data.is_none() {
                                    tracing::debug!("Leaving item at {}", bytes_read);
                                }
                                DataToken::ItemEnd
                            }
                        };
                        self.seq_delimiters.pop();
                        return Ok(Some(token));
                    }
                    Ordering::Less => {
                        return MalformedDelimiterSnafu {
                            offset: bytes_read,
                            tag: sd.tag,
                            fault: DelimiterFault::ContextOverrun {
                                end: end_of_sequence,
                            },
                        }
                        .fail();
                    }
                    Ordering::Greater => {} // continue normally
                }
            }
        }
        self.delimiter_check_pending = false;
        Ok(None)
    }

    #[inline]
    fn push_sequence_token(
        &mut self,
        typ: SeqTokenType,
        tag: Tag,
        len: Length,
        pixel_data: Option<VR>,
    ) {
        self.seq_delimiters.push(SeqToken {
            typ,
            tag,
            pixel_data,
            len,
            base_offset: self.parser.position(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSetReader, DataSetReaderOptions, DataToken, StatefulDecode};
    use crate::error::{DelimiterFault, FormatError};
    use crate::source::StreamSource;
    use crate::stateful::decode::StatefulDecoder;
    use dicom_stream_core::header::{DataElementHeader, Length};
    use dicom_stream_core::{Tag, VR};
    use smallvec::smallvec;

    fn reader(data: &[u8]) -> DataSetReader<StatefulDecoder<StreamSource<&[u8]>>> {
        reader_with(data, Default::default())
    }

    fn reader_with(
        data: &[u8],
        options: DataSetReaderOptions,
    ) -> DataSetReader<StatefulDecoder<StreamSource<&[u8]>>> {
        DataSetReader::new(StatefulDecoder::new(StreamSource::new(data)), options)
    }

    fn validate_dataset_reader<I>(data: &[u8], ground_truth: I)
    where
        I: IntoIterator<Item = DataToken>,
    {
        let mut dset_reader = reader(data);

        let iter = &mut dset_reader;
        let mut ground_truth = ground_truth.into_iter();

        while let Some(gt_token) = ground_truth.next() {
            let token = iter
                .next()
                .expect("expecting more tokens from reader")
                .expect("should fetch the next token without an error");
            eprintln!("Next token: {:2?} ; Expected: {:2?}", token, gt_token);
            assert_eq!(
                token, gt_token,
                "Got token {:2?} ; but expected {:2?}",
                token, gt_token
            );
        }

        let extra: Vec<_> = iter.collect();
        assert_eq!(
            extra.len(), // we have already read all of them
            0,
            "extraneous tokens remaining: {:?}",
            extra,
        );
        assert_eq!(
            dset_reader.parser.position(),
            data.len() as u64,
            "Decoder position did not match end of data",
        );
    }

    /// Collect tokens until the first error, which is returned.
    fn read_until_error(
        data: &[u8],
        options: DataSetReaderOptions,
    ) -> (Vec<DataToken>, FormatError) {
        let mut tokens = Vec::new();
        let mut reader = reader_with(data, options);
        while let Some(token) = reader.next() {
            match token {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    // fused after the error
                    assert!(reader.next().is_none());
                    return (tokens, e);
                }
            }
        }
        panic!("expected an error, got tokens {:?}", tokens);
    }

    #[test]
    fn read_sequence_explicit() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x18, 0x00, 0x11, 0x60, // sequence tag: (0018,6011) SequenceOfUltrasoundRegions
            b'S', b'Q', // VR
            0x00, 0x00, // reserved
            0x2e, 0x00, 0x00, 0x00, // length: 28 + 18 = 46 (#= 2)
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x14, 0x00, 0x00, 0x00, // item length: 20 (#= 2)
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00, // (0018, 6012) RegionSpatialformat, len = 2, value = 1
            // -- 30 --
            0x18, 0x00, 0x14, 0x60, b'U', b'S', 0x02, 0x00, 0x02, 0x00, // (0018, 6014) RegionDataType, len = 2, value = 2
            // -- 40 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x0a, 0x00, 0x00, 0x00, // item length: 10 (#= 1)
            // -- 48 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x04, 0x00, // (0018, 6012) RegionSpatialformat, len = 2, value = 4
            // -- 58 --
            0x20, 0x00, 0x00, 0x40, b'L', b'T', 0x04, 0x00, // (0020,4000) ImageComments, len = 4
            b'T', b'E', b'S', b'T', // value = "TEST"
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0018, 0x6011),
                vr: VR::SQ,
                len: Length(46),
            },
            DataToken::ItemStart { len: Length(20) },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x01, 0x00]),
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6014),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x02, 0x00]),
            DataToken::ItemEnd,
            DataToken::ItemStart { len: Length(10) },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x04, 0x00]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0020, 0x4000),
                vr: VR::LT,
                len: Length(4),
            }),
            DataToken::PrimitiveValue(b"TEST".to_vec()),
        ];

        validate_dataset_reader(DATA, ground_truth);
    }

    #[test]
    fn read_empty_sequence_explicit() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            // SequenceStart: (0008,2218) ; len = 0
            0x08, 0x00, 0x18, 0x22,
            b'S', b'Q', // VR
            0x00, 0x00, // reserved
            0x00, 0x00, 0x00, 0x00, // length: 0
            // ElementHeader: (2050,0020) PresentationLUTShape; len = 8
            0x50, 0x20, 0x20, 0x00, b'C', b'S', 0x08, 0x00,
            b'I', b'D', b'E', b'N', b'T', b'I', b'T', b'Y',
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0008, 0x2218),
                vr: VR::SQ,
                len: Length(0),
            },
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x2050, 0x0020),
                vr: VR::CS,
                len: Length(8),
            }),
            DataToken::PrimitiveValue(b"IDENTITY".to_vec()),
        ];

        validate_dataset_reader(DATA, ground_truth);
    }

    #[rustfmt::skip]
    static UNDEFINED_SEQUENCE: &[u8] = &[
        0x18, 0x00, 0x11, 0x60, // sequence tag: (0018,6011) SequenceOfUltrasoundRegions
        b'S', b'Q', // VR
        0x00, 0x00, // reserved
        0xff, 0xff, 0xff, 0xff, // length: undefined
        // -- 12 --
        0xfe, 0xff, 0x00, 0xe0, // item start tag
        0xff, 0xff, 0xff, 0xff, // item length: undefined
        // -- 20 --
        0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00, // (0018, 6012) RegionSpatialformat, len = 2, value = 1
        // -- 30 --
        0x18, 0x00, 0x14, 0x60, b'U', b'S', 0x02, 0x00, 0x02, 0x00, // (0018, 6014) RegionDataType, len = 2, value = 2
        // -- 40 --
        0xfe, 0xff, 0x0d, 0xe0, 0x00, 0x00, 0x00, 0x00, // item end
        // -- 48 --
        0xfe, 0xff, 0x00, 0xe0, // item start tag
        0xff, 0xff, 0xff, 0xff, // item length: undefined
        // -- 56 --
        0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x04, 0x00, // (0018, 6012) RegionSpatialformat, len = 2, value = 4
        // -- 66 --
        0xfe, 0xff, 0x0d, 0xe0, 0x00, 0x00, 0x00, 0x00, // item end
        // -- 74 --
        0xfe, 0xff, 0xdd, 0xe0, 0x00, 0x00, 0x00, 0x00, // sequence end
        // -- 82 --
        0x20, 0x00, 0x00, 0x40, b'L', b'T', 0x04, 0x00, // (0020,4000) ImageComments, len = 4
        b'T', b'E', b'S', b'T', // value = "TEST"
    ];

    #[test]
    fn read_sequence_undefined_length() {
        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x0018, 0x6011),
                vr: VR::SQ,
                len: Length::UNDEFINED,
            },
            DataToken::ItemStart {
                len: Length::UNDEFINED,
            },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x01, 0x00]),
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6014),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x02, 0x00]),
            DataToken::ItemEnd,
            DataToken::ItemStart {
                len: Length::UNDEFINED,
            },
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0018, 0x6012),
                vr: VR::US,
                len: Length(2),
            }),
            DataToken::PrimitiveValue(vec![0x04, 0x00]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader {
                tag: Tag(0x0020, 0x4000),
                vr: VR::LT,
                len: Length(4),
            }),
            DataToken::PrimitiveValue(b"TEST".to_vec()),
        ];

        validate_dataset_reader(UNDEFINED_SEQUENCE, ground_truth);
    }

    #[test]
    fn cursor_rests_after_sequence_delimiter() {
        let mut reader = reader(UNDEFINED_SEQUENCE);
        let tokens: Vec<_> = (&mut reader)
            .map(|token| token.unwrap())
            .take_while(|token| *token != DataToken::SequenceEnd)
            .collect();
        assert_eq!(
            tokens
                .iter()
                .filter(|token| matches!(token, DataToken::ItemStart { .. }))
                .count(),
            2
        );
        assert_eq!(reader.position(), 82);
    }

    #[test]
    fn read_undefined_length_unknown_as_sequence() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x33, 0x55, 0x33, 0x55, // (5533,5533) private, unknown attribute
            b'U', b'N', 0x00, 0x00, // VR, reserved
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item begin
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 20 --
            0xfe, 0xff, 0x0d, 0xe0, // item end
            0x00, 0x00, 0x00, 0x00, // length is always zero
            // -- 28 --
            0xfe, 0xff, 0xdd, 0xe0,
            0x00, 0x00, 0x00, 0x00, // sequence end
            // -- 36 --
        ];

        let ground_truth = vec![
            DataToken::SequenceStart {
                tag: Tag(0x5533, 0x5533),
                vr: VR::UN,
                len: Length::UNDEFINED,
            },
            DataToken::ItemStart {
                len: Length::UNDEFINED,
            },
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
        ];

        validate_dataset_reader(DATA, ground_truth);
    }

    #[test]
    fn read_encapsulated_pixeldata() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0xe0, 0x7f, 0x10, 0x00, // (7FE0, 0010) PixelData
            b'O', b'B', // VR
            0x00, 0x00, // reserved
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 -- Basic offset table
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x00, 0x00, 0x00, 0x00, // item length: 0
            // -- 20 -- First fragment of pixel data
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x20, 0x00, 0x00, 0x00, // item length: 32
            // -- 28 -- Compressed Fragment
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            // -- 60 -- End of pixel data
            0xfe, 0xff, 0xdd, 0xe0, // sequence end tag
            0x00, 0x00, 0x00, 0x00,
            // -- 68 -- padding
            0xfc, 0xff, 0xfc, 0xff, // (fffc,fffc) DataSetTrailingPadding
            b'O', b'B', // VR
            0x00, 0x00, // reserved
            0x08, 0x00, 0x00, 0x00, // length: 8
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let ground_truth = vec![
            DataToken::PixelSequenceStart(DataElementHeader::new(
                Tag::PIXEL_DATA,
                VR::OB,
                Length::UNDEFINED,
            )),
            DataToken::ItemStart { len: Length(0) },
            DataToken::OffsetTable(smallvec![]),
            DataToken::ItemEnd,
            DataToken::ItemStart { len: Length(32) },
            DataToken::ItemValue(vec![0x99; 32]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
            DataToken::ElementHeader(DataElementHeader::new(
                Tag(0xfffc, 0xfffc),
                VR::OB,
                Length(8),
            )),
            DataToken::PrimitiveValue(vec![0x00; 8]),
        ];

        validate_dataset_reader(DATA, ground_truth);
    }

    #[test]
    fn read_encapsulated_pixeldata_with_offset_table() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0xe0, 0x7f, 0x10, 0x00, // (7FE0, 0010) PixelData
            b'O', b'B', // VR
            0x00, 0x00, // reserved
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 -- Basic offset table
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x04, 0x00, 0x00, 0x00, // item length: 4
            // -- 20 -- item value
            0x10, 0x00, 0x00, 0x00, // 16
            // -- 24 -- First fragment of pixel data
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x20, 0x00, 0x00, 0x00, // item length: 32
            // -- 32 -- Compressed Fragment
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0x99,
            // -- 64 -- End of pixel data
            0xfe, 0xff, 0xdd, 0xe0, // sequence end tag
            0x00, 0x00, 0x00, 0x00,
        ];

        let ground_truth = vec![
            DataToken::PixelSequenceStart(DataElementHeader::new(
                Tag::PIXEL_DATA,
                VR::OB,
                Length::UNDEFINED,
            )),
            DataToken::ItemStart { len: Length(4) },
            DataToken::OffsetTable(smallvec![16]),
            DataToken::ItemEnd,
            DataToken::ItemStart { len: Length(32) },
            DataToken::ItemValue(vec![0x99; 32]),
            DataToken::ItemEnd,
            DataToken::SequenceEnd,
        ];

        validate_dataset_reader(DATA, ground_truth);
    }

    #[test]
    fn stray_item_delimiter_is_rejected() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x20, 0x00, 0x00, 0x40, b'L', b'T', 0x04, 0x00, // (0020,4000) ImageComments, len = 4
            b'T', b'E', b'S', b'T', // value = "TEST"
            0xfe, 0xff, 0x0d, 0xe0, 0x00, 0x00, 0x00, 0x00, // item end
        ];

        let (tokens, err) = read_until_error(DATA, Default::default());
        assert_eq!(tokens.len(), 2);
        assert!(
            matches!(
                err,
                FormatError::MalformedDelimiter {
                    offset: 12,
                    fault: DelimiterFault::UnexpectedTag,
                    ..
                }
            ),
            "got {:?}",
            err
        );
    }

    #[test]
    fn item_delimiter_with_length_is_rejected() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, // (0008,1115) SQ
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff, // item, undefined length
            // -- 20 --
            0xfe, 0xff, 0x0d, 0xe0, 0x02, 0x00, 0x00, 0x00, // item end, len = 2
            0x00, 0x00,
        ];

        let (_, err) = read_until_error(DATA, Default::default());
        assert!(matches!(
            err,
            FormatError::MalformedDelimiter {
                offset: 20,
                fault: DelimiterFault::NonZeroLength,
                ..
            }
        ));
    }

    #[test]
    fn non_item_tag_in_sequence_is_rejected() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, // (0008,1115) SQ
            0xff, 0xff, 0xff, 0xff, // length: undefined
            // -- 12 --
            0x08, 0x00, 0x50, 0x11, b'U', b'I', 0x02, 0x00, b'1', 0x00,
        ];

        let (_, err) = read_until_error(DATA, Default::default());
        assert!(matches!(
            err,
            FormatError::MalformedDelimiter {
                offset: 12,
                tag: Tag(0x0008, 0x1150),
                fault: DelimiterFault::UnexpectedTag,
                ..
            }
        ));
    }

    #[test]
    fn defined_length_item_overrun() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x18, 0x00, 0x11, 0x60, b'S', b'Q', 0x00, 0x00, // (0018,6011) SQ
            0x12, 0x00, 0x00, 0x00, // length: 18
            // -- 12 --
            0xfe, 0xff, 0x00, 0xe0, // item start tag
            0x08, 0x00, 0x00, 0x00, // item length: 8, but holds 10 bytes
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00,
            // -- 30 --
        ];

        let (tokens, err) = read_until_error(DATA, Default::default());
        assert_eq!(tokens.len(), 4);
        assert!(
            matches!(
                err,
                FormatError::MalformedDelimiter {
                    offset: 30,
                    fault: DelimiterFault::ContextOverrun { end: 28 },
                    ..
                }
            ),
            "got {:?}",
            err
        );
    }

    #[test]
    fn nesting_depth_is_bounded() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, // SQ
            0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff, // item
            // -- 20 --
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, // SQ
            0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff, // item
            // -- 40 --
            0x08, 0x00, 0x99, 0x11, b'S', b'Q', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, // SQ
        ];

        let options = DataSetReaderOptions::default().max_depth(2);
        let (tokens, err) = read_until_error(DATA, options);
        assert_eq!(tokens.len(), 4);
        assert!(matches!(
            err,
            FormatError::NestingTooDeep {
                offset: 40,
                max: 2,
                ..
            }
        ));
    }

    #[test]
    fn end_of_stream_inside_sequence() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, // SQ
            0xfe, 0xff, 0x00, 0xe0, 0xff, 0xff, 0xff, 0xff, // item
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00,
            // -- 30 -- no delimiters
        ];

        let (tokens, err) = read_until_error(DATA, Default::default());
        assert_eq!(tokens.len(), 4);
        assert!(matches!(
            err,
            FormatError::Truncated {
                offset: 30,
                needed: 8,
                available: 0,
                ..
            }
        ));
    }

    #[test]
    fn sequence_delimiter_in_defined_length_sequence() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x08, 0x00, 0x15, 0x11, b'S', b'Q', 0x00, 0x00, // SQ
            0x08, 0x00, 0x00, 0x00, // length: 8
            0xfe, 0xff, 0xdd, 0xe0, 0x00, 0x00, 0x00, 0x00, // sequence end
        ];

        let (_, err) = read_until_error(DATA, Default::default());
        assert!(matches!(
            err,
            FormatError::MalformedDelimiter {
                offset: 12,
                fault: DelimiterFault::UnexpectedTag,
                ..
            }
        ));
    }
}
