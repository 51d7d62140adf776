//! This module provides the element stream decoder,
//! which translates a byte source into element headers and value payloads,
//! one at a time.
//!
//! The decoder knows nothing about nesting:
//! it only honors the length encoding rules of each header,
//! leaving sequence and item resolution to the
//! [`DataSetReader`](crate::dataset::DataSetReader).

use crate::error::{
    DelimiterFault, MalformedDelimiterSnafu, ReadSourceSnafu, Result, TruncatedSnafu,
    UnknownVrSnafu,
};
use crate::source::ByteSource;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicom_stream_core::header::{
    DataElementHeader, Length, SequenceItemHeader, SequenceItemHeaderError, Tag, VR,
};
use dicom_stream_core::policy::{lookup_vr, LengthForm};
use dicom_stream_core::value::C;
use snafu::{ensure, OptionExt, ResultExt};

/// The maximum number of bytes requested from the source at once
/// when reading a value payload.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Interface for a decoder of element headers and values
/// bound to a byte source.
pub trait StatefulDecode {
    /// Decode the next element header.
    ///
    /// Returns `Ok(None)` if the source ended cleanly
    /// before the first byte of a new element.
    /// Elements in the item group `(FFFE,xxxx)` have no VR,
    /// and are returned with `VR::UN` and their 4-byte length.
    fn decode_header(&mut self) -> Result<Option<DataElementHeader>>;

    /// Decode the header of an item, item delimiter or sequence delimiter.
    fn decode_item_header(&mut self) -> Result<SequenceItemHeader>;

    /// Eagerly read the value of a primitive element as raw bytes.
    ///
    /// # Errors
    ///
    /// Fails with `Truncated` if the source holds fewer bytes than declared,
    /// in which case nothing is returned.
    /// The header must have a defined length.
    fn read_value(&mut self, header: &DataElementHeader) -> Result<Vec<u8>>;

    /// Eagerly read the given number of bytes, such as a pixel fragment.
    fn read_value_bytes(&mut self, len: u32) -> Result<Vec<u8>>;

    /// Read the value of a basic offset table item,
    /// as a sequence of 32-bit little endian offsets.
    fn read_offset_table(&mut self, len: u32) -> Result<C<u32>>;

    /// Retrieve the exact number of bytes read so far by the stateful decoder.
    fn position(&self) -> u64;
}

/// A stateful decoder of Explicit VR Little Endian element streams.
#[derive(Debug)]
pub struct StatefulDecoder<S> {
    source: S,
}

impl<S> StatefulDecoder<S> {
    /// Create a new decoder over the given byte source.
    pub fn new(source: S) -> Self {
        StatefulDecoder { source }
    }

    /// Unwrap the byte source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S> StatefulDecoder<S>
where
    S: ByteSource,
{
    /// Fill the whole buffer, or fail with `Truncated`
    /// pointing at the first byte requested.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.source.position();
        let n = self
            .source
            .read_up_to(buf)
            .context(ReadSourceSnafu { offset })?;
        ensure!(
            n == buf.len(),
            TruncatedSnafu {
                offset,
                needed: buf.len() as u64,
                available: n as u64,
            }
        );
        Ok(())
    }
}

impl<S> StatefulDecode for StatefulDecoder<S>
where
    S: ByteSource,
{
    fn decode_header(&mut self) -> Result<Option<DataElementHeader>> {
        let start = self.source.position();
        let mut buf = [0u8; 4];
        let n = self
            .source
            .read_up_to(&mut buf)
            .context(ReadSourceSnafu { offset: start })?;
        if n == 0 {
            return Ok(None);
        }
        ensure!(
            n == 4,
            TruncatedSnafu {
                offset: start,
                needed: 4_u64,
                available: n as u64,
            }
        );
        let tag = Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        );

        if tag.is_control() {
            // item delimiters do not have VR or reserved field
            self.fill(&mut buf)?;
            let len = Length(LittleEndian::read_u32(&buf));
            tracing::trace!("{} control element, len = {} at {}", tag, len, start);
            return Ok(Some(DataElementHeader::new(tag, VR::UN, len)));
        }

        let mut code = [0u8; 2];
        self.fill(&mut code)?;
        let (vr, policy) = lookup_vr(code).context(UnknownVrSnafu {
            offset: start + 4,
            tag,
            code,
        })?;

        let len = match policy.form {
            LengthForm::Short => {
                self.fill(&mut buf[0..2])?;
                Length(u32::from(LittleEndian::read_u16(&buf[0..2])))
            }
            LengthForm::Long => {
                // 2 reserved bytes, then the 4-byte length
                let mut field = [0u8; 6];
                self.fill(&mut field)?;
                Length(LittleEndian::read_u32(&field[2..6]))
            }
        };

        ensure!(
            policy.allows_undefined || len.is_defined(),
            MalformedDelimiterSnafu {
                offset: start,
                tag,
                fault: DelimiterFault::IllegalUndefinedLength(vr),
            }
        );

        tracing::trace!("{} {} len = {} at {}", tag, vr, len, start);
        Ok(Some(DataElementHeader::new(tag, vr, len)))
    }

    fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let start = self.source.position();
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        let tag = Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        );
        let len = Length(LittleEndian::read_u32(&buf[4..8]));

        SequenceItemHeader::new(tag, len).map_err(|e| {
            let fault = match e {
                SequenceItemHeaderError::UnexpectedDelimiterLength { .. } => {
                    DelimiterFault::NonZeroLength
                }
                _ => DelimiterFault::UnexpectedTag,
            };
            MalformedDelimiterSnafu {
                offset: start,
                tag,
                fault,
            }
            .build()
        })
    }

    fn read_value(&mut self, header: &DataElementHeader) -> Result<Vec<u8>> {
        let len = header.len.get().context(MalformedDelimiterSnafu {
            offset: self.source.position(),
            tag: header.tag,
            fault: DelimiterFault::IllegalUndefinedLength(header.vr),
        })?;
        self.read_value_bytes(len)
    }

    fn read_value_bytes(&mut self, len: u32) -> Result<Vec<u8>> {
        let start = self.source.position();
        let len = len as usize;
        // grow the buffer only as data arrives,
        // so that a bogus length cannot reserve memory upfront
        let mut value = Vec::with_capacity(len.min(READ_CHUNK_SIZE));
        while value.len() < len {
            let filled = value.len();
            let chunk = (len - filled).min(READ_CHUNK_SIZE);
            value.resize(filled + chunk, 0);
            let offset = self.source.position();
            let n = self
                .source
                .read_up_to(&mut value[filled..])
                .context(ReadSourceSnafu { offset })?;
            ensure!(
                n == chunk,
                TruncatedSnafu {
                    offset: start,
                    needed: len as u64,
                    available: (filled + n) as u64,
                }
            );
        }
        Ok(value)
    }

    fn read_offset_table(&mut self, len: u32) -> Result<C<u32>> {
        ensure!(
            len % 4 == 0,
            MalformedDelimiterSnafu {
                offset: self.source.position(),
                tag: Tag::ITEM,
                fault: DelimiterFault::MisalignedOffsetTable,
            }
        );
        let bytes = self.read_value_bytes(len)?;
        Ok(bytes.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }

    #[inline]
    fn position(&self) -> u64 {
        self.source.position()
    }
}
