//! Opening DICOM Part 10 files and streams.
//!
//! A Part 10 stream starts with a 128-byte preamble
//! and the magic code `DICM`, directly followed by the first element.
use crate::{FormatSnafu, InMemDataSet, OpenFileSnafu, Result};
use dicom_stream_parser::error::{MissingMagicSnafu, ReadSourceSnafu, TruncatedSnafu};
use dicom_stream_parser::source::{ByteSource, StreamSource};
use dicom_stream_parser::{DataSetReaderOptions, FormatError};
use snafu::{ensure, ResultExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// The magic code expected right after the preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = *b"DICM";

/// The length of the file preamble in bytes.
pub const PREAMBLE_LENGTH: usize = 128;

/// Read the 128-byte preamble and the `DICM` magic code.
///
/// The preamble is returned without interpretation.
/// When `strict` is set, all of its bytes must be zero.
/// On success, the source is positioned right after the magic code.
///
/// # Errors
///
/// - `Truncated` if fewer than 132 bytes are available;
/// - `MissingMagic` if the magic code does not match,
///   carrying the 4 bytes found instead;
/// - `MissingMagic` in strict mode if a preamble byte is not zero,
///   at the offset of that byte and
///   carrying the 4-byte group of the preamble which contains it.
pub fn read_preamble<S: ?Sized>(source: &mut S, strict: bool) -> Result<[u8; 128], FormatError>
where
    S: ByteSource,
{
    let start = source.position();
    let mut buf = [0u8; PREAMBLE_LENGTH + 4];
    let n = source
        .read_up_to(&mut buf)
        .context(ReadSourceSnafu { offset: start })?;
    ensure!(
        n == buf.len(),
        TruncatedSnafu {
            offset: start,
            needed: buf.len() as u64,
            available: n as u64,
        }
    );

    let mut preamble = [0u8; PREAMBLE_LENGTH];
    preamble.copy_from_slice(&buf[..PREAMBLE_LENGTH]);

    if strict {
        if let Some(i) = preamble.iter().position(|b| *b != 0) {
            let group = i / 4 * 4;
            return MissingMagicSnafu {
                offset: start + i as u64,
                found: [
                    preamble[group],
                    preamble[group + 1],
                    preamble[group + 2],
                    preamble[group + 3],
                ],
            }
            .fail();
        }
    }

    let found = [buf[128], buf[129], buf[130], buf[131]];
    ensure!(
        found == DICM_MAGIC_CODE,
        MissingMagicSnafu {
            offset: start + PREAMBLE_LENGTH as u64,
            found,
        }
    );
    Ok(preamble)
}

/// Create a data set by reading from a byte stream
/// which starts with the preamble and the magic code.
pub fn from_reader<R>(from: R) -> Result<InMemDataSet>
where
    R: Read,
{
    OpenFileOptions::new().from_reader(from)
}

/// Create a data set by reading a DICOM Part 10 file.
pub fn open_file<P>(path: P) -> Result<InMemDataSet>
where
    P: AsRef<Path>,
{
    OpenFileOptions::new().open_file(path)
}

/// A builder type for opening a DICOM file with additional options.
///
/// # Example
///
/// ```no_run
/// # use dicom_stream_object::{OpenFileOptions, ReadPreamble};
/// let dataset = OpenFileOptions::new()
///     .read_preamble(ReadPreamble::Always)
///     .strict_preamble(true)
///     .max_depth(16)
///     .open_file("path/to/file.dcm")?;
/// # Result::<(), Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Default, Copy, Clone)]
#[non_exhaustive]
pub struct OpenFileOptions {
    read_preamble: ReadPreamble,
    strict_preamble: bool,
    reader: DataSetReaderOptions,
}

impl OpenFileOptions {
    pub fn new() -> Self {
        OpenFileOptions::default()
    }

    /// Set whether to read the 128-byte preamble and the magic code.
    pub fn read_preamble(mut self, option: ReadPreamble) -> Self {
        self.read_preamble = option;
        self
    }

    /// Set whether the preamble must be filled with zeros.
    pub fn strict_preamble(mut self, strict: bool) -> Self {
        self.strict_preamble = strict;
        self
    }

    /// Set the maximum number of nested sequences admitted.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.reader = self.reader.max_depth(max_depth);
        self
    }

    /// Open the file at the given path.
    pub fn open_file<P>(self, path: P) -> Result<InMemDataSet>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).with_context(|_| OpenFileSnafu {
            filename: path.to_path_buf(),
        })?;
        self.from_reader(BufReader::new(file))
    }

    /// Obtain a data set by reading from a byte stream.
    pub fn from_reader<R>(self, from: R) -> Result<InMemDataSet>
    where
        R: Read,
    {
        self.decode_source(StreamSource::new(from))
    }

    /// Obtain a data set from a byte source,
    /// validating the preamble first if requested.
    pub fn decode_source<S>(self, mut source: S) -> Result<InMemDataSet>
    where
        S: ByteSource,
    {
        if self.read_preamble == ReadPreamble::Always {
            read_preamble(&mut source, self.strict_preamble).context(FormatSnafu)?;
        }
        InMemDataSet::decode_with_options(source, self.reader)
    }
}

/// An enumerate of supported options for
/// whether to read the 128-byte DICOM file preamble.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ReadPreamble {
    /// Always read the preamble and the magic code first,
    /// thus assuming that the original source always has them.
    #[default]
    Always,
    /// Never read the preamble,
    /// thus assuming that the source starts at the first element.
    Never,
}
