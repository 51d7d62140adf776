//! Decoding many files in parallel.
use crate::report::{dump_dataset, Summary};
use crate::{DecodeSnafu, Error, OpenFileSnafu};
use dicom_stream_object::{InMemDataSet, OpenFileOptions};
use dicom_stream_parser::{ByteSource, StreamSource};
use rayon::prelude::*;
use snafu::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options for decoding a batch of files.
#[derive(Debug, Default, Copy, Clone)]
pub struct BatchOptions {
    /// how to read each file
    pub open: OpenFileOptions,
    /// whether to render the element tree of each data set
    pub dump: bool,
}

/// A successfully decoded file.
#[derive(Debug)]
pub struct Decoded {
    pub summary: Summary,
    /// the rendered element tree, if requested
    pub dump: Option<String>,
}

/// The result of decoding one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Decoded, Error>,
}

/// Decode all files on the current rayon pool.
///
/// Outcomes are returned in the same order as the given files.
pub fn decode_all(files: &[PathBuf], options: BatchOptions) -> Vec<FileOutcome> {
    files
        .par_iter()
        .map(|path| FileOutcome {
            path: path.clone(),
            result: decode_file(path, options),
        })
        .collect()
}

fn decode_file(path: &Path, options: BatchOptions) -> Result<Decoded, Error> {
    debug!("Decoding {}", path.display());
    let file = File::open(path).with_context(|_| OpenFileSnafu {
        path: path.to_path_buf(),
    })?;
    let (dataset, bytes) = decode_reader(BufReader::new(file), options.open)?;
    Ok(Decoded {
        summary: Summary::of(&dataset, bytes),
        dump: options.dump.then(|| dump_dataset(&dataset)),
    })
}

/// Decode a whole stream,
/// also returning the number of bytes read from it.
pub fn decode_reader<R>(reader: R, options: OpenFileOptions) -> Result<(InMemDataSet, u64), Error>
where
    R: Read,
{
    let mut source = StreamSource::new(reader);
    let dataset = options.decode_source(&mut source).context(DecodeSnafu)?;
    Ok((dataset, source.position()))
}
