//! Gzip detection and decoding
//!
//! Detection is by filename only: a case-insensitive `.gz` suffix selects the
//! gzip decoder, anything else is read as-is. A gzip payload uploaded under a
//! plain name is therefore parsed as raw bytes.
//!
//! Concatenated gzip members are decoded as one stream.

use async_compression::tokio::bufread::GzipDecoder;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader as StdBufReader, Read};
use std::pin::Pin;
use tokio::io::{AsyncRead, BufReader};

/// Filename suffix that marks gzip content.
pub const GZIP_SUFFIX: &str = ".gz";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Decoded byte stream handed to the CSV parser
pub type DecodedReader = Pin<Box<dyn AsyncRead + Send>>;

pub fn is_gzip(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(GZIP_SUFFIX)
}

/// Buffer `reader` and decompress it when `filename` names a gzip file.
pub fn decode<R>(reader: R, filename: &str) -> DecodedReader
where
    R: AsyncRead + Send + 'static,
{
    let buffered = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    if is_gzip(filename) {
        let mut decoder = GzipDecoder::new(buffered);
        decoder.multiple_members(true);
        Box::pin(decoder)
    } else {
        Box::pin(buffered)
    }
}

/// Blocking counterpart of [`decode`], for passes run on the blocking pool.
pub fn decode_blocking<R>(reader: R, filename: &str) -> Box<dyn BufRead + Send>
where
    R: Read + Send + 'static,
{
    if is_gzip(filename) {
        let decoder = MultiGzDecoder::new(StdBufReader::with_capacity(READ_BUFFER_SIZE, reader));
        Box::new(StdBufReader::with_capacity(READ_BUFFER_SIZE, decoder))
    } else {
        Box::new(StdBufReader::with_capacity(READ_BUFFER_SIZE, reader))
    }
}
