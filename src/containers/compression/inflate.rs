//! Streaming zlib inflate of a compressed archive record.
//!
//! Compressed records of the indexed archive are plain zlib streams. The decoder feeds the
//! source range in fixed-size chunks and drains the output buffer into the destination
//! stream until the deflate stream reports its end.

use std::io::{self, Write};

use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use thiserror::Error;

const CHUNK: usize = 16384;

#[derive(Debug, Error)]
pub enum InflateError {
    #[error("corrupt deflate stream: {0}")]
    Corrupt(#[from] DecompressError),
    #[error("deflate stream truncated after {consumed} input bytes")]
    Truncated { consumed: usize },
    #[error("I/O error while writing inflated data: {0}")]
    Io(#[from] io::Error),
}

/// Inflates `source` into `dest`, returning the number of bytes written.
pub fn inflate_to_writer<W: Write>(source: &[u8], dest: &mut W) -> Result<u64, InflateError> {
    let mut inflater = Decompress::new(true);
    let mut out = [0u8; CHUNK];

    loop {
        let consumed = inflater.total_in() as usize;
        let produced_before = inflater.total_out();
        let chunk_end = (consumed + CHUNK).min(source.len());

        let status = inflater.decompress(
            &source[consumed..chunk_end],
            &mut out,
            FlushDecompress::None,
        )?;

        let produced = (inflater.total_out() - produced_before) as usize;
        dest.write_all(&out[..produced])?;

        match status {
            Status::StreamEnd => return Ok(inflater.total_out()),
            Status::Ok | Status::BufError => {
                let progressed = produced > 0 || inflater.total_in() as usize > consumed;
                if !progressed {
                    return Err(InflateError::Truncated {
                        consumed: inflater.total_in() as usize,
                    });
                }
            }
        }
    }
}

pub fn inflate(source: &[u8]) -> Result<Vec<u8>, InflateError> {
    let mut out = Vec::new();
    inflate_to_writer(source, &mut out)?;
    Ok(out)
}
