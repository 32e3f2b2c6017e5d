//! Streaming shard reader.
//!
//! Wraps a shard byte source (local file or HTTP response body) in a
//! multi-member gzip decoder and yields one decoded line at a time. The
//! sequence is a single forward pass; nothing beyond the current line is
//! held in memory.

use super::fetch::BodyReadError;
use crate::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, ErrorKind, Read};

/// One non-blank line of a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLine {
    /// 1-based line number within the decompressed shard.
    pub number: usize,
    /// The decoded line, without its trailing newline.
    pub text: String,
}

/// Lazy line iterator over a gzip-compressed shard.
///
/// Yields:
/// - `Ok(ShardLine)` for every non-blank line
/// - `Err(Error::MalformedRecord)` for a line that is not valid UTF-8; the
///   stream stays usable and the next call continues with the next line
/// - `Err(Error::Transport)` if the connection fails while a remote body is
///   being read; the iterator is exhausted afterwards
/// - `Err(Error::Decompression)` if the underlying stream is truncated or not
///   gzip; the iterator is exhausted afterwards
pub struct ShardReader<R: Read> {
    shard: String,
    reader: BufReader<MultiGzDecoder<R>>,
    buf: Vec<u8>,
    line_number: usize,
    bytes_read: u64,
    done: bool,
}

impl<R: Read> ShardReader<R> {
    /// Create a reader over `source`. `shard` labels errors.
    pub fn new(shard: impl Into<String>, source: R) -> Self {
        Self {
            shard: shard.into(),
            reader: BufReader::new(MultiGzDecoder::new(source)),
            buf: Vec::with_capacity(4096),
            line_number: 0,
            bytes_read: 0,
            done: false,
        }
    }

    /// Lines read so far, including blank and malformed ones.
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Decompressed bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Iterator for ShardReader<R> {
    type Item = Result<ShardLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                }
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.line_number += 1;

                    let line = trim_line_ending(&self.buf);
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }

                    return Some(match std::str::from_utf8(line) {
                        Ok(text) => Ok(ShardLine {
                            number: self.line_number,
                            text: text.to_string(),
                        }),
                        Err(e) => Err(Error::MalformedRecord(format!(
                            "line {}: invalid UTF-8: {}",
                            self.line_number, e
                        ))),
                    });
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    let transport = e
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<BodyReadError>())
                        .map(|body| body.reason().to_string());
                    let shard = self.shard.clone();
                    return Some(Err(match transport {
                        Some(reason) => Error::Transport { shard, reason },
                        None => Error::Decompression { shard, source: e },
                    }));
                }
            }
        }
        None
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
