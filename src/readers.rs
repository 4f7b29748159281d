use anyhow::Result;
use log::debug;
use std::io::{self, Read};
use std::iter::FusedIterator;

use crate::decompression::{self, Compression};

/// Default refill size: 512 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

const LF: &[u8] = b"\n";
const CRLF: &[u8] = b"\r\n";

/// Reads a byte stream in fixed-size chunks and yields logical lines.
///
/// Lines are yielded without their terminator. The terminator is chosen once
/// per stream: CRLF if a carriage return is present in the buffered data by
/// the time the first line feed arrives, LF otherwise. A terminator that is
/// split across two reads is found once the second read lands, because only
/// the unconsumed tail of the buffer is carried into the next refill.
///
/// The reader makes a single forward pass and cannot be restarted.
pub struct ChunkedLineReader<R> {
    source: R,
    buffer_size: usize,
    buffer: Vec<u8>,
    pos: usize,
    eol: Option<&'static [u8]>,
    eof: bool,
    finished: bool,
}

impl<R: Read> ChunkedLineReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_buffer_size(source, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(source: R, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            source,
            buffer_size,
            buffer: Vec::with_capacity(buffer_size),
            pos: 0,
            eol: None,
            eof: false,
            finished: false,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The terminator in use, once it has been detected.
    pub fn line_ending(&self) -> Option<&'static str> {
        self.eol.map(|eol| if eol == CRLF { "\r\n" } else { "\n" })
    }

    /// Append up to `buffer_size` bytes. Returns the number of bytes read.
    fn refill(&mut self) -> io::Result<usize> {
        // Drop everything already emitted before growing the buffer.
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }

        let start = self.buffer.len();
        self.buffer.resize(start + self.buffer_size, 0);
        loop {
            match self.source.read(&mut self.buffer[start..]) {
                Ok(n) => {
                    self.buffer.truncate(start + n);
                    if self.eol.is_none() {
                        self.detect_line_ending(start);
                    }
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            }
        }
    }

    fn detect_line_ending(&mut self, fresh_from: usize) {
        if !self.buffer[fresh_from..].contains(&b'\n') {
            return;
        }
        self.eol = Some(if self.buffer.contains(&b'\r') { CRLF } else { LF });
    }

    fn take_line(&mut self, end: usize, terminator_len: usize) -> String {
        let line = decode_line(&self.buffer[self.pos..end]);
        self.pos = end + terminator_len;
        line
    }
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // Municipal exports are frequently Latin-1; keep the line rather
        // than rejecting it.
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

impl<R: Read> Iterator for ChunkedLineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(eol) = self.eol {
                if let Some(offset) = find(&self.buffer[self.pos..], eol) {
                    let end = self.pos + offset;
                    return Some(Ok(self.take_line(end, eol.len())));
                }
            }

            if self.eof {
                self.finished = true;
                if self.pos < self.buffer.len() {
                    let end = self.buffer.len();
                    return Some(Ok(self.take_line(end, 0)));
                }
                return None;
            }

            match self.refill() {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<R: Read> FusedIterator for ChunkedLineReader<R> {}

/// Open the input named on the command line. `None` or `-` reads stdin.
pub fn open_input(path: Option<&str>) -> Result<(Box<dyn Read + Send>, Compression)> {
    match path {
        None | Some("-") => {
            debug!("reading tickets from stdin");
            Ok(decompression::maybe_decompress(io::stdin())?)
        }
        Some(path) => {
            debug!("reading tickets from {}", path);
            decompression::open_path(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn lines(content: &str, buffer_size: usize) -> Vec<String> {
        ChunkedLineReader::with_buffer_size(Cursor::new(content.as_bytes().to_vec()), buffer_size)
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    /// Hands out at most `step` bytes per read, like a pipe or socket.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_default_buffer_size() {
        let reader = ChunkedLineReader::new(Cursor::new(Vec::new()));
        assert_eq!(reader.buffer_size(), 512 * 1024);
    }

    #[test]
    fn test_custom_buffer_size() {
        let reader = ChunkedLineReader::with_buffer_size(Cursor::new(Vec::new()), 128);
        assert_eq!(reader.buffer_size(), 128);
    }

    #[test]
    fn test_lf_lines() {
        assert_eq!(lines("foo\nbar\nbaz", 1), ["foo", "bar", "baz"]);
    }

    #[test]
    fn test_crlf_lines() {
        assert_eq!(lines("foo\r\nbar\r\nbaz", DEFAULT_BUFFER_SIZE), ["foo", "bar", "baz"]);
    }

    #[test]
    fn test_crlf_split_across_reads() {
        // With 4-byte chunks, "\r" ends the first chunk and "\n" starts the next.
        assert_eq!(lines("foo\r\nbar\r\nbaz", 4), ["foo", "bar", "baz"]);
    }

    #[test]
    fn test_trailing_terminator_adds_no_empty_line() {
        assert_eq!(lines("foo\nbar\n", 3), ["foo", "bar"]);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        assert_eq!(lines("a\n\nb", 2), ["a", "", "b"]);
    }

    #[test]
    fn test_empty_source() {
        assert!(lines("", 8).is_empty());
    }

    #[test]
    fn test_single_unterminated_line() {
        assert_eq!(lines("only", 2), ["only"]);
    }

    #[test]
    fn test_terminator_detected_once() {
        let mut reader =
            ChunkedLineReader::with_buffer_size(Cursor::new(b"a\r\nb\nc\r\n".to_vec()), 64);
        assert_eq!(reader.next().unwrap().unwrap(), "a");
        assert_eq!(reader.line_ending(), Some("\r\n"));
        // A bare LF inside a CRLF stream is part of the line.
        assert_eq!(reader.next().unwrap().unwrap(), "b\nc");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_not_restartable() {
        let mut reader = ChunkedLineReader::with_buffer_size(Cursor::new(b"a\nb".to_vec()), 1);
        assert_eq!(reader.by_ref().count(), 2);
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_short_reads() {
        let source = Trickle {
            data: b"foo\r\nbar\r\nbaz".to_vec(),
            pos: 0,
            step: 3,
        };
        let lines: Vec<String> = ChunkedLineReader::with_buffer_size(source, 1024)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines, ["foo", "bar", "baz"]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let content = b"caf\xe9\nok".to_vec();
        let lines: Vec<String> = ChunkedLineReader::with_buffer_size(Cursor::new(content), 16)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("caf"));
        assert_eq!(lines[1], "ok");
    }

    #[test]
    fn test_open_input_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "h\nfoo\nbar")?;
        temp_file.flush()?;

        let path = temp_file.path().to_string_lossy().to_string();
        let (reader, compression) = open_input(Some(&path))?;
        assert_eq!(compression, Compression::Plain);
        let lines: Vec<String> = ChunkedLineReader::new(reader).collect::<io::Result<_>>()?;
        assert_eq!(lines, ["h", "foo", "bar"]);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_every_buffer_size_yields_same_lines(
            parts in proptest::collection::vec("[a-z ,]{0,12}", 1..20),
            buffer_size in 1usize..64,
            crlf in any::<bool>(),
            trailing in any::<bool>(),
        ) {
            let terminator = if crlf { "\r\n" } else { "\n" };
            let mut content = parts.join(terminator);
            if trailing {
                content.push_str(terminator);
            }

            let mut expected = parts.clone();
            if !trailing && expected.last().map(|l| l.is_empty()).unwrap_or(false) {
                expected.pop();
            }
            if content.is_empty() {
                expected.clear();
            }

            prop_assert_eq!(lines(&content, buffer_size), expected);
        }
    }
}
