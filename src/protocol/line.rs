//! C2: the line reader and text-block reader.
//!
//! A `LineReader` wraps any `BufRead` (a stdin pipe on the engine side, the
//! child's stdout pipe on the host side) and frames it into validated,
//! unterminated lines, transparently retrying on blank lines the way the
//! original engine's `readLine` does.

use std::io::{self, BufRead};

use super::buffer::ScratchBuffer;
use super::error::ProtocolError;
use super::types::{Encoding, MAX_LINE_LEN, MAX_TEXT_LEN};
use super::utf8;

/// Reads and validates lines from an underlying byte stream.
pub struct LineReader<R> {
    inner: R,
    encoding: Encoding,
    raw: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    /// Creates a line reader over `inner`, validating in the given
    /// `encoding`.
    pub fn new(inner: R, encoding: Encoding) -> Self {
        Self {
            inner,
            encoding,
            raw: Vec::new(),
        }
    }

    /// Switches the validation mode used by subsequent reads.
    ///
    /// Used on the host side once an engine's actual `get encoding` reply
    /// is known: the session reads that first reply in the default UTF-8
    /// mode, then switches before any further traffic.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Reads one validated, unterminated line.
    ///
    /// Returns `Ok(None)` at end of input. Blank lines (empty after
    /// validation) are never returned — the reader silently retries.
    /// Raw lines longer than [`MAX_LINE_LEN`] bytes are truncated; the
    /// excess bytes up to the newline are discarded.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            match self.read_line_raw()? {
                None => return Ok(None),
                Some(()) => {
                    let kept = match self.encoding {
                        Encoding::Utf8 => utf8::sanitize_utf8(&mut self.raw),
                        Encoding::Ansi => utf8::sanitize_ansi(&mut self.raw),
                    };
                    self.raw.truncate(kept);

                    if self.raw.is_empty() {
                        continue;
                    }

                    let line = match self.encoding {
                        // sanitize_utf8 only ever keeps bytes that form
                        // valid UTF-8, so this can't fail.
                        Encoding::Utf8 => String::from_utf8(std::mem::take(&mut self.raw))
                            .expect("sanitize_utf8 only keeps valid UTF-8"),
                        // ANSI bytes are opaque Latin-1-ish octets, not
                        // necessarily valid UTF-8 on their own (e.g. a lone
                        // 0x80). Map each byte to the Unicode scalar of the
                        // same value so every byte survives exactly, rather
                        // than trying (and failing) to parse the bytes as
                        // UTF-8.
                        Encoding::Ansi => std::mem::take(&mut self.raw)
                            .into_iter()
                            .map(|b| b as char)
                            .collect(),
                    };
                    return Ok(Some(line));
                }
            }
        }
    }

    /// Reads one raw line into `self.raw`, up to the newline, truncating at
    /// [`MAX_LINE_LEN`] bytes. Returns `Ok(None)` at EOF.
    fn read_line_raw(&mut self) -> io::Result<Option<()>> {
        self.raw.clear();
        let mut saw_any_byte = false;

        loop {
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if available.is_empty() {
                return if saw_any_byte { Ok(Some(())) } else { Ok(None) };
            }

            saw_any_byte = true;

            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    if self.raw.len() < MAX_LINE_LEN {
                        let take = pos.min(MAX_LINE_LEN - self.raw.len());
                        self.raw.extend_from_slice(&available[..take]);
                    }
                    self.inner.consume(pos + 1);
                    return Ok(Some(()));
                }
                None => {
                    if self.raw.len() < MAX_LINE_LEN {
                        let take = (MAX_LINE_LEN - self.raw.len()).min(available.len());
                        self.raw.extend_from_slice(&available[..take]);
                    }
                    let consumed = available.len();
                    self.inner.consume(consumed);
                }
            }
        }
    }

    /// Reads a `speak` text block: successive lines until one consisting
    /// solely of `.`, dot-unstuffing any line that begins with `..` and
    /// concatenating without inserted newlines.
    ///
    /// Fails with [`ProtocolError::UnterminatedTextBlock`] if the
    /// underlying stream ends before the terminator line, and with
    /// [`ProtocolError::TextBlockOverflow`] if the assembled text exceeds
    /// [`MAX_TEXT_LEN`] bytes.
    pub fn read_text(&mut self) -> Result<String, ProtocolError> {
        let mut buf = ScratchBuffer::with_limit(MAX_TEXT_LEN);

        loop {
            let line = self.read_line()?.ok_or(ProtocolError::UnterminatedTextBlock)?;

            if line == "." {
                return Ok(String::from_utf8(buf.as_slice().to_vec())
                    .expect("scratch buffer only ever holds appended UTF-8 lines"));
            }

            let unstuffed = line.strip_prefix("..").map_or(line.as_str(), |rest| {
                // Dot-stuffing strips exactly one leading '.'.
                &line[1..1 + rest.len() + 1]
            });

            buf.extend(unstuffed.as_bytes())?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str) -> LineReader<Cursor<Vec<u8>>> {
        LineReader::new(Cursor::new(input.as_bytes().to_vec()), Encoding::Utf8)
    }

    #[test]
    fn reads_simple_lines() {
        let mut r = reader("hello\nworld\n");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("world"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn skips_blank_lines() {
        let mut r = reader("\n\n\nhello\n\n");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn eof_without_newline_still_yields_final_line() {
        let mut r = reader("hello");
        assert_eq!(r.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn sanitizes_control_characters_and_invalid_utf8() {
        // "Hello" SOH space over-long-dot "world"
        let mut bytes = b"Hello\x01 \xC0\xAEworld\n".to_vec();
        bytes.push(b'\n');
        let mut r = LineReader::new(Cursor::new(bytes), Encoding::Utf8);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("Hello world"));
    }

    #[test]
    fn truncates_overlong_lines() {
        let long_line = "x".repeat(MAX_LINE_LEN + 500);
        let mut r = reader(&format!("{long_line}\nafter\n"));
        let line = r.read_line().unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("after"));
    }

    #[test]
    fn text_block_dot_stuffing_round_trip() {
        let mut r = reader("..dotline\nmore\n.\n");
        let text = r.read_text().unwrap();
        assert_eq!(text, ".dotlinemore");
    }

    #[test]
    fn text_block_plain_lines_concat_without_newlines() {
        let mut r = reader("hello\nworld\n.\n");
        assert_eq!(r.read_text().unwrap(), "helloworld");
    }

    #[test]
    fn text_block_unterminated_at_eof_is_protocol_error() {
        use assert_matches::assert_matches;
        let mut r = reader("hello\nworld");
        assert_matches!(r.read_text(), Err(ProtocolError::UnterminatedTextBlock));
    }

    #[test]
    fn text_block_overflow() {
        let mut body = String::new();
        while body.len() < MAX_TEXT_LEN + 10 {
            body.push_str("0123456789\n");
        }
        body.push_str(".\n");

        use assert_matches::assert_matches;
        let mut r = reader(&body);
        assert_matches!(r.read_text(), Err(ProtocolError::TextBlockOverflow));
    }

    #[test]
    fn ansi_mode_bypasses_utf8_validation() {
        // A lone continuation byte (0x80) is invalid UTF-8 but >= 0x20, so
        // ANSI mode keeps it, mapped to the Unicode scalar of the same
        // value rather than parsed as a UTF-8 sequence.
        let bytes = vec![b'h', b'i', 0x80, b'\n'];
        let mut r = LineReader::new(Cursor::new(bytes), Encoding::Ansi);
        let line = r.read_line().unwrap().unwrap();
        let codepoints: Vec<u32> = line.chars().map(|c| c as u32).collect();
        assert_eq!(codepoints, vec![b'h' as u32, b'i' as u32, 0x80]);
    }
}
