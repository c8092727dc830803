use bytes::{Buf, BufMut, BytesMut};

/// Line delimiter on the wire.
pub const DELIMITER: u8 = b'\n';

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Reassembles newline-delimited text from arbitrarily chunked bytes.
///
/// Bytes are buffered until a `\n` arrives. Every completed line is decoded
/// permissively (invalid UTF-8 becomes U+FFFD), trimmed, and dropped if
/// nothing is left. The bytes after the last delimiter stay buffered as the
/// start of the next line.
///
/// Splitting happens before decoding, so a multi-byte character torn across
/// two chunks still decodes intact: `\n` never occurs inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Ingest one chunk and return the lines it completed, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(line) = next_line(&mut self.buf) {
            if let Some(line) = line {
                lines.push(line);
            }
        }
        lines
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop the unterminated line, returning how many bytes were discarded.
    ///
    /// Called when a stream ends: a trailing partial line is never emitted.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Clear all buffered state.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

/// Strip surrounding whitespace, byte order marks included.
pub fn trim_line(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

/// Split the first complete line off `src`.
///
/// Returns `None` when no delimiter is buffered, `Some(None)` for a line that
/// trimmed to nothing, `Some(Some(line))` otherwise.
fn next_line(src: &mut BytesMut) -> Option<Option<String>> {
    let end = src.iter().position(|&b| b == DELIMITER)?;
    let raw = src.split_to(end);
    src.advance(1);

    let text = String::from_utf8_lossy(&raw);
    let trimmed = trim_line(&text);
    if trimmed.is_empty() {
        Some(None)
    } else {
        Some(Some(trimmed.to_string()))
    }
}

/// Encode an outbound command: its UTF-8 bytes followed by `\n`.
///
/// The command is written as given; callers decide what counts as empty.
pub fn encode_line(command: &str, dst: &mut BytesMut) {
    dst.reserve(command.len() + 1);
    dst.put_slice(command.as_bytes());
    dst.put_u8(DELIMITER);
}

/// `tokio_util` codec with the same framing rules as [`LineFramer`].
#[cfg(feature = "async")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

#[cfg(feature = "async")]
impl LineCodec {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for LineCodec {
    type Item = String;
    type Error = crate::error::FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        while let Some(line) = next_line(src) {
            if line.is_some() {
                return Ok(line);
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            tracing::debug!(bytes = src.len(), "discarding unterminated line at end of stream");
            src.clear();
        }
        Ok(None)
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<&str> for LineCodec {
    type Error = crate::error::FrameError;

    fn encode(&mut self, command: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(command, dst);
        Ok(())
    }
}
