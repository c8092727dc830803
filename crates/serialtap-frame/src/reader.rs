use std::io::{ErrorKind, Read};

use serialtap_transport::SerialStream;
use tracing::debug;

use crate::codec::LineFramer;
use crate::error::{FrameError, Result};
use crate::writer::LineWriter;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Result of pulling one chunk from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A chunk arrived. Holds the lines it completed, possibly none.
    Lines(Vec<String>),
    /// The read timed out without data.
    Idle,
    /// The stream reported end-of-data. Any partial line was discarded.
    EndOfStream,
}

/// Reads complete lines from any `Read` stream.
///
/// Owns the [`LineFramer`] for one connection, so partial lines never leak
/// into the next connection.
pub struct LineReader<T> {
    inner: T,
    framer: LineFramer,
    chunk: Box<[u8]>,
}

impl<T: Read> LineReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            framer: LineFramer::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Pull the next chunk and frame it (blocking up to the stream's read timeout).
    pub fn read_lines(&mut self) -> Result<ReadOutcome> {
        loop {
            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(ReadOutcome::Idle);
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                let dropped = self.framer.finish();
                if dropped > 0 {
                    debug!(bytes = dropped, "discarding unterminated line at end of stream");
                }
                return Ok(ReadOutcome::EndOfStream);
            }

            return Ok(ReadOutcome::Lines(self.framer.feed(&self.chunk[..read])));
        }
    }

    /// Bytes of the line currently being assembled.
    pub fn pending(&self) -> &[u8] {
        self.framer.pending()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Split an open stream into a reader half and a writer half.
pub fn split(stream: SerialStream) -> Result<(LineReader<SerialStream>, LineWriter<SerialStream>)> {
    let reader_stream = stream.try_clone().map_err(transport_to_frame_error)?;
    Ok((LineReader::new(reader_stream), LineWriter::new(stream)))
}

fn transport_to_frame_error(err: serialtap_transport::TransportError) -> FrameError {
    match err {
        serialtap_transport::TransportError::Io(io)
        | serialtap_transport::TransportError::Enumerate(io) => FrameError::Io(io),
        serialtap_transport::TransportError::Open { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use serialtap_transport::{MemoryLink, MemoryTransport, SerialConfig, Transport};

    use super::*;

    #[test]
    fn reads_lines_from_cursor() {
        let mut reader = LineReader::new(Cursor::new(b"hello\nworld\n".to_vec()));
        assert_eq!(
            reader.read_lines().unwrap(),
            ReadOutcome::Lines(vec!["hello".into(), "world".into()])
        );
        assert_eq!(reader.read_lines().unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn partial_chunk_yields_no_lines() {
        let link = MemoryLink::new();
        link.push_chunk(b"Hel").push_chunk(b"lo\n");
        let mut reader = LineReader::new(link);

        assert_eq!(reader.read_lines().unwrap(), ReadOutcome::Lines(vec![]));
        assert_eq!(reader.pending(), b"Hel");
        assert_eq!(
            reader.read_lines().unwrap(),
            ReadOutcome::Lines(vec!["Hello".into()])
        );
    }

    #[test]
    fn end_of_stream_discards_partial_line() {
        let link = MemoryLink::new();
        link.push_chunk(b"last words");
        let mut reader = LineReader::new(link);

        assert_eq!(reader.read_lines().unwrap(), ReadOutcome::Lines(vec![]));
        assert_eq!(reader.read_lines().unwrap(), ReadOutcome::EndOfStream);
        assert!(reader.pending().is_empty());
    }

    #[test]
    fn timeout_is_idle_not_error() {
        let link = MemoryLink::hold_open();
        let mut reader = LineReader::new(link);
        assert_eq!(reader.read_lines().unwrap(), ReadOutcome::Idle);
    }

    #[test]
    fn interrupted_read_is_retried() {
        let link = MemoryLink::new();
        link.push_error(ErrorKind::Interrupted, "signal")
            .push_chunk(b"ok\n");
        let mut reader = LineReader::new(link);
        assert_eq!(
            reader.read_lines().unwrap(),
            ReadOutcome::Lines(vec!["ok".into()])
        );
    }

    #[test]
    fn read_failure_propagates_io_error() {
        let link = MemoryLink::new();
        link.push_error(ErrorKind::BrokenPipe, "unplugged");
        let mut reader = LineReader::new(link);
        let err = reader.read_lines().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn split_shares_one_link() {
        let link = MemoryLink::new();
        link.push_chunk(b"pong\n");
        let mut transport = MemoryTransport::new().with_link(link.clone());
        let device = transport.request_device().unwrap();
        let stream = transport.open(&device, &SerialConfig::default()).unwrap();

        let (mut reader, mut writer) = split(stream).unwrap();
        writer.send_line("ping").unwrap();
        writer.get_mut().flush().unwrap();

        assert_eq!(link.written(), b"ping\n");
        assert_eq!(
            reader.read_lines().unwrap(),
            ReadOutcome::Lines(vec!["pong".into()])
        );
    }
}
