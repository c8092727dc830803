use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_line;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes newline-terminated commands to any `Write` stream.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> LineWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode `command + "\n"` and write it completely (blocking).
    pub fn send_line(&mut self, command: &str) -> Result<()> {
        self.buf.clear();
        encode_line(command, &mut self.buf);

        let mut remaining = &self.buf[..];
        while !remaining.is_empty() {
            match self.inner.write(remaining) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => remaining = &remaining[n..],
                Err(err) if retryable(err.kind()) => {}
                Err(err) => return Err(err.into()),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if retryable(err.kind()) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Interrupted | ErrorKind::WouldBlock)
}
