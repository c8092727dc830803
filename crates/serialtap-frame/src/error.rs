/// Errors that can occur while reading or writing lines.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream stopped accepting bytes mid-write.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
