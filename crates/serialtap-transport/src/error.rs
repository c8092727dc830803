/// Errors that can occur at the serial transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No device could be selected.
    #[error("device selection failed: {0}")]
    Selection(String),

    /// The selected device could not be opened.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// Listing the available devices failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(std::io::Error),

    /// An I/O error occurred on an open stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
