/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (selection, open).
    #[error("{0}")]
    Transport(#[from] serialtap_transport::TransportError),

    /// Line-level error (read, write).
    #[error("{0}")]
    Frame(#[from] serialtap_frame::FrameError),

    /// No connection is open.
    #[error("not connected to a device")]
    NotConnected,

    /// The command is empty or whitespace only.
    #[error("command is empty")]
    EmptyCommand,

    /// A connection is already open or being opened.
    #[error("already connected")]
    AlreadyConnected,

    /// The read loop thread could not be started.
    #[error("failed to start read loop: {0}")]
    Spawn(std::io::Error),
}

impl SessionError {
    /// Whether this is a rejected user action rather than a device failure.
    ///
    /// Input errors are reported to the user but never enter the event log.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            SessionError::NotConnected | SessionError::EmptyCommand | SessionError::AlreadyConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
