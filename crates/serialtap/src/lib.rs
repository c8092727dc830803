//! Line-oriented serial monitor.
//!
//! serialtap connects to one serial device at a time, turns its chunked byte
//! stream back into text lines, sends newline-terminated commands, and keeps
//! a timestamped transcript of the session.
//!
//! # Crate Structure
//!
//! - [`transport`]: Device selection and duplex streams (serial ports, in-memory links)
//! - [`frame`]: Newline framing over chunked reads
//! - [`session`]: Connection lifecycle and the event log

/// Re-export transport types.
pub mod transport {
    pub use serialtap_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialtap_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use serialtap_session::*;
}

pub use serialtap_session::{Event, EventKind, Session, SessionConfig, SessionError};
pub use serialtap_transport::{SerialConfig, SerialPortTransport};
