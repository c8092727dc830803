//! Serial connection lifecycle and the session transcript.
//!
//! This is the "just works" layer: connect to a device, send commands, and
//! read back an ordered log of everything that happened.
//!
//! ```no_run
//! use serialtap_session::{Session, SessionConfig};
//! use serialtap_transport::SerialPortTransport;
//!
//! let mut session = Session::new(
//!     SerialPortTransport::with_port("/dev/ttyACM0"),
//!     SessionConfig::default(),
//! );
//! session.connect()?;
//! session.send("led on")?;
//! for event in session.snapshot() {
//!     println!("[{}] {}: {}", event.display_time(), event.kind, event.message);
//! }
//! # Ok::<(), serialtap_session::SessionError>(())
//! ```

pub mod error;
pub mod log;
pub mod session;
pub mod state;

pub use error::{Result, SessionError};
pub use log::{Event, EventKind, EventLog, SharedLog};
pub use session::{ReadLoopExit, Session, SessionConfig, DEFAULT_DEVICE_LABEL};
pub use state::ConnectionState;
