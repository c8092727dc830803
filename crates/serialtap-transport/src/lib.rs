//! Serial device selection and duplex byte streams.
//!
//! Provides the transport boundary the rest of serialtap builds on:
//! - [`Transport`]: select a device, open it with [`SerialConfig`]
//! - [`SerialPortTransport`]: operating-system serial ports
//! - [`memory`]: scripted in-process links for tests and embedding
//!
//! Everything above this layer sees only [`SerialStream`], a `Read + Write`
//! handle that can be cloned for a dedicated reader.

pub mod config;
pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use config::{
    DataBits, FlowControl, Parity, SerialConfig, StopBits, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
};
pub use error::{Result, TransportError};
pub use memory::{MemoryLink, MemoryTransport};
pub use serial::{list_ports, select_device, SerialPortTransport};
pub use traits::{DeviceInfo, DeviceKind, SerialStream, Transport};
