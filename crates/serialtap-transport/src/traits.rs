use std::io::{Read, Write};

use serde::Serialize;

use crate::config::SerialConfig;
use crate::error::Result;
use crate::memory::MemoryLink;

/// A device that can be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Port name, e.g. `/dev/ttyACM0` or `COM3`.
    pub name: String,
    /// What kind of port this is, as reported by enumeration.
    pub kind: DeviceKind,
}

impl DeviceInfo {
    /// A device known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeviceKind::Unknown,
        }
    }

    /// Short description for listings.
    pub fn describe(&self) -> String {
        match &self.kind {
            DeviceKind::Usb {
                vid,
                pid,
                manufacturer,
                product,
                ..
            } => {
                let label = product
                    .as_deref()
                    .or(manufacturer.as_deref())
                    .unwrap_or("USB serial");
                format!("{label} ({vid:04x}:{pid:04x})")
            }
            DeviceKind::Pci => "PCI serial".to_string(),
            DeviceKind::Bluetooth => "Bluetooth serial".to_string(),
            DeviceKind::Unknown => "serial".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceKind {
    Usb {
        vid: u16,
        pid: u16,
        manufacturer: Option<String>,
        product: Option<String>,
        serial_number: Option<String>,
    },
    Pci,
    Bluetooth,
    Unknown,
}

/// The capability boundary the controller talks to.
///
/// Selection and opening are separate so a caller can report which of the two
/// failed.
pub trait Transport: Send {
    /// Pick the device to open.
    fn request_device(&mut self) -> Result<DeviceInfo>;

    /// Open `device` with the given line settings.
    fn open(&mut self, device: &DeviceInfo, config: &SerialConfig) -> Result<SerialStream>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn request_device(&mut self) -> Result<DeviceInfo> {
        (**self).request_device()
    }

    fn open(&mut self, device: &DeviceInfo, config: &SerialConfig) -> Result<SerialStream> {
        (**self).open(device, config)
    }
}

/// An open duplex byte stream to a device.
///
/// `read` returning `Ok(0)` means the device closed the stream. A read that
/// times out returns `ErrorKind::TimedOut`, which callers treat as "no data yet".
pub struct SerialStream {
    name: String,
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Port(Box<dyn serialport::SerialPort>),
    Memory(MemoryLink),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.read(buf),
            SerialStreamInner::Memory(link) => link.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.write(buf),
            SerialStreamInner::Memory(link) => link.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Port(port) => port.flush(),
            SerialStreamInner::Memory(link) => link.flush(),
        }
    }
}

impl SerialStream {
    pub(crate) fn from_port(name: String, port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            name,
            inner: SerialStreamInner::Port(port),
        }
    }

    pub(crate) fn from_memory(name: String, link: MemoryLink) -> Self {
        Self {
            name,
            inner: SerialStreamInner::Memory(link),
        }
    }

    /// Name of the device this stream is connected to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to clone this stream so reads and writes can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            SerialStreamInner::Port(port) => {
                SerialStreamInner::Port(port.try_clone().map_err(std::io::Error::from)?)
            }
            SerialStreamInner::Memory(link) => SerialStreamInner::Memory(link.clone()),
        };
        Ok(Self {
            name: self.name.clone(),
            inner,
        })
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            SerialStreamInner::Port(_) => "serial",
            SerialStreamInner::Memory(_) => "memory",
        };
        f.debug_struct("SerialStream")
            .field("name", &self.name)
            .field("type", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_prefers_product_name() {
        let device = DeviceInfo {
            name: "/dev/ttyACM0".into(),
            kind: DeviceKind::Usb {
                vid: 0x2341,
                pid: 0x0043,
                manufacturer: Some("Arduino (www.arduino.cc)".into()),
                product: Some("Uno".into()),
                serial_number: None,
            },
        };
        assert_eq!(device.describe(), "Uno (2341:0043)");
        assert_eq!(DeviceInfo::named("/dev/pts/3").describe(), "serial");
    }

    #[test]
    fn cloned_memory_stream_shares_the_link() {
        let link = MemoryLink::new();
        let stream = SerialStream::from_memory("mem0".into(), link.clone());
        let mut writer = stream.try_clone().unwrap();

        writer.write_all(b"ping\n").unwrap();

        assert_eq!(writer.name(), "mem0");
        assert_eq!(link.written(), b"ping\n");
    }
}
