use tracing::{debug, info};

use crate::config::{DataBits, FlowControl, Parity, SerialConfig, StopBits};
use crate::error::{Result, TransportError};
use crate::traits::{DeviceInfo, DeviceKind, SerialStream, Transport};

/// Transport over operating-system serial ports.
///
/// Device selection stands in for an interactive port picker: an explicit port
/// name always wins, otherwise the single plausible candidate is chosen.
#[derive(Debug, Clone, Default)]
pub struct SerialPortTransport {
    port: Option<String>,
}

impl SerialPortTransport {
    /// Select devices automatically.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always select `port`.
    pub fn with_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
        }
    }

    /// The explicitly requested port, if any.
    pub fn requested_port(&self) -> Option<&str> {
        self.port.as_deref()
    }
}

/// Enumerate the serial ports visible to this process.
pub fn list_ports() -> Result<Vec<DeviceInfo>> {
    let ports = serialport::available_ports()
        .map_err(|err| TransportError::Enumerate(std::io::Error::from(err)))?;
    Ok(ports.into_iter().map(device_from_port_info).collect())
}

/// Choose one device out of an enumeration.
///
/// USB ports are preferred since on-board UARTs are rarely what a user wants.
pub fn select_device(candidates: Vec<DeviceInfo>) -> Result<DeviceInfo> {
    let usb: Vec<&DeviceInfo> = candidates
        .iter()
        .filter(|d| matches!(d.kind, DeviceKind::Usb { .. }))
        .collect();

    let pool: Vec<&DeviceInfo> = if usb.is_empty() {
        candidates.iter().collect()
    } else {
        usb
    };

    match pool.as_slice() {
        [] => Err(TransportError::Selection(
            "no serial devices found".to_string(),
        )),
        [only] => Ok((*only).clone()),
        many => {
            let names: Vec<&str> = many.iter().map(|d| d.name.as_str()).collect();
            Err(TransportError::Selection(format!(
                "multiple serial devices found, pick one explicitly: {}",
                names.join(", ")
            )))
        }
    }
}

impl Transport for SerialPortTransport {
    fn request_device(&mut self) -> Result<DeviceInfo> {
        if let Some(name) = &self.port {
            // Ports that enumeration misses (ptys, some adapters) are still openable.
            let known = list_ports()
                .ok()
                .and_then(|ports| ports.into_iter().find(|d| &d.name == name));
            return Ok(known.unwrap_or_else(|| DeviceInfo::named(name.clone())));
        }

        let device = select_device(list_ports()?)?;
        debug!(port = %device.name, "selected serial device");
        Ok(device)
    }

    fn open(&mut self, device: &DeviceInfo, config: &SerialConfig) -> Result<SerialStream> {
        let port = serialport::new(device.name.as_str(), config.baud_rate)
            .data_bits(map_data_bits(config.data_bits))
            .parity(map_parity(config.parity))
            .stop_bits(map_stop_bits(config.stop_bits))
            .flow_control(map_flow_control(config.flow_control))
            .timeout(config.read_timeout)
            .open()
            .map_err(|err| TransportError::Open {
                port: device.name.clone(),
                source: std::io::Error::from(err),
            })?;

        info!(port = %device.name, settings = %config, "opened serial port");
        Ok(SerialStream::from_port(device.name.clone(), port))
    }
}

fn device_from_port_info(info: serialport::SerialPortInfo) -> DeviceInfo {
    let kind = match info.port_type {
        serialport::SerialPortType::UsbPort(usb) => DeviceKind::Usb {
            vid: usb.vid,
            pid: usb.pid,
            manufacturer: usb.manufacturer,
            product: usb.product,
            serial_number: usb.serial_number,
        },
        serialport::SerialPortType::PciPort => DeviceKind::Pci,
        serialport::SerialPortType::BluetoothPort => DeviceKind::Bluetooth,
        serialport::SerialPortType::Unknown => DeviceKind::Unknown,
    };
    DeviceInfo {
        name: info.port_name,
        kind,
    }
}

fn map_data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn map_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn map_stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn map_flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(name: &str) -> DeviceInfo {
        DeviceInfo {
            name: name.to_string(),
            kind: DeviceKind::Usb {
                vid: 0x2341,
                pid: 0x0043,
                manufacturer: None,
                product: None,
                serial_number: None,
            },
        }
    }

    #[test]
    fn select_prefers_single_usb_port() {
        let picked = select_device(vec![
            DeviceInfo::named("/dev/ttyS0"),
            usb("/dev/ttyACM0"),
            DeviceInfo::named("/dev/ttyS1"),
        ])
        .unwrap();
        assert_eq!(picked.name, "/dev/ttyACM0");
    }

    #[test]
    fn select_falls_back_to_single_port() {
        let picked = select_device(vec![DeviceInfo::named("/dev/ttyS0")]).unwrap();
        assert_eq!(picked.name, "/dev/ttyS0");
    }

    #[test]
    fn select_fails_without_devices() {
        let err = select_device(Vec::new()).unwrap_err();
        assert!(matches!(err, TransportError::Selection(msg) if msg.contains("no serial devices")));
    }

    #[test]
    fn select_refuses_to_guess_between_usb_ports() {
        let err = select_device(vec![usb("/dev/ttyACM0"), usb("/dev/ttyUSB0")]).unwrap_err();
        match err {
            TransportError::Selection(msg) => {
                assert!(msg.contains("/dev/ttyACM0"));
                assert!(msg.contains("/dev/ttyUSB0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn explicit_port_is_selected_without_enumeration_match() {
        let mut transport = SerialPortTransport::with_port("/dev/serialtap-missing");
        let device = transport.request_device().unwrap();
        assert_eq!(device.name, "/dev/serialtap-missing");
        assert_eq!(transport.requested_port(), Some("/dev/serialtap-missing"));
    }

    #[test]
    fn opening_missing_port_is_open_error() {
        let mut transport = SerialPortTransport::with_port("/dev/serialtap-missing");
        let device = transport.request_device().unwrap();
        let err = transport
            .open(&device, &SerialConfig::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::Open { port, .. } if port == "/dev/serialtap-missing"));
    }
}
