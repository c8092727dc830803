use serialtap_transport::{list_ports, DeviceInfo, DeviceKind};

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let devices = list_ports().map_err(|err| transport_error("listing ports failed", err))?;
    let devices = filter_ports(devices, args.all);
    print_ports(&devices, format);
    Ok(SUCCESS)
}

fn filter_ports(devices: Vec<DeviceInfo>, all: bool) -> Vec<DeviceInfo> {
    let mut devices: Vec<DeviceInfo> = devices
        .into_iter()
        .filter(|device| all || matches!(device.kind, DeviceKind::Usb { .. }))
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(name: &str) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            kind: DeviceKind::Usb {
                vid: 0x1a86,
                pid: 0x7523,
                manufacturer: None,
                product: Some("USB Serial".into()),
                serial_number: None,
            },
        }
    }

    #[test]
    fn usb_only_by_default_and_sorted() {
        let devices = vec![
            usb("/dev/ttyUSB1"),
            DeviceInfo::named("/dev/ttyS0"),
            usb("/dev/ttyACM0"),
        ];
        let names: Vec<String> = filter_ports(devices, false)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["/dev/ttyACM0", "/dev/ttyUSB1"]);
    }

    #[test]
    fn all_keeps_every_port() {
        let devices = vec![usb("/dev/ttyACM0"), DeviceInfo::named("/dev/ttyS0")];
        assert_eq!(filter_ports(devices, true).len(), 2);
    }
}
