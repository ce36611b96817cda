//! Serial port enumeration

use std::fmt::{Display, Formatter};

use log::debug;
use serialport::{available_ports, SerialPortInfo, SerialPortType};

/// Snapshot of a serial device reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM7`
    pub device: String,
    /// Human readable description of the device
    pub description: String,
    /// USB vendor ID, if known
    pub vid: Option<u16>,
    /// USB product ID, if known
    pub pid: Option<u16>,
}

impl PortInfo {
    pub fn new(device: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
            vid: None,
            pid: None,
        }
    }

    /// Attach USB vendor and product IDs
    pub fn with_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                device: info.port_name,
                description: usb.product.or(usb.manufacturer).unwrap_or_default(),
                vid: Some(usb.vid),
                pid: Some(usb.pid),
            },
            SerialPortType::PciPort => PortInfo::new(info.port_name, "PCI serial port"),
            SerialPortType::BluetoothPort => PortInfo::new(info.port_name, "Bluetooth serial port"),
            SerialPortType::Unknown => PortInfo::new(info.port_name, "n/a"),
        }
    }
}

/// Formats the `VID:PID=XXXX:XXXX` column of the port listing
pub struct UsbIds<'a>(pub &'a PortInfo);

impl Display for UsbIds<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.0.vid, self.0.pid) {
            (Some(vid), Some(pid)) => write!(f, "VID:PID={vid:04X}:{pid:04X}"),
            _ => write!(f, "VID:PID=unknown"),
        }
    }
}

/// Enumerate the serial ports currently known to the operating system.
///
/// Enumeration errors are swallowed and reported as an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    match available_ports() {
        Ok(ports) => ports.into_iter().map(PortInfo::from).collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        }
    }
}
