//! Supported boards and best-effort board detection

use strum::{Display, EnumString, VariantNames};

use crate::port::PortInfo;

/// USB vendor IDs used by genuine Arduino boards
const ARDUINO_VIDS: &[u16] = &[
    0x2341, // Arduino SA
    0x2a03, // Arduino Srl
];

/// USB-to-serial bridges commonly found on ESP32 dev boards. These are shared
/// with plenty of unrelated hardware, so they only count when the port
/// description agrees.
const ESP_BRIDGE_VIDS: &[u16] = &[
    0x1a86, // QinHeng Electronics CH34x
    0x10c4, // Silicon Labs CP210x
    0x0403, // FTDI
    0x303a, // Espressif
];

/// Description fragments (upper case) which corroborate an ESP32 bridge
const ESP_DESCRIPTION_HINTS: &[&str] = &["ESP32", "CP210", "ESPRESSIF"];

/// Default application offset on ESP32 flash
pub const DEFAULT_APP_OFFSET: u32 = 0x10000;

/// A board family which can be flashed
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[non_exhaustive]
#[strum(serialize_all = "lowercase")]
pub enum Board {
    /// Arduino UNO (ATmega328P, Optiboot)
    Uno,
    /// ESP32 family
    Esp32,
}

impl Board {
    /// Baud rate used when none was requested
    pub fn default_baud(&self) -> u32 {
        match self {
            Board::Uno => 115_200,
            Board::Esp32 => 921_600,
        }
    }

    /// Target chip used when none was requested
    pub fn default_chip(&self) -> &'static str {
        match self {
            Board::Uno => "atmega328p",
            Board::Esp32 => "esp32",
        }
    }

    /// Short upper-case tag used in result messages
    pub fn tag(&self) -> &'static str {
        match self {
            Board::Uno => "UNO",
            Board::Esp32 => "ESP32",
        }
    }

    /// Full product name
    pub fn product_name(&self) -> &'static str {
        match self {
            Board::Uno => "Arduino UNO",
            Board::Esp32 => "ESP32",
        }
    }
}

/// Guess the board connected to `requested` (or to any port, when `None`).
///
/// A genuine Arduino vendor ID wins outright. A generic bridge chip only
/// classifies the board as an ESP32 when the description also hints at it.
pub fn detect(ports: &[PortInfo], requested: Option<&str>) -> Option<Board> {
    let candidates = ports
        .iter()
        .filter(|port| requested.is_none_or(|name| port.device == name))
        .collect::<Vec<_>>();

    let is_arduino = |port: &&PortInfo| port.vid.is_some_and(|vid| ARDUINO_VIDS.contains(&vid));
    if candidates.iter().any(is_arduino) {
        return Some(Board::Uno);
    }

    let is_esp32 = |port: &&PortInfo| {
        let bridge = port.vid.is_some_and(|vid| ESP_BRIDGE_VIDS.contains(&vid));
        let description = port.description.to_uppercase();

        bridge && ESP_DESCRIPTION_HINTS.iter().any(|hint| description.contains(hint))
    };
    if candidates.iter().any(is_esp32) {
        return Some(Board::Esp32);
    }

    None
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn ports() -> Vec<PortInfo> {
        vec![
            PortInfo::new("/dev/ttyS0", "n/a"),
            PortInfo::new("/dev/ttyUSB0", "CP2102 USB to UART Bridge Controller")
                .with_ids(0x10c4, 0xea60),
            PortInfo::new("/dev/ttyACM0", "Arduino Uno").with_ids(0x2341, 0x0043),
        ]
    }

    #[test]
    fn arduino_vendor_id_wins() {
        assert_eq!(detect(&ports(), None), Some(Board::Uno));
        assert_eq!(detect(&ports(), Some("/dev/ttyACM0")), Some(Board::Uno));
    }

    #[test]
    fn vendor_id_beats_matching_description() {
        let ports = vec![PortInfo::new("/dev/ttyACM0", "ESP32 Espressif CP2102").with_ids(0x2a03, 1)];
        assert_eq!(detect(&ports, None), Some(Board::Uno));
    }

    #[test]
    fn bridge_needs_description_hint() {
        assert_eq!(detect(&ports(), Some("/dev/ttyUSB0")), Some(Board::Esp32));

        let ports = vec![PortInfo::new("/dev/ttyUSB0", "USB2.0-Serial").with_ids(0x1a86, 0x7523)];
        assert_eq!(detect(&ports, None), None);

        let ports = vec![PortInfo::new("/dev/ttyUSB0", "usb jtag/serial debug unit (espressif)")
            .with_ids(0x303a, 0x1001)];
        assert_eq!(detect(&ports, None), Some(Board::Esp32));
    }

    #[test]
    fn description_without_bridge_is_ignored() {
        let ports = vec![PortInfo::new("/dev/ttyUSB0", "ESP32 clone").with_ids(0x067b, 0x2303)];
        assert_eq!(detect(&ports, None), None);

        let ports = vec![PortInfo::new("/dev/ttyUSB0", "ESP32 clone")];
        assert_eq!(detect(&ports, None), None);
    }

    #[test]
    fn requested_port_filters_candidates() {
        assert_eq!(detect(&ports(), Some("/dev/ttyS0")), None);
        assert_eq!(detect(&ports(), Some("/dev/ttyUSB9")), None);
        assert_eq!(detect(&[], None), None);
    }

    #[test]
    fn board_defaults() {
        assert_eq!(Board::Uno.default_baud(), 115_200);
        assert_eq!(Board::Esp32.default_baud(), 921_600);
        assert_eq!(Board::Uno.default_chip(), "atmega328p");
        assert_eq!(Board::Esp32.default_chip(), "esp32");
        assert_eq!(Board::from_str("esp32").unwrap(), Board::Esp32);
        assert_eq!(Board::Uno.to_string(), "uno");
    }
}
