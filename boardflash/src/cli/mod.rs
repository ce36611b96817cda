//! CLI utilities shared between boardflash and board-selftest
//!
//! No stability guaranties apply

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::Args;
use crossterm::style::Stylize;
use log::debug;

use self::{config::Config, serial::get_serial_port};
use crate::{
    board::{detect, Board},
    command::{parse_u32, FlashParams, Mapping, ToolPaths},
    error::Error,
    flasher::Flasher,
    port::{list_ports, PortInfo, UsbIds},
};

pub mod config;
pub mod logging;

mod serial;

/// Arguments selecting the serial port
#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Serial port, e.g. COM7 or /dev/ttyUSB0
    #[arg(short = 'p', long)]
    pub port: Option<String>,
}

/// Locations of the external flashing tools
#[derive(Debug, Args)]
pub struct ToolArgs {
    /// avrdude executable used to flash the UNO
    #[arg(long, env = "AVRDUDE")]
    pub avrdude: Option<String>,
    /// esptool executable used to flash the ESP32
    #[arg(long, env = "ESPTOOL")]
    pub esptool: Option<String>,
}

impl ToolArgs {
    /// Command-line and environment values take precedence over the
    /// configuration file.
    pub fn resolve(&self, config: &Config) -> ToolPaths {
        ToolPaths {
            avrdude: self
                .avrdude
                .clone()
                .unwrap_or_else(|| config.tools.avrdude.clone()),
            esptool: self
                .esptool
                .clone()
                .unwrap_or_else(|| config.tools.esptool.clone()),
        }
    }
}

/// Flash firmware onto a board
#[derive(Debug, Args)]
pub struct FlashArgs {
    /// Target board type, detected from the USB IDs when omitted
    #[arg(short = 'b', long, value_enum)]
    pub board: Option<Board>,
    #[command(flatten)]
    pub connect_args: ConnectArgs,
    /// Path to firmware (HEX for UNO, BIN for ESP32)
    #[arg(short = 'f', long)]
    pub file: PathBuf,
    /// Baud rate (default 115200 for UNO, 921600 for ESP32)
    #[arg(long)]
    pub baud: Option<u32>,
    /// Target chip (atmega328p for UNO; esp32, esp32s2, esp32c3, ... for ESP32)
    #[arg(long)]
    pub chip: Option<String>,
    /// ESP32 application offset [default: 0x10000]
    #[arg(long, value_parser = parse_u32)]
    pub esp32_offset: Option<u32>,
    /// Add an address:file mapping written before the application (ESP32),
    /// e.g. `--esp32-mapping 0x1000:bootloader.bin --esp32-mapping 0x8000:partitions.bin`
    #[arg(long, value_name = "ADDR:FILE")]
    pub esp32_mapping: Vec<String>,
    #[command(flatten)]
    pub tool_args: ToolArgs,
}

/// Print the available serial ports to stdout
pub fn print_ports() -> io::Result<()> {
    let ports = list_ports();
    write_ports(&mut io::stdout().lock(), &ports)
}

fn write_ports(out: &mut impl Write, ports: &[PortInfo]) -> io::Result<()> {
    writeln!(out, "Available serial ports:\n")?;

    for port in ports {
        writeln!(
            out,
            "  {:>12}  | {} | {}",
            port.device,
            UsbIds(port),
            port.description
        )?;
    }
    if ports.is_empty() {
        writeln!(out, "  (none found)")?;
    }

    Ok(())
}

/// Resolve port and board, flash the firmware and report the outcome.
///
/// Returns the process exit code: 0 on success, 1 when flashing failed.
pub fn flash(args: FlashArgs, config: &Config) -> Result<u8, Error> {
    let port = get_serial_port(&args.connect_args, config)?;

    let board = match args.board {
        Some(board) => board,
        None => {
            let board = detect(&list_ports(), Some(&port)).ok_or(Error::BoardNotDetected)?;
            println!("[*] Auto-detected board: {board}");
            board
        }
    };

    let mut params = FlashParams::new(&port, &args.file);
    params.baud = Some(args.baud.unwrap_or_else(|| board.default_baud()));
    params.chip = args.chip;

    // Mappings only mean something to the ESP32, so they are not even parsed
    // for other boards.
    if board == Board::Esp32 {
        let mappings = args
            .esp32_mapping
            .iter()
            .map(|mapping| mapping.parse::<Mapping>())
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(missing) = mappings.iter().find(|m| !m.path.exists()) {
            return Err(Error::MappingFileNotFound(missing.path.clone()));
        }
        params.offset = args.esp32_offset;
        params.mappings = mappings;
    }

    let tools = args.tool_args.resolve(config);
    debug!("Flashing {board} with {:?}", params);

    match board {
        Board::Esp32 => println!(
            "[*] Flashing {} ({}) on {} at {}...",
            board.product_name(),
            params.chip(board),
            port,
            params.baud(board)
        ),
        Board::Uno => println!(
            "[*] Flashing {} on {} at {}...",
            board.product_name(),
            port,
            params.baud(board)
        ),
    }

    let result = Flasher::new(tools).flash(board, &params);

    if result.success {
        println!("{}", format!("[✓] Flash successful ({})", board.tag()).green());
        Ok(0)
    } else {
        println!(
            "{}",
            format!(
                "[x] Flash failed ({}). Return code: {}",
                board.tag(),
                result.return_code
            )
            .red()
        );
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn port_listing() {
        let ports = vec![
            PortInfo::new("/dev/ttyACM0", "Arduino Uno").with_ids(0x2341, 0x0043),
            PortInfo::new("/dev/ttyS0", "n/a"),
        ];

        let mut out = Vec::new();
        write_ports(&mut out, &ports).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Available serial ports:\n\n\
             \x20 /dev/ttyACM0  | VID:PID=2341:0043 | Arduino Uno\n\
             \x20   /dev/ttyS0  | VID:PID=unknown | n/a\n"
        );
    }

    #[test]
    fn empty_port_listing() {
        let mut out = Vec::new();
        write_ports(&mut out, &[]).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Available serial ports:\n\n  (none found)\n"
        );
    }

    #[test]
    fn tool_args_take_precedence() {
        let mut config = Config::default();
        config.tools.esptool = "/opt/esp/esptool".into();

        let args = ToolArgs {
            avrdude: Some("/usr/local/bin/avrdude".into()),
            esptool: None,
        };

        assert_eq!(
            args.resolve(&config),
            ToolPaths {
                avrdude: "/usr/local/bin/avrdude".into(),
                esptool: "/opt/esp/esptool".into(),
            }
        );
    }
}
