//! Flash firmware onto Arduino UNO and ESP32 boards over serial
//!
//! `boardflash` forces a board into its serial bootloader by toggling the
//! DTR/RTS control lines, then hands the actual transfer over to `avrdude` or
//! `esptool.py`. The companion `board-selftest` binary reads the self-test
//! report a flashed board prints over UART.
//!
//! ## As an application
//!
//! ```bash
//! $ cargo install boardflash
//! ```
//!
//! ## As a library
//!
//! The library is usable without the `cli` feature:
//!
//! ```toml
//! boardflash = { version = "0.1", default-features = false }
//! ```

pub use self::{
    board::{detect, Board},
    command::{FlashParams, Invocation, Mapping, ToolPaths},
    error::{ConnectionError, Error},
    flasher::{FlashResult, Flasher},
    port::{list_ports, PortInfo},
};

pub mod board;
#[cfg(feature = "cli")]
pub mod cli;
pub mod command;
pub mod connection;
pub mod error;
pub mod flasher;
pub mod port;
pub mod selftest;
