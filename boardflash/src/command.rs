//! External flashing tool invocations
//!
//! The actual bootloader protocols are spoken by `avrdude` and `esptool.py`;
//! this module only builds their argument vectors.

use std::{
    fmt::{Display, Formatter},
    num::ParseIntError,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    board::{Board, DEFAULT_APP_OFFSET},
    error::Error,
};

/// Executables of the external flashing tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// AVR flashing tool
    pub avrdude: String,
    /// ESP32 flashing tool
    pub esptool: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            avrdude: "avrdude".into(),
            esptool: "esptool.py".into(),
        }
    }
}

/// Reasons a flash address is rejected
#[derive(Debug, thiserror::Error)]
pub enum ParseAddressError {
    #[error("address `{0}` is negative")]
    Negative(String),
    #[error("decimal address `{0}` has a leading zero, use a `0x`/`0o` prefix instead")]
    LeadingZero(String),
    #[error(transparent)]
    Invalid(#[from] ParseIntError),
}

/// Parse an unsigned integer in any base, e.g. `0x8000` or `32768`
pub fn parse_u32(input: &str) -> Result<u32, ParseAddressError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseAddressError::Negative(input.to_owned()));
    }

    // Plain decimal literals other than zero itself may not start with `0`.
    let decimal = input.bytes().all(|b| b.is_ascii_digit() || b == b'_');
    let nonzero = input.bytes().any(|b| matches!(b, b'1'..=b'9'));
    if decimal && nonzero && input.starts_with('0') {
        return Err(ParseAddressError::LeadingZero(input.to_owned()));
    }

    Ok(parse_int::parse(input)?)
}

/// Location in target flash memory where a binary blob is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub addr: u32,
    pub path: PathBuf,
}

impl Mapping {
    pub fn new(addr: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            path: path.into(),
        }
    }
}

impl FromStr for Mapping {
    type Err = Error;

    /// Parse a mapping given as `<addr>:<path>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMapping(s.to_owned());

        let (addr, path) = s.split_once(':').ok_or_else(invalid)?;
        let addr = parse_u32(addr.trim()).map_err(|_| invalid())?;
        if path.is_empty() {
            return Err(invalid());
        }

        Ok(Mapping::new(addr, path))
    }
}

/// Everything needed to flash one firmware image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashParams {
    /// Serial port of the target
    pub port: String,
    /// Firmware image: Intel HEX for the UNO, raw binary for the ESP32
    pub file: PathBuf,
    pub baud: Option<u32>,
    pub chip: Option<String>,
    /// ESP32 application offset
    pub offset: Option<u32>,
    /// ESP32 images written before the application, in order
    pub mappings: Vec<Mapping>,
}

impl FlashParams {
    pub fn new(port: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            port: port.into(),
            file: file.into(),
            baud: None,
            chip: None,
            offset: None,
            mappings: Vec::new(),
        }
    }

    pub fn baud(&self, board: Board) -> u32 {
        self.baud.unwrap_or_else(|| board.default_baud())
    }

    pub fn chip(&self, board: Board) -> &str {
        self.chip.as_deref().unwrap_or_else(|| board.default_chip())
    }

    /// The full ESP32 write list: extra mappings first, application last.
    pub fn esp32_mappings(&self) -> Vec<Mapping> {
        let app = Mapping::new(self.offset.unwrap_or(DEFAULT_APP_OFFSET), &self.file);

        self.mappings
            .iter()
            .cloned()
            .chain(std::iter::once(app))
            .collect()
    }

    /// Every file which must exist before the board is touched
    pub fn artifacts(&self, board: Board) -> Vec<&Path> {
        let mut files = vec![self.file.as_path()];
        if board == Board::Esp32 {
            files.extend(self.mappings.iter().map(|m| m.path.as_path()));
        }
        files
    }
}

/// A fully formed external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build the tool invocation flashing `params` onto `board`.
    pub fn for_board(board: Board, tools: &ToolPaths, params: &FlashParams) -> Self {
        match board {
            Board::Uno => avrdude(
                tools,
                &params.port,
                &params.file,
                params.baud(board),
                params.chip(board),
            ),
            Board::Esp32 => esptool(
                tools,
                &params.port,
                params.baud(board),
                params.chip(board),
                &params.esp32_mappings(),
            ),
        }
    }

    /// The program followed by its arguments, joined by single spaces
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Shell-quoted form, suitable for copy and paste
impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let words = std::iter::once(&self.program)
            .chain(&self.args)
            .map(|word| shell_quote(word))
            .collect::<Vec<_>>();

        write!(f, "{}", words.join(" "))
    }
}

fn shell_quote(word: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);

    if word.is_empty() {
        "''".into()
    } else if word.chars().all(is_safe) {
        word.into()
    } else {
        format!("'{}'", word.replace('\'', r#"'"'"'"#))
    }
}

/// `avrdude` invocation writing an Intel HEX file through the Arduino
/// bootloader, without erasing the chip first.
pub fn avrdude(tools: &ToolPaths, port: &str, hex: &Path, baud: u32, mcu: &str) -> Invocation {
    let args = [
        "-v".to_owned(),
        "-p".to_owned(),
        mcu.to_owned(),
        "-c".to_owned(),
        "arduino".to_owned(),
        "-P".to_owned(),
        port.to_owned(),
        "-b".to_owned(),
        baud.to_string(),
        "-D".to_owned(),
        "-U".to_owned(),
        format!("flash:w:{}:i", hex.display()),
    ];

    Invocation {
        program: tools.avrdude.clone(),
        args: args.into(),
    }
}

/// `esptool.py` invocation writing each mapping, in order, with compression.
pub fn esptool(
    tools: &ToolPaths,
    port: &str,
    baud: u32,
    chip: &str,
    mappings: &[Mapping],
) -> Invocation {
    let mut args = vec![
        "--chip".to_owned(),
        chip.to_owned(),
        "--port".to_owned(),
        port.to_owned(),
        "--baud".to_owned(),
        baud.to_string(),
        "write_flash".to_owned(),
        "-z".to_owned(),
    ];

    for mapping in mappings {
        args.push(format!("{:#x}", mapping.addr));
        args.push(mapping.path.display().to_string());
    }

    Invocation {
        program: tools.esptool.clone(),
        args,
    }
}
