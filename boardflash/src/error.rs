//! Library and application errors

use std::{io, path::PathBuf};

use miette::Diagnostic;
use strum::VariantNames;
use thiserror::Error;

use crate::board::Board;

/// All possible errors returned by boardflash
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Could not auto-detect the connected board")]
    #[diagnostic(
        code(boardflash::board_not_detected),
        help("Please specify the board explicitly with `--board {}`", Board::VARIANTS.join("|"))
    )]
    BoardNotDetected,

    #[error("Firmware file not found: {}", .0.display())]
    #[diagnostic(
        code(boardflash::firmware_not_found),
        help("Check the path passed with `--file`; the board is not reset when the firmware is missing")
    )]
    FirmwareNotFound(PathBuf),

    #[error("Invalid mapping: {0}")]
    #[diagnostic(
        code(boardflash::invalid_mapping),
        help("Use the format `0xADDR:path.bin`, e.g. `--esp32-mapping 0x1000:bootloader.bin`")
    )]
    InvalidMapping(String),

    #[error("Mapping file not found: {}", .0.display())]
    #[diagnostic(code(boardflash::mapping_not_found))]
    MappingFileNotFound(PathBuf),

    #[error("Invalid configuration file {}: {}", .0.display(), .1)]
    #[diagnostic(code(boardflash::invalid_config))]
    InvalidConfig(PathBuf, String),

    #[error("No serial ports could be detected")]
    #[diagnostic(
        code(boardflash::no_serial),
        help("Make sure you have connected a device to the host system, or use `--port` to specify one")
    )]
    NoSerial,

    #[error("Command not found: {0}")]
    #[diagnostic(
        code(boardflash::tool_not_found),
        help("Install the tool, or point the AVRDUDE/ESPTOOL environment variables at it")
    )]
    ToolNotFound(String),

    #[error("Failed to run {0}")]
    #[diagnostic(code(boardflash::tool_failed))]
    ToolFailed(String, #[source] io::Error),

    #[error("Error while communicating with the device")]
    #[diagnostic(transparent)]
    Connection(#[source] ConnectionError),
}

impl Error {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::BoardNotDetected
            | Error::InvalidMapping(_)
            | Error::MappingFileNotFound(_)
            | Error::NoSerial => 2,
            _ => 1,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Connection(err.into())
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Connection(err.into())
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Self::Connection(err)
    }
}

/// Connection-related errors
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("Serial port not found")]
    #[diagnostic(
        code(boardflash::device_not_found),
        help("Ensure that the device is connected and your host recognizes the serial adapter")
    )]
    DeviceNotFound,

    #[error("Permission denied while opening the serial port")]
    #[diagnostic(
        code(boardflash::permission_denied),
        help("Add your user to the group owning the device (often `dialout` or `uucp`)")
    )]
    PermissionDenied,

    #[error("IO error while using serial port: {0}")]
    #[diagnostic(code(boardflash::serial_error))]
    Serial(#[source] serialport::Error),
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        from_error_kind(err.kind(), err)
    }
}

impl From<serialport::Error> for ConnectionError {
    fn from(err: serialport::Error) -> Self {
        use serialport::ErrorKind;

        match err.kind() {
            ErrorKind::Io(kind) => from_error_kind(kind, err),
            ErrorKind::NoDevice => ConnectionError::DeviceNotFound,
            _ => ConnectionError::Serial(err),
        }
    }
}

fn from_error_kind<E: Into<serialport::Error>>(kind: io::ErrorKind, err: E) -> ConnectionError {
    use io::ErrorKind;

    match kind {
        ErrorKind::NotFound => ConnectionError::DeviceNotFound,
        ErrorKind::PermissionDenied => ConnectionError::PermissionDenied,
        _ => ConnectionError::Serial(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(Error::BoardNotDetected.exit_code(), 2);
        assert_eq!(Error::NoSerial.exit_code(), 2);
        assert_eq!(Error::InvalidMapping("bogus".into()).exit_code(), 2);
        assert_eq!(
            Error::MappingFileNotFound(PathBuf::from("boot.bin")).exit_code(),
            2
        );
    }

    #[test]
    fn other_errors_exit_with_one() {
        assert_eq!(
            Error::FirmwareNotFound(PathBuf::from("app.hex")).exit_code(),
            1
        );
        assert_eq!(Error::ToolNotFound("avrdude".into()).exit_code(), 1);
    }

    #[test]
    fn invalid_config_message() {
        let err = Error::InvalidConfig(PathBuf::from("boardflash.toml"), "expected `=`".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration file boardflash.toml: expected `=`"
        );
    }

    #[test]
    fn io_errors_map_to_connection_errors() {
        let err = ConnectionError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ConnectionError::PermissionDenied));

        let err = ConnectionError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, ConnectionError::DeviceNotFound));
    }
}
