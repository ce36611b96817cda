//! Firmware self-test runner
//!
//! A freshly flashed board prints its self-test results over UART, one
//! result per line. The runner collects those lines until the firmware
//! reports `TEST:END` or the timeout expires, then checks for the GPIO and
//! I2C success markers.
//!
//! The GPIO marker has to match a whole line, while the I2C marker only has to
//! be contained in one, since the firmware may append details after it.

use std::{
    io::{ErrorKind, Read},
    time::{Duration, Instant},
};

use log::{debug, info};
use serialport::FlowControl;

use crate::error::Error;

/// Line printed by the firmware when the GPIO loopback test succeeds
pub const GPIO_PASS: &str = "TEST:GPIO:PASS";
/// Prefix of the line printed when the I2C probe succeeds
pub const I2C_PASS: &str = "TEST:I2C:PASS";
/// Last line of the self-test output
pub const END_SENTINEL: &str = "TEST:END";

pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ports tried, in order, when none was specified
pub const CANDIDATE_PORTS: &[&str] = &["/dev/ttyACM0", "/dev/ttyUSB0", "/dev/tty.usbserial", "COM3"];

/// Upper bound of a single blocking read, so the overall timeout is honoured
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Result of a self-test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub passed: bool,
    /// Every non-empty line received, in order
    pub lines: Vec<String>,
}

impl SelfTestReport {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            passed: evaluate(&lines),
            lines,
        }
    }
}

/// Check the captured lines for both success markers
pub fn evaluate(lines: &[String]) -> bool {
    lines.iter().any(|line| line == GPIO_PASS) && lines.iter().any(|line| line.contains(I2C_PASS))
}

/// Decode a raw line, dropping invalid UTF-8 and surrounding whitespace.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Read newline-delimited lines from `reader` until [END_SENTINEL] is seen or
/// `timeout` elapses.
///
/// Reads which time out are retried; a partial line pending when a read times
/// out is taken as a complete line. End of stream means the device went away
/// and is reported as [ErrorKind::UnexpectedEof]. `on_line` is called for every captured
/// line.
pub fn collect_lines<R: Read>(
    mut reader: R,
    timeout: Duration,
    mut on_line: impl FnMut(&str),
) -> std::io::Result<Vec<String>> {
    let start = Instant::now();
    let mut lines = Vec::new();
    let mut pending = Vec::new();
    let mut buff = [0; 256];

    let mut push = |raw: &[u8], lines: &mut Vec<String>| -> bool {
        let line = decode_line(raw);
        if line.is_empty() {
            return false;
        }

        on_line(&line);
        let done = line == END_SENTINEL;
        lines.push(line);
        done
    };

    while start.elapsed() < timeout {
        let read_count = match reader.read(&mut buff) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "serial port closed during the self-test",
                ))
            }
            Ok(count) => count,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                if !pending.is_empty() && push(&pending, &mut lines) {
                    return Ok(lines);
                }
                pending.clear();
                continue;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        for &byte in &buff[..read_count] {
            if byte == b'\n' {
                if push(&pending, &mut lines) {
                    return Ok(lines);
                }
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }

    debug!("Self-test timed out after {:?}", timeout);
    Ok(lines)
}

/// Open `port` and run the self-test, echoing each line as `>> <line>`.
pub fn run(port: &str, baud: u32, timeout: Duration) -> Result<SelfTestReport, Error> {
    info!("Reading self-test output from {port} at {baud} baud");

    let serial = serialport::new(port, baud)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()?;

    let lines = collect_lines(serial, timeout, |line| println!(">> {line}"))?;

    Ok(SelfTestReport::from_lines(lines))
}

/// Return the first of [CANDIDATE_PORTS] which can be opened.
pub fn find_port() -> Result<String, Error> {
    CANDIDATE_PORTS
        .iter()
        .find(|port| {
            serialport::new(**port, DEFAULT_BAUD)
                .timeout(Duration::from_secs(1))
                .open()
                .is_ok()
        })
        .map(|port| port.to_string())
        .ok_or(Error::NoSerial)
}
