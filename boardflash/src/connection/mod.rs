//! Control-line access to a target device
//!
//! Boards are forced into their bootloaders by toggling the DTR and RTS
//! modem-control lines of the serial adapter. The [SignalDriver] trait
//! abstracts over how those lines are driven; [SerialSignalDriver] does so
//! through a real serial port.

use std::{io::Write, thread::sleep, time::Duration};

use log::trace;
use serialport::{FlowControl, SerialPort};

use crate::error::ConnectionError;

pub mod reset;

/// Baud rate used when opening a port only to toggle its control lines
const HANDSHAKE_BAUD: u32 = 115_200;
/// Time to hold the lines after changing them, before the port is closed
const SETTLE_DELAY: Duration = Duration::from_millis(50);
/// Read/write timeout of the short-lived handshake connection
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Something able to drive the DTR and RTS lines of a serial port
pub trait SignalDriver {
    /// Open `port`, set each line which is `Some`, and close the port again.
    ///
    /// Lines which are `None` are left untouched.
    fn set_signals(
        &mut self,
        port: &str,
        dtr: Option<bool>,
        rts: Option<bool>,
    ) -> Result<(), ConnectionError>;

    /// Pause between two steps of a sequence
    fn wait(&mut self, duration: Duration) {
        sleep(duration);
    }
}

/// [SignalDriver] backed by the host's serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialSignalDriver;

impl SerialSignalDriver {
    fn open(port: &str) -> Result<Box<dyn SerialPort>, ConnectionError> {
        let serial = serialport::new(port, HANDSHAKE_BAUD)
            .flow_control(FlowControl::None)
            .timeout(PORT_TIMEOUT)
            .open()?;

        Ok(serial)
    }
}

impl SignalDriver for SerialSignalDriver {
    fn set_signals(
        &mut self,
        port: &str,
        dtr: Option<bool>,
        rts: Option<bool>,
    ) -> Result<(), ConnectionError> {
        trace!("Setting control lines on {port}: DTR={dtr:?} RTS={rts:?}");

        // The port is closed when `serial` is dropped, including on error.
        let mut serial = Self::open(port)?;

        if let Some(level) = dtr {
            serial.write_data_terminal_ready(level)?;
        }
        if let Some(level) = rts {
            serial.write_request_to_send(level)?;
        }

        serial.flush()?;
        sleep(SETTLE_DELAY);

        Ok(())
    }
}
