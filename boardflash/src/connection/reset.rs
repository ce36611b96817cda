//! Sequences which put a board into its serial bootloader
//!
//! Each call to the [SignalDriver] re-opens the port, so a line only keeps its
//! level between steps as far as the adapter's idle behaviour allows.

use std::{fmt, time::Duration};

use log::{debug, warn};

use super::SignalDriver;
use crate::{board::Board, error::ConnectionError};

/// Some strategy for resetting a target device into its bootloader
pub trait ResetStrategy: fmt::Debug {
    fn reset(&self, driver: &mut dyn SignalDriver, port: &str) -> Result<(), ConnectionError>;

    fn set_dtr(
        &self,
        driver: &mut dyn SignalDriver,
        port: &str,
        level: bool,
    ) -> Result<(), ConnectionError> {
        driver.set_signals(port, Some(level), None)
    }

    fn set_rts(
        &self,
        driver: &mut dyn SignalDriver,
        port: &str,
        level: bool,
    ) -> Result<(), ConnectionError> {
        driver.set_signals(port, None, Some(level))
    }

    fn set_dtr_rts(
        &self,
        driver: &mut dyn SignalDriver,
        port: &str,
        dtr_level: bool,
        rts_level: bool,
    ) -> Result<(), ConnectionError> {
        driver.set_signals(port, Some(dtr_level), Some(rts_level))
    }
}

/// Reset pulse on DTR, which Optiboot watches for after power-on.
#[derive(Debug, Clone, Copy)]
pub struct ClassicReset;

impl ResetStrategy for ClassicReset {
    fn reset(&self, driver: &mut dyn SignalDriver, port: &str) -> Result<(), ConnectionError> {
        debug!("Using Classic reset strategy on {port}");

        self.set_dtr(driver, port, true)?;
        driver.wait(Duration::from_millis(50));

        self.set_dtr(driver, port, false)?;
        driver.wait(Duration::from_millis(200)); // bootloader window

        Ok(())
    }
}

/// Two-wire auto reset used by most ESP32 dev boards, with DTR wired to IO0
/// and RTS wired to EN.
#[derive(Debug, Clone, Copy)]
pub struct AutoReset;

impl ResetStrategy for AutoReset {
    fn reset(&self, driver: &mut dyn SignalDriver, port: &str) -> Result<(), ConnectionError> {
        debug!("Using Auto reset strategy on {port}");

        self.set_dtr_rts(driver, port, true, true)?; // IO0 = LOW, EN = LOW, chip in reset
        driver.wait(Duration::from_millis(50));

        self.set_rts(driver, port, false)?; // EN = HIGH, chip out of reset
        driver.wait(Duration::from_millis(50));

        self.set_dtr(driver, port, false)?; // IO0 = HIGH, done
        driver.wait(Duration::from_millis(100));

        Ok(())
    }
}

/// Construct the reset strategy used to enter the bootloader of `board`.
pub fn reset_strategy(board: Board) -> Box<dyn ResetStrategy> {
    match board {
        Board::Uno => Box::new(ClassicReset),
        Board::Esp32 => Box::new(AutoReset),
    }
}

/// Outcome of a best-effort bootloader handshake
#[derive(Debug)]
#[must_use]
pub enum Handshake {
    /// Every step of the sequence was applied
    Entered,
    /// The sequence was aborted; flashing may still succeed if the board is
    /// reset by hand
    Failed(ConnectionError),
}

impl Handshake {
    pub fn is_entered(&self) -> bool {
        matches!(self, Handshake::Entered)
    }
}

/// Try to put the board on `port` into its bootloader.
///
/// Failures are logged and returned as [Handshake::Failed], never as an error.
pub fn enter_bootloader(board: Board, driver: &mut dyn SignalDriver, port: &str) -> Handshake {
    let strategy = reset_strategy(board);

    match strategy.reset(driver, port) {
        Ok(()) => Handshake::Entered,
        Err(e) => {
            warn!("Failed to toggle DTR/RTS for {}: {e}", board.tag());
            Handshake::Failed(e)
        }
    }
}
