//! Flash a firmware image onto a board
//!
//! The [Flasher] validates the artifacts, performs the bootloader handshake
//! and hands over to the external flashing tool. Success is decided by the
//! tool's exit code alone.

use std::{io, process::Stdio};

use log::{debug, error, info};

use crate::{
    board::Board,
    command::{FlashParams, Invocation, ToolPaths},
    connection::{
        reset::{enter_bootloader, Handshake},
        SerialSignalDriver, SignalDriver,
    },
    error::Error,
};

/// Exit code reported when the flashing tool could not be found
pub const TOOL_NOT_FOUND: i32 = 127;

/// Outcome of a single flash attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashResult {
    pub success: bool,
    /// Space-joined command line, empty if no tool was run
    pub command: String,
    pub return_code: i32,
}

impl FlashResult {
    fn aborted() -> Self {
        Self {
            success: false,
            command: String::new(),
            return_code: 1,
        }
    }
}

/// Runs an external tool to completion and reports its exit code
pub trait ToolRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, Error>;
}

/// [ToolRunner] spawning a child process which shares our stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, Error> {
        debug!("Running command: {:?}", invocation);

        let status = invocation
            .to_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::ToolNotFound(invocation.program.clone()),
                _ => Error::ToolFailed(invocation.program.clone(), e),
            })?;

        // Terminated by a signal
        let exit_code = status.code().unwrap_or(1);
        debug!("Command exit code: {exit_code}");

        Ok(exit_code)
    }
}

/// Orchestrates a flash attempt for a single board
#[derive(Debug)]
pub struct Flasher<D = SerialSignalDriver, R = ProcessRunner> {
    tools: ToolPaths,
    driver: D,
    runner: R,
}

impl Flasher {
    pub fn new(tools: ToolPaths) -> Self {
        Self::with_backends(tools, SerialSignalDriver, ProcessRunner)
    }
}

impl<D: SignalDriver, R: ToolRunner> Flasher<D, R> {
    pub fn with_backends(tools: ToolPaths, driver: D, runner: R) -> Self {
        Self {
            tools,
            driver,
            runner,
        }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Flash `params.file` onto `board`.
    ///
    /// The port is never opened when an artifact is missing. A failed
    /// handshake is logged and flashing continues regardless.
    pub fn flash(&mut self, board: Board, params: &FlashParams) -> FlashResult {
        if let Some(missing) = params.artifacts(board).into_iter().find(|p| !p.exists()) {
            let err = if missing == params.file {
                Error::FirmwareNotFound(missing.to_path_buf())
            } else {
                Error::MappingFileNotFound(missing.to_path_buf())
            };
            error!("{err}");

            return FlashResult::aborted();
        }

        if let Handshake::Failed(_) = enter_bootloader(board, &mut self.driver, &params.port) {
            info!("Continuing without bootloader handshake, reset the board by hand if needed");
        }

        let invocation = Invocation::for_board(board, &self.tools, params);
        println!("$ {invocation}");

        let command = invocation.command_line();
        match self.runner.run(&invocation) {
            Ok(return_code) => FlashResult {
                success: return_code == 0,
                command,
                return_code,
            },
            Err(Error::ToolNotFound(program)) => {
                error!("Command not found: {program}");
                FlashResult {
                    success: false,
                    command,
                    return_code: TOOL_NOT_FOUND,
                }
            }
            Err(e) => {
                error!("{e}");
                FlashResult {
                    success: false,
                    command,
                    return_code: 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        command::Mapping,
        connection::reset::tests::{Event, RecordingDriver},
    };

    /// Returns a canned exit code and remembers what it was asked to run
    #[derive(Debug, Default)]
    struct FakeRunner {
        result: Option<i32>,
        runs: Vec<Invocation>,
    }

    impl FakeRunner {
        fn exiting_with(code: i32) -> Self {
            Self {
                result: Some(code),
                runs: Vec::new(),
            }
        }
    }

    impl ToolRunner for FakeRunner {
        fn run(&mut self, invocation: &Invocation) -> Result<i32, Error> {
            self.runs.push(invocation.clone());
            self.result
                .ok_or_else(|| Error::ToolNotFound(invocation.program.clone()))
        }
    }

    fn firmware(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, b":00000001FF\n").unwrap();
        path.display().to_string()
    }

    fn flasher(runner: FakeRunner) -> Flasher<RecordingDriver, FakeRunner> {
        Flasher::with_backends(ToolPaths::default(), RecordingDriver::default(), runner)
    }

    #[test]
    fn missing_firmware_never_touches_the_port() {
        let mut flasher = flasher(FakeRunner::exiting_with(0));
        let params = FlashParams::new("/dev/ttyACM0", "does/not/exist.hex");

        let result = flasher.flash(Board::Uno, &params);

        assert_eq!(
            result,
            FlashResult {
                success: false,
                command: String::new(),
                return_code: 1,
            }
        );
        assert!(flasher.driver.events.is_empty());
        assert!(flasher.runner.runs.is_empty());
    }

    #[test]
    fn missing_mapping_never_touches_the_port() {
        let dir = TempDir::new().unwrap();
        let mut flasher = flasher(FakeRunner::exiting_with(0));
        let mut params = FlashParams::new("/dev/ttyUSB0", firmware(&dir, "app.bin"));
        params.mappings = vec![Mapping::new(0x1000, dir.path().join("bootloader.bin"))];

        let result = flasher.flash(Board::Esp32, &params);

        assert!(!result.success);
        assert_eq!(result.return_code, 1);
        assert!(flasher.driver.events.is_empty());
        assert!(flasher.runner.runs.is_empty());
    }

    #[test]
    fn successful_flash() {
        let dir = TempDir::new().unwrap();
        let hex = firmware(&dir, "blink.hex");
        let mut flasher = flasher(FakeRunner::exiting_with(0));

        let result = flasher.flash(Board::Uno, &FlashParams::new("/dev/ttyACM0", &hex));

        assert!(result.success);
        assert_eq!(result.return_code, 0);
        assert_eq!(
            result.command,
            format!(
                "avrdude -v -p atmega328p -c arduino -P /dev/ttyACM0 -b 115200 -D -U flash:w:{hex}:i"
            )
        );
        // Handshake ran before the tool.
        assert_eq!(flasher.driver.events.first(), Some(&Event::Set(Some(true), None)));
        assert_eq!(flasher.runner.runs.len(), 1);
    }

    #[test]
    fn nonzero_exit_code_is_preserved() {
        let dir = TempDir::new().unwrap();
        let bin = firmware(&dir, "app.bin");
        let mut flasher = flasher(FakeRunner::exiting_with(2));

        let result = flasher.flash(Board::Esp32, &FlashParams::new("/dev/ttyUSB0", &bin));

        assert!(!result.success);
        assert_eq!(result.return_code, 2);
    }

    #[test]
    fn missing_tool_reports_127() {
        let dir = TempDir::new().unwrap();
        let bin = firmware(&dir, "app.bin");
        let mut flasher = flasher(FakeRunner::default());

        let result = flasher.flash(Board::Esp32, &FlashParams::new("/dev/ttyUSB0", &bin));

        assert!(!result.success);
        assert_eq!(result.return_code, TOOL_NOT_FOUND);
        assert!(result.command.starts_with("esptool.py --chip esp32"));
    }

    #[test]
    fn handshake_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let bin = firmware(&dir, "app.bin");
        let driver = RecordingDriver {
            fail_at: Some(0),
            ..Default::default()
        };
        let mut flasher =
            Flasher::with_backends(ToolPaths::default(), driver, FakeRunner::exiting_with(0));

        let result = flasher.flash(Board::Esp32, &FlashParams::new("/dev/ttyUSB0", &bin));

        assert!(result.success);
        assert!(flasher.driver.events.is_empty());
        assert_eq!(flasher.runner.runs.len(), 1);
    }

    #[test]
    fn process_runner_reports_missing_executable() {
        let invocation = Invocation {
            program: "boardflash-no-such-tool".into(),
            args: vec![],
        };

        let err = ProcessRunner.run(&invocation).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(program) if program == "boardflash-no-such-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_exit_code() {
        let invocation = Invocation {
            program: "sh".into(),
            args: vec!["-c".into(), "exit 3".into()],
        };

        assert_eq!(ProcessRunner.run(&invocation).unwrap(), 3);
    }
}
