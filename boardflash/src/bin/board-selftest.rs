use std::{process::ExitCode, time::Duration};

use boardflash::{
    cli::logging::{initialize_logger, level_for_verbosity},
    selftest::{self, DEFAULT_BAUD},
};
use clap::Parser;
use crossterm::style::Stylize;
use log::debug;
use miette::Report;

/// Read a flashed board's self-test report over serial
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Serial port; common device names are probed when omitted
    port: Option<String>,
    /// Baud rate of the board's UART
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,
    /// Seconds to wait for the `TEST:END` line
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    miette::set_panic_hook();

    let args = Cli::parse();
    initialize_logger(level_for_verbosity(args.verbose));
    debug!("{:#?}", args);

    let report = args
        .port
        .map_or_else(selftest::find_port, Ok)
        .and_then(|port| selftest::run(&port, args.baud, Duration::from_secs(args.timeout)));

    match report {
        Ok(report) if report.passed => {
            println!("RESULT: {}", "PASS".green());
            ExitCode::SUCCESS
        }
        Ok(_) => {
            println!("RESULT: {}", "FAIL".red());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{:?}", Report::new(e));
            ExitCode::FAILURE
        }
    }
}
