use std::process::ExitCode;

use boardflash::cli::{
    self,
    config::Config,
    logging::{initialize_logger, level_for_verbosity},
    FlashArgs,
};
use clap::{Parser, Subcommand};
use log::debug;
use miette::Report;

#[derive(Debug, Parser)]
#[command(about = "Custom firmware loader for Arduino UNO & ESP32", version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List serial ports
    List,
    /// Flash firmware
    Flash(FlashArgs),
}

fn main() -> ExitCode {
    miette::set_panic_hook();

    // Attempt to parse any provided command-line arguments, or print the help
    // message and terminate if the invocation is not correct.
    let args = Cli::parse();
    initialize_logger(level_for_verbosity(args.verbose));
    debug!("{:#?}", args);

    match run(args.subcommand) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", Report::new(e));
            ExitCode::from(code)
        }
    }
}

fn run(subcommand: Commands) -> Result<u8, boardflash::Error> {
    match subcommand {
        Commands::List => {
            // Listing is informational only and always succeeds.
            if let Err(e) = cli::print_ports() {
                debug!("Failed to print serial ports: {e}");
            }
            Ok(0)
        }
        Commands::Flash(args) => {
            // Load any user configuration, if present.
            let config = Config::load()?;
            cli::flash(args, &config)
        }
    }
}
