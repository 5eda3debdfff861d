#![forbid(unsafe_code)]

//! Entry point: parse args, initialize logging, run the demonstration.

mod cli;
mod error;
mod harness;

use std::io::Write;

use cli::CliAction;
use error::Result;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}

fn run_from_env() -> Result<()> {
    match cli::parse_from_env()? {
        CliAction::ShowHelp => {
            print!("{}", cli::help_text());
            Ok(())
        }
        CliAction::ShowVersion => {
            println!("{}", cli::version_text());
            Ok(())
        }
        CliAction::Run(config) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let report = harness::run(&config, &mut out)?;
            writeln!(out)?;
            writeln!(out, "{report}")?;
            Ok(())
        }
    }
}
