#![forbid(unsafe_code)]

//! Command-line argument parsing for the tearing demo.
//!
//! Parses args manually (no external dependencies) to keep the binary
//! lean. Supports environment variable overrides via `TEARLAB_*` prefix.

use std::env;

use crate::error::{DemoError, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
tearlab-demo — UI tearing demonstration: uncoordinated vs synchronized store reads

Runs two panels of three consumers each against identical pointer-move
scripts. The uncoordinated panel reads the store directly and commits torn
frames; the synchronized panel uses the coordinated re-check protocol and
never does.

USAGE:
    tearlab-demo [OPTIONS]

OPTIONS:
    --trials=N           Number of trials to run (default: 5)
    --moves=N            Pointer-move events per trial (default: 4)
    --render-delay-us=N  Busy-wait per consumer render, microseconds (default: 200)
    --quiet              Only print the final report
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT:
    TEARLAB_TRIALS, TEARLAB_MOVES, TEARLAB_RENDER_DELAY_US override the
    corresponding flags when set. RUST_LOG controls diagnostic logging.
";

/// Demo configuration after flag and environment parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub trials: usize,
    pub moves: usize,
    pub render_delay_us: u64,
    pub quiet: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            trials: 5,
            moves: 4,
            render_delay_us: 200,
            quiet: false,
        }
    }
}

/// What `main` should do after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(DemoConfig),
    ShowHelp,
    ShowVersion,
}

/// Parse process args and environment into a [`CliAction`].
pub fn parse_from_env() -> Result<CliAction> {
    parse(env::args().skip(1), |key| env::var(key).ok())
}

/// Testable core of the parser: takes the arg iterator and an env lookup.
pub fn parse(
    args: impl Iterator<Item = String>,
    env_var: impl Fn(&str) -> Option<String>,
) -> Result<CliAction> {
    let mut config = DemoConfig::default();

    if let Some(v) = env_var("TEARLAB_TRIALS") {
        config.trials = parse_number(&v, "TEARLAB_TRIALS")?;
    }
    if let Some(v) = env_var("TEARLAB_MOVES") {
        config.moves = parse_number(&v, "TEARLAB_MOVES")?;
    }
    if let Some(v) = env_var("TEARLAB_RENDER_DELAY_US") {
        config.render_delay_us = parse_number(&v, "TEARLAB_RENDER_DELAY_US")?;
    }

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Ok(CliAction::ShowHelp);
        }
        if arg == "--version" || arg == "-V" {
            return Ok(CliAction::ShowVersion);
        }
        if arg == "--quiet" {
            config.quiet = true;
        } else if let Some(v) = arg.strip_prefix("--trials=") {
            config.trials = parse_number(v, "--trials")?;
        } else if let Some(v) = arg.strip_prefix("--moves=") {
            config.moves = parse_number(v, "--moves")?;
        } else if let Some(v) = arg.strip_prefix("--render-delay-us=") {
            config.render_delay_us = parse_number(v, "--render-delay-us")?;
        } else {
            return Err(DemoError::InvalidArgument {
                message: format!("unknown argument: {arg}"),
            });
        }
    }

    if config.moves == 0 {
        return Err(DemoError::InvalidArgument {
            message: "--moves must be at least 1".to_string(),
        });
    }
    Ok(CliAction::Run(config))
}

fn parse_number<N: std::str::FromStr>(value: &str, what: &str) -> Result<N> {
    value.parse().map_err(|_| DemoError::InvalidArgument {
        message: format!("{what} expects a non-negative integer, got {value:?}"),
    })
}

#[must_use]
pub fn help_text() -> &'static str {
    HELP_TEXT
}

#[must_use]
pub fn version_text() -> String {
    format!("tearlab-demo {VERSION}")
}
