//! CLI module for the transform cache
//!
//! Provides the operational subcommands:
//! - `check`: serve or compute one transformation and report on it
//! - `invalidate` / `invalidate-all`: remove entries
//! - `stats`: cache usage summary
//!
//! Every subcommand prints JSON to stdout and returns its process exit code.
//! A command that cannot run at all exits with [`exit_code::HARD_FAILURE`].

pub mod check;
pub mod maintenance;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::AppConfig;
use crate::domain::outcome::exit_code;
use crate::infrastructure::logging;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0  success
  1  a quality gate rejected the output
  2  the transformer failed
  3  a corrupt entry was repaired
  4  the command failed (configuration, store, arguments)";

/// Transform Cache - verified memoization of text transformations
#[derive(Parser)]
#[command(name = "transform-cache")]
#[command(version, about, long_about = None, after_help = EXIT_CODES_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Transform a document through the cache and report the outcome
    Check(check::CheckArgs),

    /// Remove one entry by key
    Invalidate(maintenance::InvalidateArgs),

    /// Remove every entry written under an older schema
    InvalidateAll(maintenance::InvalidateAllArgs),

    /// Print cache statistics
    Stats,
}

/// Runs the selected subcommand; returns its exit code
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Check(args) => check::run(args).await,
        Command::Invalidate(args) => maintenance::invalidate(args).await,
        Command::InvalidateAll(args) => maintenance::invalidate_all(args).await,
        Command::Stats => maintenance::stats().await,
    }
}

/// Maps a command result to the process exit code
pub fn exit_code_for(result: &anyhow::Result<i32>) -> i32 {
    match result {
        Ok(code) => *code,
        Err(_) => exit_code::HARD_FAILURE,
    }
}

/// Exit code for an argument error; help and version output are not failures
pub fn parse_error_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        exit_code::HARD_FAILURE
    } else {
        exit_code::SUCCESS
    }
}

/// Load `.env`, configuration and logging; shared by all subcommands
pub fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
