//! CLI module for aerodb-population
//!
//! Provides command-line interface for:
//! - build: Populate indexes from an entity dump and report their state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build, parse_index_spec, run, run_command, BuildRequest, IndexReport};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response, write_response_to};
