//! aerodb-population CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Parses CLI arguments (via cli::run)
//! 2. Dispatches to CLI commands (via cli::run)
//! 3. Reports errors as JSON on stdout and exits non-zero
//!
//! All logic is delegated to the CLI module.

use aerodb_population::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
