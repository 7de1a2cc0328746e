//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodb-population build --entities <path> --index <spec>... [--unique <id>]...
//!   [--config <path>] [--verify]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build indexes from an entity dump in a single store scan
#[derive(Parser, Debug)]
#[command(name = "aerodb-population")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Populate every given index and print a JSON report
    Build {
        /// JSON file holding an array of entities
        #[arg(long)]
        entities: PathBuf,

        /// Index to build, as `id:name:token:property[,property...]`
        #[arg(long = "index", required = true)]
        indexes: Vec<String>,

        /// Id of an index backing a uniqueness constraint
        #[arg(long)]
        unique: Vec<u64>,

        /// Path to population configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Verify deferred constraints before flipping
        #[arg(long)]
        verify: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_arguments() {
        let cli = Cli::try_parse_from([
            "aerodb-population",
            "build",
            "--entities",
            "entities.json",
            "--index",
            "1:by_name:1:10",
            "--index",
            "2:by_pair:1:10,11",
            "--unique",
            "2",
            "--verify",
        ])
        .unwrap();

        let Command::Build {
            entities,
            indexes,
            unique,
            config,
            verify,
        } = cli.command;
        assert_eq!(entities, PathBuf::from("entities.json"));
        assert_eq!(indexes, vec!["1:by_name:1:10", "2:by_pair:1:10,11"]);
        assert_eq!(unique, vec![2]);
        assert!(config.is_none());
        assert!(verify);
    }

    #[test]
    fn test_build_requires_an_index() {
        assert!(Cli::try_parse_from(["aerodb-population", "build", "--entities", "e.json"]).is_err());
    }
}
