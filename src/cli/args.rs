//! CLI argument definitions using clap
//!
//! Commands:
//! - lodestone init --config <path>
//! - lodestone serve --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lodestone - A runtime-schema, self-hostable record backend
#[derive(Parser, Debug)]
#[command(name = "lodestone")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file and create the data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./lodestone.json")]
        config: PathBuf,
    },

    /// Start the server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./lodestone.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
