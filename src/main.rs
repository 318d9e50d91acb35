//! lodestone entry point
//!
//! A minimal entrypoint: parse arguments, dispatch to the CLI module,
//! print errors to stderr, exit non-zero on failure. No configuration
//! loading, recovery or subsystem wiring happens here; all of that is the
//! CLI module's job.

use lodestone::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
