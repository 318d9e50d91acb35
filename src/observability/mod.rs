//! Observability for lodestone
//!
//! Structured, synchronous JSON logging. One log line = one event,
//! deterministic key ordering, explicit severity levels.

mod logger;

pub use logger::{log, log_stderr, Logger, Severity};
