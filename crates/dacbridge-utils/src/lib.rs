//! # dacbridge Utilities
//!
//! Shared helpers for dacbridge frontends and tests.
//!
//! Today this is the logging setup: `dacbridge-core` only emits `tracing`
//! events, and frontends pick an output with one of the `init_logging*`
//! functions.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
