// file: src/logging/mod.rs
// version: 2.0.0
// guid: i9j0k1l2-m3n4-5678-9012-345678ijklmn

//! Logging for the FixPanic CLI
//!
//! Diagnostics go through `tracing`; user-facing progress output goes through
//! the colored [`console`] reporter.

pub mod console;
pub mod logger;

pub use console::Console;
pub use logger::init_logger;
