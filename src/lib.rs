// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # FixPanic CLI
//!
//! Installs, configures and supervises the FixPanic agent binary on customer
//! servers. The agent itself is an opaque, separately released executable; this
//! crate downloads it, writes its YAML configuration, registers it with the host
//! service manager (systemd, launchd or the Windows SCM) and falls back to a
//! detached process when no service manager is available.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod platform;
pub mod process;
pub mod service;
pub mod upgrade;
pub mod utils;

pub use error::{FixpanicError, Result};

/// Version information for the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub const BUILD_INFO: &str = concat!(
    "Version: ",
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Package: ",
    env!("CARGO_PKG_NAME"),
    "\n",
    "Repository: ",
    env!("CARGO_PKG_REPOSITORY"),
    "\n"
);
