// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! FixPanic CLI - Main entry point

use clap::Parser;
use fixpanic::{cli, logging::logger};
use tokio::signal;
use tracing::warn;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    if let Err(e) = logger::init_logger(cli.verbose, cli.quiet) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = tokio::select! {
        result = cli::run(cli) => result,
        _ = shutdown_signal => {
            warn!("Interrupted by user");
            eprintln!();
            std::process::exit(130);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
