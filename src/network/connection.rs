// file: src/network/connection.rs
// version: 1.0.0
// guid: efb0ec6a-53df-433c-86ef-73c9957f541b

//! Reachability check for the FixPanic socket server

use crate::config::agent::validate_socket_server;
use crate::{FixpanicError, Result};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

/// Timeout for the follow-up connection
pub const RECHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a successful connection test
#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub host: String,
    pub port: u16,
    /// Time taken by the first TCP connect
    pub connect_time: Duration,
    /// DNS answers, or `None` when the host is an IP literal or localhost
    pub resolved: Option<std::result::Result<Vec<IpAddr>, String>>,
    /// Result of a second connect with a shorter timeout
    pub recheck: std::result::Result<Duration, String>,
}

/// Split `host:port`, accepting bracketed IPv6 hosts
pub fn split_address(address: &str) -> Result<(String, u16)> {
    validate_socket_server(address)?;
    let (host, port) = address
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| FixpanicError::validation("invalid socket server address"))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| FixpanicError::validation("invalid socket server port"))?;
    Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
}

fn needs_dns(host: &str) -> bool {
    host != "localhost" && host.parse::<IpAddr>().is_err()
}

async fn connect(host: &str, port: u16, timeout: Duration) -> std::result::Result<Duration, String> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => Ok(started.elapsed()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
    }
}

/// Connect to `address` (`host:port`) and gather diagnostics.
///
/// Only the first connection decides success; DNS and the second connection
/// are reported for information.
pub async fn test_connection(address: &str, timeout: Duration) -> Result<ConnectionReport> {
    let (host, port) = split_address(address)?;
    debug!("Testing TCP connection to {}:{}", host, port);

    let connect_time = connect(&host, port, timeout)
        .await
        .map_err(|e| FixpanicError::network(format!("connection to {} failed: {}", address, e)))?;

    let resolved = if needs_dns(&host) {
        Some(
            tokio::net::lookup_host((host.as_str(), port))
                .await
                .map(|addrs| addrs.map(|a| a.ip()).collect::<Vec<_>>())
                .map_err(|e| e.to_string()),
        )
    } else {
        None
    };

    let recheck = connect(&host, port, RECHECK_TIMEOUT.min(timeout)).await;

    Ok(ConnectionReport {
        host,
        port,
        connect_time,
        resolved,
        recheck,
    })
}
