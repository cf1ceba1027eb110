//! Validated runtime configuration.

use std::net::SocketAddr;
use std::time::Duration;

pub use acqlink_core::config::WorkerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayHttpConfig {
    pub timeout: Duration,
}
