//! Startup flag surface and validation

use clap::Parser;
use std::time::Duration;

/// Command-line configuration for the gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "lb-gateway", about = "Layer-7 HTTP load balancer")]
pub struct Settings {
    /// Target-choosing strategy: random, round-robin, or avg-duration
    #[arg(long, default_value = "random")]
    pub strategy: String,

    /// Load balancer listen port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Comma-separated backend host:port list
    #[arg(long)]
    pub services: String,

    /// Read/write timeout for the inbound HTTP server
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
}
