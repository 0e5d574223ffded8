//! HTTP Load Balancing Gateway
//!
//! A Layer-7 reverse proxy that spreads inbound requests across a fixed set
//! of backend services using a pluggable selection strategy, with a
//! background health monitor keeping per-backend liveness current.

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::registry::BackendRegistry;
use gateway::load_balancer::LoadBalancer;

/// Application state shared across all request handlers
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub balancer: Arc<LoadBalancer>,
    pub client: reqwest::Client,
    /// Record round-trip durations back into the registry (avg-duration
    /// strategy only)
    pub track_latency: bool,
}
