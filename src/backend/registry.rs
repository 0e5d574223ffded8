//! Backend registry holding the fixed upstream set and its mutable state

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Mutable per-backend state. Liveness and smoothed latency are read
/// together by the latency strategy, so one lock guards both.
#[derive(Debug)]
struct BackendState {
    alive: bool,
    avg_latency: Duration,
}

/// One upstream service the balancer can forward requests to
#[derive(Debug)]
pub struct Backend {
    address: String,
    state: RwLock<BackendState>,
}

impl Backend {
    fn new(address: String) -> Self {
        Self {
            address,
            // Assume alive until the first probe says otherwise
            state: RwLock::new(BackendState {
                alive: true,
                avg_latency: Duration::ZERO,
            }),
        }
    }

    /// The backend's host:port, immutable for the process lifetime
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        self.state.read().alive
    }

    /// Written by the health monitor under this backend's write lock
    pub fn set_alive(&self, alive: bool) {
        self.state.write().alive = alive;
    }

    pub fn avg_latency(&self) -> Duration {
        self.state.read().avg_latency
    }

    /// Fold a round-trip sample into the exponentially smoothed average
    /// (smoothing factor 0.5)
    pub fn record_latency(&self, sample: Duration) {
        let mut state = self.state.write();
        state.avg_latency = (state.avg_latency + sample) / 2;
    }
}

/// Ordered, fixed set of backends for the process lifetime
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
}

impl BackendRegistry {
    /// Build the registry from the comma-separated `--services` value.
    /// Fails if the list, or any entry after trimming, is empty.
    pub fn from_services(services: &str) -> Result<Self> {
        if services.trim().is_empty() {
            return Err(AppError::Config("no backend services listed".to_string()));
        }

        let mut backends = Vec::new();
        for entry in services.split(',') {
            let address = entry.trim();
            if address.is_empty() {
                return Err(AppError::Config(format!(
                    "empty backend entry in services list: {services:?}"
                )));
            }
            backends.push(Arc::new(Backend::new(address.to_string())));
        }

        Ok(Self { backends })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Arc<Backend> {
        self.backends[index].clone()
    }

    /// All backends in configuration order
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}
